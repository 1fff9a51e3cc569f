use crate::fraction::Fraction;
use crate::image::Image;
use crate::media_info::ChannelLayout;
use crate::sample_buffer::SampleBuffer;

/// Decoder-reported picture type of a video frame, carried through mostly
/// for diagnostics (seek-trash detection doesn't need it, but callers
/// inspecting a returned frame might).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    Unknown,
    I,
    P,
    B,
}

/// Where the first sample of a decoded audio packet lands on the video
/// frame grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioLocation {
    pub frame: i64,
    pub sample_start: i64,
}

impl AudioLocation {
    /// Two locations are "near" when they're at most one frame apart and
    /// the sample distance between them, projected onto a single frame's
    /// worth of samples, falls under `samples_per_frame`. This absorbs
    /// the sub-sample rounding drift that would otherwise open tiny gaps
    /// or overlaps between consecutive audio packets.
    pub fn is_near(&self, other: &AudioLocation, samples_per_frame: i64) -> bool {
        if samples_per_frame <= 0 {
            return self == other;
        }
        let delta_frames = (self.frame - other.frame).abs();
        if delta_frames >= 2 {
            return false;
        }
        let self_total = self.frame * samples_per_frame + self.sample_start;
        let other_total = other.frame * samples_per_frame + other.sample_start;
        (self_total - other_total).abs() < samples_per_frame
    }
}

/// One unit of output: the decoded image belonging to `number` and the
/// audio samples whose playback time falls within `number`'s interval on
/// the nominal frame grid.
#[derive(Debug, Clone)]
pub struct Frame {
    pub number: i64,
    image: Option<Image>,
    audio: SampleBuffer<f32>,
    pub pixel_ratio: Fraction,
    pub channel_layout: ChannelLayout,
    pub sample_rate: i32,
    pub picture_type: PictureType,
    pub has_image_data: bool,
    pub has_audio_data: bool,
}

impl Frame {
    pub fn blank(number: i64, sample_rate: i32, channels: i32) -> Self {
        Frame {
            number,
            image: None,
            audio: SampleBuffer::new(channels.max(1) as usize, 0),
            pixel_ratio: Fraction::new(1, 1),
            channel_layout: ChannelLayout::from_channels(channels),
            sample_rate,
            picture_type: PictureType::Unknown,
            has_image_data: false,
            has_audio_data: false,
        }
    }

    pub fn with_color(number: i64, width: u32, height: u32, color: [u8; 4], sample_rate: i32, channels: i32) -> Self {
        let mut f = Frame::blank(number, sample_rate, channels);
        f.add_color(width, height, color);
        f
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Lazily fills a black image if none has been set yet, matching the
    /// original's `GetImage()` fallback so callers never see a frame that
    /// claims to have video but returns no pixels.
    pub fn image_or_black(&mut self, width: u32, height: u32) -> &Image {
        if self.image.is_none() {
            self.add_color(width, height, [0, 0, 0, 255]);
        }
        self.image.as_ref().unwrap()
    }

    pub fn audio(&self) -> &SampleBuffer<f32> {
        &self.audio
    }

    pub fn add_color(&mut self, width: u32, height: u32, color: [u8; 4]) {
        self.image = Some(Image::solid_color(width, height, color));
        self.has_image_data = true;
    }

    pub fn add_image(&mut self, width: u32, height: u32, bytes_per_pixel: u32, pixels: &[u8]) {
        self.image = Some(Image::from_pixels(width, height, bytes_per_pixel, pixels));
        self.has_image_data = true;
    }

    /// Grows the buffer to cover the destination window, optionally
    /// clearing it first, then mixes `source` in with `gain`.
    pub fn add_audio(
        &mut self,
        replace_samples: bool,
        dest_channel: usize,
        dest_start: usize,
        source: &[f32],
        gain: f32,
    ) {
        let needed_channels = self.audio.channels().max(dest_channel + 1);
        let needed_samples = self.audio.samples().max(dest_start + source.len());
        if needed_channels > self.audio.channels() || needed_samples > self.audio.samples() {
            self.audio
                .set_size(needed_channels, needed_samples, true, true, false);
        }
        if replace_samples {
            self.audio.clear_channel_range(dest_channel, dest_start, source.len());
        }
        self.audio.add_from(dest_channel, dest_start, source, gain);
        self.has_audio_data = true;
    }

    pub fn add_audio_silence(&mut self, num_samples: usize) {
        let channels = self.audio.channels().max(1);
        self.audio = SampleBuffer::new(channels, num_samples);
        self.has_audio_data = true;
    }

    /// Number of samples (already a multiple of `channels`) that belong to
    /// frame `number` at the given rate and channel count.
    ///
    /// Walking this function across `1..=n` and summing its results always
    /// lands within one sample of `floor(sample_rate / fps * n)`: each call
    /// computes the cumulative sample count up to and including `number`
    /// and subtracts the cumulative count up to `number - 1`, so rounding
    /// error never compounds across frames.
    pub fn samples_per_frame(number: i64, fps: Fraction, sample_rate: i32, channels: i32) -> i64 {
        let fps_rate = fps.reciprocal().to_f64();
        let channels = channels.max(1) as f64;

        let previous_samples = {
            let raw = sample_rate as f64 * fps_rate * (number - 1) as f64;
            raw - (raw % channels)
        };
        let total_samples = {
            let raw = sample_rate as f64 * fps_rate * number as f64;
            raw - (raw % channels)
        };

        (total_samples - previous_samples).round() as i64
    }

    /// Rough size estimate used only as the cache's byte-budget metric.
    pub fn estimated_bytes(&self) -> u64 {
        let image_bytes = self
            .image
            .as_ref()
            .map(|img| img.width as u64 * img.height as u64 * 4)
            .unwrap_or(0);
        let audio_bytes = (self.sample_rate as f64 / 24.0 * 4.0) as u64;
        image_bytes + audio_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_frame_sums_to_total_stream_samples() {
        let fps = Fraction::new(30, 1);
        let sample_rate = 48_000;
        let channels = 2;
        let n_frames = 100;

        let total: i64 = (1..=n_frames)
            .map(|n| Frame::samples_per_frame(n, fps, sample_rate, channels))
            .sum();

        let expected = (sample_rate as f64 / fps.to_f64() * n_frames as f64) as i64;
        assert!((total - expected).abs() <= 1);
    }

    #[test]
    fn samples_per_frame_is_multiple_of_channel_count() {
        let fps = Fraction::new(30000, 1001);
        for n in 1..=50_i64 {
            let spf = Frame::samples_per_frame(n, fps, 44_100, 2);
            assert_eq!(spf % 2, 0, "frame {n} produced odd sample count {spf}");
        }
    }

    #[test]
    fn add_audio_grows_buffer_and_sets_flag() {
        let mut f = Frame::blank(1, 44_100, 2);
        assert!(!f.has_audio_data);
        f.add_audio(true, 0, 0, &[1.0, 1.0, 1.0], 1.0);
        assert!(f.has_audio_data);
        assert_eq!(f.audio().channel(0), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn add_audio_replace_clears_destination_first() {
        let mut f = Frame::blank(1, 44_100, 1);
        f.add_audio(true, 0, 0, &[2.0, 2.0], 1.0);
        f.add_audio(true, 0, 0, &[1.0, 1.0], 1.0);
        assert_eq!(f.audio().channel(0), &[1.0, 1.0]);
    }

    #[test]
    fn image_or_black_fills_when_absent() {
        let mut f = Frame::blank(1, 44_100, 2);
        assert!(f.image().is_none());
        let img = f.image_or_black(4, 4);
        assert_eq!(img.data.len(), 4 * 4 * 4);
        assert!(img.data.iter().step_by(4).all(|&b| b == 0));
    }

    #[test]
    fn audio_location_near_absorbs_rounding_drift() {
        let a = AudioLocation { frame: 10, sample_start: 1598 };
        let b = AudioLocation { frame: 10, sample_start: 1600 };
        assert!(a.is_near(&b, 1600));
        let c = AudioLocation { frame: 12, sample_start: 0 };
        assert!(!a.is_near(&c, 1600));
    }
}
