use crate::fraction::Fraction;

/// Speaker layout of a decoded audio stream. Mirrors the handful of layouts
/// FFmpeg actually reports for consumer media; anything more exotic is
/// treated as `Other` and carried through as a raw channel count only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Surround5Point1,
    Surround7Point1,
    Other,
}

impl ChannelLayout {
    pub fn from_channels(channels: i32) -> Self {
        match channels {
            1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            6 => ChannelLayout::Surround5Point1,
            8 => ChannelLayout::Surround7Point1,
            _ => ChannelLayout::Other,
        }
    }
}

/// Everything the reader learns about a container at `open` time.
///
/// Defaults for a video-less file come straight from the original reader:
/// `fps = 24/1`, `width = 720`, `height = 480`, so audio still has a frame
/// grid to land on.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub has_video: bool,
    pub has_audio: bool,
    pub duration_seconds: f64,
    pub file_size_bytes: u64,

    pub width: i32,
    pub height: i32,
    pub pixel_format: i32,
    pub fps: Fraction,
    pub pixel_ratio: Fraction,
    pub display_ratio: Fraction,
    pub video_codec_name: String,
    pub video_length_frames: i64,
    pub video_stream_index: i32,
    pub video_timebase: Fraction,
    pub video_bit_rate: i64,
    pub interlaced: bool,
    pub top_field_first: bool,

    pub audio_codec_name: String,
    pub sample_rate: i32,
    pub channels: i32,
    pub channel_layout: ChannelLayout,
    pub audio_stream_index: i32,
    pub audio_timebase: Fraction,
    pub audio_bit_rate: i64,

    /// True when the container is a still image opened through the video
    /// path (a single attached picture, no audio, no usable duration).
    /// Recovered from the original implementation: several real containers
    /// (album art, a PNG muxed into a .mov) take this path, and when they
    /// do `video_length_frames` is forced to 1 rather than derived from
    /// `duration x fps`.
    pub has_single_image: bool,
}

impl Default for MediaInfo {
    fn default() -> Self {
        MediaInfo {
            has_video: false,
            has_audio: false,
            duration_seconds: 0.0,
            file_size_bytes: 0,

            width: 720,
            height: 480,
            pixel_format: 0,
            fps: Fraction::new(24, 1),
            pixel_ratio: Fraction::new(1, 1),
            display_ratio: Fraction::new(4, 3),
            video_codec_name: String::new(),
            video_length_frames: 0,
            video_stream_index: -1,
            video_timebase: Fraction::new(1, 1),
            video_bit_rate: 0,
            interlaced: false,
            top_field_first: true,

            audio_codec_name: String::new(),
            sample_rate: 44_100,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            audio_stream_index: -1,
            audio_timebase: Fraction::new(1, 1),
            audio_bit_rate: 0,

            has_single_image: false,
        }
    }
}

impl MediaInfo {
    /// Diagnostic dump, matching the original's developer-facing `DisplayInfo`.
    pub fn display(&self) {
        println!("----------------------------");
        println!("----- File Information -----");
        println!("----------------------------");
        println!("-> Duration: {:.4} Seconds", self.duration_seconds);
        println!("-> File Size: {} bytes", self.file_size_bytes);
        println!("----------------------------");
        println!("----- Video Attributes -----");
        println!("----------------------------");
        println!("-> Has Video: {}", self.has_video);
        println!("-> Width: {}", self.width);
        println!("-> Height: {}", self.height);
        println!("-> Frame Rate: {}/{}", self.fps.num, self.fps.den);
        println!("-> Video Codec: {}", self.video_codec_name);
        println!("-> Video Length: {} frames", self.video_length_frames);
        println!("----------------------------");
        println!("----- Audio Attributes -----");
        println!("----------------------------");
        println!("-> Has Audio: {}", self.has_audio);
        println!("-> Sample Rate: {}", self.sample_rate);
        println!("-> Channels: {}", self.channels);
        println!("-> Audio Codec: {}", self.audio_codec_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_video_less_fallbacks() {
        let info = MediaInfo::default();
        assert_eq!(info.fps, Fraction::new(24, 1));
        assert_eq!(info.width, 720);
        assert_eq!(info.height, 480);
    }

    #[test]
    fn channel_layout_from_common_counts() {
        assert_eq!(ChannelLayout::from_channels(1), ChannelLayout::Mono);
        assert_eq!(ChannelLayout::from_channels(2), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::from_channels(6), ChannelLayout::Surround5Point1);
        assert_eq!(ChannelLayout::from_channels(3), ChannelLayout::Other);
    }
}
