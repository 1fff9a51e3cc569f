// Pure PTS arithmetic: conversions between demuxer timestamps and frame
// indices on the nominal frame grid. Nothing here touches a codec context,
// which is what makes it straightforward to unit test in isolation from
// `reader.rs`.

use scanline_core::{Fraction, Frame};

/// Where the first sample of a decoded audio packet lands on the frame grid.
pub use scanline_core::AudioLocation;

/// Timebase-aware conversions shared by the video and audio packet
/// processors. Each reader owns one of these, built from the container's
/// declared frame rate and per-stream timebases.
#[derive(Debug, Clone, Copy)]
pub struct PtsMapper {
    pub fps: Fraction,
    pub video_timebase: Fraction,
    pub audio_timebase: Fraction,
}

impl PtsMapper {
    /// The offset applied to every PTS on a stream once decoding has
    /// started, so that the first packet maps to a small positive frame
    /// index instead of whatever absolute timestamp the container started
    /// counting from. Floors at `-10` so a stream whose first packet has a
    /// pts near zero (or negative, as some containers emit for B-frame
    /// reordering) doesn't get pushed arbitrarily far from frame 1.
    pub fn establish_offset(first_pts: i64) -> i64 {
        -first_pts.max(10)
    }

    /// Maps a decoded video PTS to a 1-based frame number.
    pub fn video_pts_to_frame(&self, pts: i64, offset: i64) -> i64 {
        let seconds = (pts + offset) as f64 * self.video_timebase.to_f64();
        (seconds * self.fps.to_f64()).round() as i64 + 1
    }

    /// Maps a 1-based frame number to the video PTS the demuxer should seek
    /// or compare against.
    ///
    /// Deliberately uses `frame_number / fps`, not `(frame_number - 1) /
    /// fps`: frame 1 therefore maps to a PTS of one frame's duration rather
    /// than zero. This asymmetry with `video_pts_to_frame` (which does
    /// subtract one after rounding) is inherited as-is rather than
    /// "corrected" — see the crate's design notes.
    pub fn frame_to_video_pts(&self, frame_number: i64, offset: i64) -> i64 {
        let seconds = frame_number as f64 / self.fps.to_f64();
        (seconds / self.video_timebase.to_f64()).round() as i64 - offset
    }

    pub fn frame_to_audio_pts(&self, frame_number: i64, offset: i64) -> i64 {
        let seconds = frame_number as f64 / self.fps.to_f64();
        (seconds / self.audio_timebase.to_f64()).round() as i64 - offset
    }

    /// Locates the first sample of an audio packet on the frame grid.
    pub fn audio_pts_location(
        &self,
        pts: i64,
        offset: i64,
        sample_rate: i32,
        channels: i32,
    ) -> AudioLocation {
        let seconds = (pts + offset) as f64 * self.audio_timebase.to_f64();
        let frame_f = seconds * self.fps.to_f64() + 1.0;
        let whole = frame_f.floor();
        let frac = frame_f - whole;
        let whole_frame = (whole as i64).max(1);
        let samples_per_frame = Frame::samples_per_frame(whole_frame, self.fps, sample_rate, channels);
        let sample_start = (samples_per_frame as f64 * frac).round().max(0.0) as i64;
        AudioLocation {
            frame: whole_frame,
            sample_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PtsMapper {
        PtsMapper {
            fps: Fraction::new(30, 1),
            video_timebase: Fraction::new(1, 90_000),
            audio_timebase: Fraction::new(1, 48_000),
        }
    }

    #[test]
    fn offset_floors_small_first_pts_at_minus_ten() {
        assert_eq!(PtsMapper::establish_offset(0), -10);
        assert_eq!(PtsMapper::establish_offset(-5), -10);
        assert_eq!(PtsMapper::establish_offset(50_000), -50_000);
    }

    #[test]
    fn video_pts_to_frame_is_one_based() {
        let m = mapper();
        // pts 0 with offset 0 -> 0 seconds -> round(0*30)+1 = 1
        assert_eq!(m.video_pts_to_frame(0, 0), 1);
        // one frame later: 1/30s = 3000 ticks at 1/90000 timebase
        assert_eq!(m.video_pts_to_frame(3_000, 0), 2);
    }

    #[test]
    fn frame_to_video_pts_uses_n_over_fps_not_n_minus_one() {
        let m = mapper();
        // frame 1 -> seconds = 1/30, NOT 0 -- the documented asymmetry.
        let pts = m.frame_to_video_pts(1, 0);
        assert_eq!(pts, 3_000);
        assert_ne!(pts, 0);
    }

    #[test]
    fn audio_pts_location_lands_on_frame_boundary_at_zero() {
        let m = mapper();
        let loc = m.audio_pts_location(0, 0, 48_000, 2);
        assert_eq!(loc.frame, 1);
        assert_eq!(loc.sample_start, 0);
    }

    #[test]
    fn audio_pts_location_advances_mid_frame() {
        let m = mapper();
        // Half a frame (1/60s) later.
        let half_frame_pts = 48_000 / 60;
        let loc = m.audio_pts_location(half_frame_pts as i64, 0, 48_000, 2);
        assert_eq!(loc.frame, 1);
        assert!(loc.sample_start > 0);
    }
}
