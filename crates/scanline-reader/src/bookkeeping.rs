// Frame-level bookkeeping the packet pump consults to decide when a frame
// in `working_cache` is ready to promote, and to fill gaps left by frames
// the decoder never produced. Guarded by its own mutex, separate from
// either `FrameCache`'s internal lock, matching the reader's concurrency
// model: a cache miss and a bookkeeping update are different resources and
// shouldn't contend on the same lock.

use std::collections::HashMap;

/// A frame is force-completed once its checked count reaches this many
/// polls, so a stuck frame (source packet lost, truncated file) can't wedge
/// the promotion loop forever.
pub const FORCE_COMPLETE_AFTER_CHECKS: u32 = 80;

#[derive(Debug, Default)]
pub struct Bookkeeping {
    processing_video: std::collections::HashSet<i64>,
    /// Audio uses a refcount, not a set: a single frame's sample window can
    /// be touched by more than one in-flight packet when a packet straddles
    /// a frame boundary, so "processing" only clears once every occurrence
    /// has finished.
    processing_audio: HashMap<i64, u32>,
    processed_video: std::collections::HashSet<i64>,
    processed_audio: std::collections::HashSet<i64>,
    /// missing frame number -> the frame number whose image should be
    /// copied to fill the gap.
    missing_video: HashMap<i64, i64>,
    missing_audio: HashMap<i64, i64>,
    checked: HashMap<i64, u32>,
}

impl Bookkeeping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Bookkeeping::default();
    }

    pub fn begin_video(&mut self, frame: i64) {
        self.processing_video.insert(frame);
    }

    pub fn end_video(&mut self, frame: i64) {
        self.processing_video.remove(&frame);
        self.processed_video.insert(frame);
    }

    pub fn begin_audio(&mut self, frame: i64) {
        *self.processing_audio.entry(frame).or_insert(0) += 1;
    }

    /// Decrements the refcount for `frame`; once it reaches zero the frame
    /// is considered audio-processed.
    pub fn end_audio(&mut self, frame: i64) {
        let reached_zero = match self.processing_audio.get_mut(&frame) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => true,
        };
        if reached_zero {
            self.processing_audio.remove(&frame);
            self.processed_audio.insert(frame);
        }
    }

    pub fn is_video_ready(&self, frame: i64, has_video: bool) -> bool {
        !has_video || self.processed_video.contains(&frame)
    }

    pub fn is_audio_ready(&self, frame: i64, has_audio: bool) -> bool {
        !has_audio || self.processed_audio.contains(&frame)
    }

    pub fn processing_count(&self) -> usize {
        self.processing_video.len()
            + self.processing_audio.values().filter(|&&c| c > 0).count()
    }

    pub fn record_missing_video(&mut self, missing_frame: i64, source_frame: i64) {
        self.missing_video.insert(missing_frame, source_frame);
    }

    pub fn record_missing_audio(&mut self, missing_frame: i64, source_frame: i64) {
        self.missing_audio.insert(missing_frame, source_frame);
    }

    /// Returns the source frame to substitute for `frame`, if it was ever
    /// recorded missing, and forgets the entry: once substituted a frame
    /// doesn't need to be revisited.
    pub fn take_missing_source(&mut self, frame: i64) -> Option<i64> {
        self.missing_video
            .remove(&frame)
            .or_else(|| self.missing_audio.remove(&frame))
    }

    /// Increments and returns the number of times `frame` has been checked
    /// by the promotion loop without becoming ready.
    pub fn check(&mut self, frame: i64) -> u32 {
        let count = self.checked.entry(frame).or_insert(0);
        *count += 1;
        *count
    }

    pub fn mark_processed(&mut self, frame: i64, has_video: bool, has_audio: bool) {
        if has_video {
            self.processed_video.insert(frame);
        }
        if has_audio {
            self.processed_audio.insert(frame);
        }
    }

    pub fn forget(&mut self, frame: i64) {
        self.processed_video.remove(&frame);
        self.processed_audio.remove(&frame);
        self.checked.remove(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_readiness_requires_end_video() {
        let mut bk = Bookkeeping::new();
        assert!(!bk.is_video_ready(1, true));
        bk.begin_video(1);
        assert!(!bk.is_video_ready(1, true));
        bk.end_video(1);
        assert!(bk.is_video_ready(1, true));
    }

    #[test]
    fn video_readiness_ignored_when_stream_absent() {
        let bk = Bookkeeping::new();
        assert!(bk.is_video_ready(1, false));
    }

    #[test]
    fn audio_refcount_requires_every_occurrence_to_end() {
        let mut bk = Bookkeeping::new();
        bk.begin_audio(5);
        bk.begin_audio(5);
        bk.end_audio(5);
        assert!(!bk.is_audio_ready(5, true));
        bk.end_audio(5);
        assert!(bk.is_audio_ready(5, true));
    }

    #[test]
    fn missing_source_is_consumed_once() {
        let mut bk = Bookkeeping::new();
        bk.record_missing_video(10, 9);
        assert_eq!(bk.take_missing_source(10), Some(9));
        assert_eq!(bk.take_missing_source(10), None);
    }

    #[test]
    fn check_counts_increment_per_call() {
        let mut bk = Bookkeeping::new();
        assert_eq!(bk.check(1), 1);
        assert_eq!(bk.check(1), 2);
        assert_eq!(bk.check(2), 1);
    }

    #[test]
    fn processing_count_excludes_fully_ended_audio() {
        let mut bk = Bookkeeping::new();
        bk.begin_video(1);
        bk.begin_audio(2);
        assert_eq!(bk.processing_count(), 2);
        bk.end_video(1);
        bk.end_audio(2);
        assert_eq!(bk.processing_count(), 0);
    }

    #[test]
    fn clear_resets_every_set() {
        let mut bk = Bookkeeping::new();
        bk.begin_video(1);
        bk.record_missing_audio(2, 1);
        bk.check(3);
        bk.clear();
        assert_eq!(bk.processing_count(), 0);
        assert_eq!(bk.take_missing_source(2), None);
        assert_eq!(bk.check(3), 1);
    }
}
