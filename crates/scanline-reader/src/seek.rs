// Seek protocol: drains in-flight work, clears the short-lived caches and
// bookkeeping, and either repositions the demuxer with a backward keyframe
// seek or falls back to closing and reopening the file.

use std::thread;
use std::time::Duration;

use crate::helpers::seek::seek_backward;
use crate::reader::MediaReader;

/// How far back of the requested frame the reader asks the demuxer to seek,
/// so that a short run of decoded frames from the landed keyframe reaches
/// the target with a little margin rather than landing exactly on it.
pub const SEEK_BUFFER_FRAMES: i64 = 6;

/// Below this distance from the start of the file, the quadratic keyframe
/// search isn't worth it — opening fresh is both simpler and just as fast.
const REOPEN_THRESHOLD_FRAMES: i64 = 20;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SeekState {
    pub is_seeking: bool,
    pub is_video_seek: bool,
    pub seeking_frame: i64,
    pub seeking_pts: i64,
    pub seek_count: i32,
    pub seek_audio_frame_found: i64,
    pub seek_video_frame_found: i64,
}

impl MediaReader {
    /// Repositions the reader at `requested_frame`. Drains in-flight packet
    /// processing, clears `working_cache` and `missing_frames` along with
    /// all bookkeeping, then either performs a backward keyframe seek or
    /// falls back to a close+reopen when the target is too close to the
    /// start of the file for a seek to be worthwhile.
    pub(crate) fn seek(&mut self, requested_frame: i64) {
        let requested_frame = requested_frame.max(1);

        self.wait_for_processing_to_drain();

        self.working_cache.clear();
        self.missing_frames.clear();
        self.bookkeeping.lock().unwrap().clear();

        self.last_frame = 0;
        self.current_video_frame = 0;
        self.largest_frame_processed = 0;
        self.previous_packet_location = None;

        self.seek_state.seek_count += 1;

        if requested_frame - SEEK_BUFFER_FRAMES < REOPEN_THRESHOLD_FRAMES {
            self.reopen();
            self.seek_state = crate::seek::SeekState::default();
            return;
        }

        let target_frame = requested_frame - SEEK_BUFFER_FRAMES;
        let video_offset = self.video_pts_offset.unwrap_or(0);
        let audio_offset = self.audio_pts_offset.unwrap_or(0);

        let (target_pts, is_video_seek) = if self.info.has_video {
            (self.pts.frame_to_video_pts(target_frame, video_offset), true)
        } else {
            (self.pts.frame_to_audio_pts(target_frame, audio_offset), false)
        };

        let Some(ictx) = self.ictx.as_mut() else {
            self.reopen();
            return;
        };

        if !seek_backward(ictx, target_pts) {
            self.enable_seek = false;
            self.reopen();
            return;
        }

        if let Some(dec) = self.video_decoder.as_mut() {
            dec.flush();
        }
        if let Some(dec) = self.audio_decoder.as_mut() {
            dec.flush();
        }

        self.seek_state.is_video_seek = is_video_seek;
        self.seek_state.is_seeking = true;
        self.seek_state.seek_audio_frame_found = 0;
        self.seek_state.seek_video_frame_found = 0;
        if self.seek_state.seek_count == 1 {
            self.seek_state.seeking_pts = target_pts;
            self.seek_state.seeking_frame = requested_frame;
        }
    }

    /// Called by the packet processors once a seek is in progress, before
    /// any other handling of the packet. Returns `true` while the packet
    /// should still be discarded as pre-roll.
    ///
    /// Once both streams present in the file have reported a post-seek
    /// frame, compares the furthest one reached against the originally
    /// requested frame: if the seek overshot, retries with a quadratically
    /// growing backward offset (`seeking_frame - 20 * seek_count^2`) so a
    /// keyframe that's unexpectedly far from the target is eventually
    /// found without looping forever on the same spot.
    pub(crate) fn check_seek(&mut self, is_video: bool, current_frame: i64) -> bool {
        if !self.seek_state.is_seeking {
            return false;
        }

        if is_video {
            self.seek_state.seek_video_frame_found = current_frame;
        } else {
            self.seek_state.seek_audio_frame_found = current_frame;
        }

        let video_ready = !self.info.has_video || self.seek_state.seek_video_frame_found > 0;
        let audio_ready = !self.info.has_audio || self.seek_state.seek_audio_frame_found > 0;
        if !(video_ready && audio_ready) {
            return true;
        }

        let max_seeked = self
            .seek_state
            .seek_audio_frame_found
            .max(self.seek_state.seek_video_frame_found);

        if max_seeked >= self.seek_state.seeking_frame {
            let backoff = 20 * self.seek_state.seek_count.pow(2) as i64;
            let retry_target = self.seek_state.seeking_frame - backoff;
            self.seek(retry_target.max(1));
            true
        } else {
            self.seek_state.is_seeking = false;
            false
        }
    }

    fn wait_for_processing_to_drain(&self) {
        loop {
            if self.bookkeeping.lock().unwrap().processing_count() == 0 {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}
