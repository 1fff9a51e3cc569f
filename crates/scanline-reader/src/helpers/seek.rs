// crates/scanline-reader/src/helpers/seek.rs
//
// Backward keyframe seek, wrapping ffmpeg's avformat seek with the
// reader's own failure policy: callers decide seek-again vs close-and-reopen,
// this just performs one attempt and reports whether it landed.
//
// # Why backward seek (`..=target_pts`)
// A forward seek lands on the keyframe AT OR AFTER the target. A reader
// that wants to decode a short run *up to* the requested frame would have
// to throw away everything between the target and that later keyframe and
// show the wrong picture in the meantime. A backward seek lands on the
// keyframe before the target, so `seek()` in `reader.rs` can decode forward
// from there and simply drop frames before the target.

use ffmpeg_the_third as ffmpeg;

/// Attempts a backward keyframe seek to `target_pts` on `ictx`. Returns
/// `true` on success. A failed seek leaves the demuxer at its prior
/// position; the caller is expected to fall back to closing and reopening
/// the file rather than limping along from an unknown position.
pub fn seek_backward(ictx: &mut ffmpeg::format::context::Input, target_pts: i64) -> bool {
    match ictx.seek(target_pts, ..=target_pts) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[scanline-reader] seek to pts {target_pts} failed: {e}");
            false
        }
    }
}
