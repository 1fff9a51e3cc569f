use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced at the public boundary of a media reader.
///
/// Internal decode/seek failures for a single frame never reach this type —
/// they degrade to missing-frame bookkeeping and image substitution instead.
/// Only conditions that prevent `open` from succeeding, or that make a
/// specific `get_frame` call meaningless, are reported here.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("invalid file: {message} ({path})")]
    InvalidFile { message: String, path: PathBuf },

    #[error("no streams found: {message} ({path})")]
    NoStreamsFound { message: String, path: PathBuf },

    #[error("invalid codec: {message} ({path})")]
    InvalidCodec { message: String, path: PathBuf },

    #[error("reader closed: {message} ({path})")]
    ReaderClosed { message: String, path: PathBuf },

    #[error("frame {current_frame} is out of bounds (video length: {video_length})")]
    OutOfBoundsFrame {
        message: String,
        current_frame: i64,
        video_length: i64,
    },
}
