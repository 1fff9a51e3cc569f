// Exercises the public error taxonomy for paths that never reach a real
// decoder: a missing file and a file FFmpeg can't even probe a format for.
// Real-media paths (successful open, get_frame, seek) aren't covered here —
// they need an actual encoded sample, which this crate doesn't ship.

use std::io::Write;

use scanline_reader::MediaReader;

#[test]
fn open_missing_file_is_invalid_file() {
    let err = MediaReader::open("/nonexistent/path/does-not-exist.mp4").unwrap_err();
    assert!(matches!(err, scanline_reader::ReaderError::InvalidFile { .. }));
}

#[test]
fn open_garbage_file_fails_to_probe() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(b"not a media container, just some bytes")
        .expect("write garbage");
    file.flush().unwrap();

    let result = MediaReader::open(file.path());
    assert!(result.is_err(), "garbage bytes should not probe as a valid container");
}
