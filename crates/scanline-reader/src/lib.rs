// crates/scanline-reader/src/lib.rs

mod bookkeeping;
mod helpers;
mod packets;
mod pts;
mod reader;
mod seek;
mod working_cache;

pub use reader::MediaReader;

pub use scanline_core::{
    AudioLocation, ChannelLayout, Fraction, Frame, FrameCache, Image, MediaInfo, PictureType,
    ReaderError, Sample, SampleBuffer,
};
