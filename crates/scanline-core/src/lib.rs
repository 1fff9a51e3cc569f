//! Leaf types shared by the media reader: rational arithmetic, the
//! planar sample buffer, the RGBA image container, the unified `Frame`,
//! the bounded frame cache, container metadata, and the reader's typed
//! error taxonomy.

pub mod cache;
pub mod error;
pub mod fraction;
pub mod frame;
pub mod image;
pub mod media_info;
pub mod sample;
pub mod sample_buffer;

pub use cache::FrameCache;
pub use error::ReaderError;
pub use fraction::Fraction;
pub use frame::{AudioLocation, Frame, PictureType};
pub use image::Image;
pub use media_info::{ChannelLayout, MediaInfo};
pub use sample::Sample;
pub use sample_buffer::SampleBuffer;
