use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::media::Type;

use scanline_core::{ChannelLayout, Fraction, Frame, FrameCache, MediaInfo, ReaderError};

use crate::bookkeeping::Bookkeeping;
use crate::pts::PtsMapper;
use crate::seek::SeekState;
use crate::working_cache::WorkingCache;

/// Random-access reader over a container holding up to one video and one
/// audio stream. Demuxing, decoding, and caching are all driven from
/// `get_frame`; callers never touch the codec library directly.
pub struct MediaReader {
    pub(crate) path: PathBuf,
    pub(crate) info: MediaInfo,
    pub(crate) opened: bool,
    pub(crate) enable_seek: bool,
    pub(crate) max_width: u32,
    pub(crate) max_height: u32,

    pub(crate) ictx: Option<ffmpeg::format::context::Input>,
    pub(crate) video_decoder: Option<ffmpeg::decoder::Video>,
    pub(crate) audio_decoder: Option<ffmpeg::decoder::Audio>,

    pub(crate) working_cache: WorkingCache,
    pub(crate) missing_frames: FrameCache,
    pub(crate) final_cache: FrameCache,

    pub(crate) bookkeeping: Mutex<Bookkeeping>,

    pub(crate) pts: PtsMapper,
    pub(crate) video_pts_offset: Option<i64>,
    pub(crate) audio_pts_offset: Option<i64>,

    pub(crate) seek_state: SeekState,
    pub(crate) last_frame: i64,
    pub(crate) largest_frame_processed: i64,
    pub(crate) current_video_frame: i64,
    pub(crate) previous_packet_location: Option<scanline_core::AudioLocation>,
    pub(crate) last_video_frame: Option<Arc<Frame>>,
}

impl MediaReader {
    /// Opens `path`, probing both streams and populating `info`. Does not
    /// decode any frames yet — the first call to `get_frame` establishes
    /// the PTS offsets from the first packet of each stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        let path = path.as_ref().to_path_buf();

        let ictx = ffmpeg::format::input(&path).map_err(|e| ReaderError::InvalidFile {
            message: e.to_string(),
            path: path.clone(),
        })?;

        if ictx.streams().count() == 0 {
            return Err(ReaderError::NoStreamsFound {
                message: "container has no streams".into(),
                path: path.clone(),
            });
        }

        let mut info = MediaInfo {
            file_size_bytes: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
            duration_seconds: {
                let d = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
                d.max(0.0)
            },
            ..MediaInfo::default()
        };

        let video_stream = ictx.streams().best(Type::Video);
        let audio_stream = ictx.streams().best(Type::Audio);

        if let Some(stream) = &video_stream {
            info.has_video = true;
            info.video_stream_index = stream.index() as i32;
            let tb = stream.time_base();
            info.video_timebase = Fraction::new(tb.numerator(), tb.denominator());

            let params = stream.parameters();
            let codec_ctx = ffmpeg::codec::context::Context::from_parameters(params)
                .map_err(|e| ReaderError::InvalidCodec {
                    message: e.to_string(),
                    path: path.clone(),
                })?;
            let decoder = codec_ctx.decoder().video().map_err(|e| ReaderError::InvalidCodec {
                message: e.to_string(),
                path: path.clone(),
            })?;

            info.width = decoder.width() as i32;
            info.height = decoder.height() as i32;
            info.video_codec_name = decoder.codec().map(|c| c.name().to_string()).unwrap_or_default();

            // AVCodecParameters carries a few fields ffmpeg-the-third doesn't
            // wrap safely (format, bit_rate, sample_aspect_ratio, field_order).
            // Read them straight off the C struct, same as the pack's own
            // probing code does for width/height before a decoder exists.
            let raw = unsafe { &*stream.parameters().as_ptr() };
            info.pixel_format = raw.format as i32;
            info.video_bit_rate = raw.bit_rate;
            info.pixel_ratio = if raw.sample_aspect_ratio.num > 0 && raw.sample_aspect_ratio.den > 0 {
                Fraction::new(raw.sample_aspect_ratio.num, raw.sample_aspect_ratio.den)
            } else {
                Fraction::new(1, 1)
            };
            info.display_ratio = Fraction::new(
                info.pixel_ratio.num * info.width,
                info.pixel_ratio.den * info.height.max(1),
            )
            .reduced();
            // AVFieldOrder: 0 = unknown, 1 = progressive, 2/4 = top-first, 3/5 = bottom-first.
            let field_order = raw.field_order as i32;
            info.interlaced = field_order != 0 && field_order != 1;
            info.top_field_first = matches!(field_order, 2 | 4);

            let rate = stream.avg_frame_rate();
            info.fps = if rate.denominator() != 0 && rate.numerator() != 0 {
                Fraction::new(rate.numerator(), rate.denominator())
            } else {
                Fraction::new(24, 1)
            };
            if info.fps.to_f64() > 120.0 || info.fps.den == 0 {
                info.fps = Fraction::new(24, 1);
            }

            info.has_single_image = stream.frames() <= 1 && info.duration_seconds <= 0.0;
            info.video_length_frames = if info.has_single_image {
                1
            } else {
                (info.duration_seconds * info.fps.to_f64()).round() as i64
            };
        }

        if let Some(stream) = &audio_stream {
            info.has_audio = true;
            info.audio_stream_index = stream.index() as i32;
            let tb = stream.time_base();
            info.audio_timebase = Fraction::new(tb.numerator(), tb.denominator());

            let params = stream.parameters();
            let codec_ctx = ffmpeg::codec::context::Context::from_parameters(params)
                .map_err(|e| ReaderError::InvalidCodec {
                    message: e.to_string(),
                    path: path.clone(),
                })?;
            let decoder = codec_ctx.decoder().audio().map_err(|e| ReaderError::InvalidCodec {
                message: e.to_string(),
                path: path.clone(),
            })?;

            info.sample_rate = decoder.rate() as i32;
            info.channels = decoder.channels() as i32;
            info.channel_layout = ChannelLayout::from_channels(info.channels);
            info.audio_bit_rate = unsafe { (*stream.parameters().as_ptr()).bit_rate };
            info.audio_codec_name = decoder.codec().map(|c| c.name().to_string()).unwrap_or_default();
        }

        if !info.has_video && !info.has_audio {
            return Err(ReaderError::NoStreamsFound {
                message: "no decodable video or audio stream".into(),
                path,
            });
        }

        let pts = PtsMapper {
            fps: info.fps,
            video_timebase: info.video_timebase,
            audio_timebase: info.audio_timebase,
        };

        let mut reader = MediaReader {
            path,
            info,
            opened: true,
            enable_seek: true,
            max_width: 0,
            max_height: 0,
            ictx: None,
            video_decoder: None,
            audio_decoder: None,
            working_cache: WorkingCache::new(),
            missing_frames: FrameCache::unbounded(),
            final_cache: FrameCache::unbounded(),
            bookkeeping: Mutex::new(Bookkeeping::new()),
            pts,
            video_pts_offset: None,
            audio_pts_offset: None,
            seek_state: SeekState::default(),
            last_frame: 0,
            largest_frame_processed: 0,
            current_video_frame: 0,
            previous_packet_location: None,
            last_video_frame: None,
        };

        reader.open_codec_contexts()?;
        reader.size_caches();
        Ok(reader)
    }

    fn open_codec_contexts(&mut self) -> Result<(), ReaderError> {
        let thread_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let ictx = ffmpeg::format::input(&self.path).map_err(|e| ReaderError::InvalidFile {
            message: e.to_string(),
            path: self.path.clone(),
        })?;

        if self.info.has_video {
            let stream = ictx
                .stream(self.info.video_stream_index as usize)
                .ok_or_else(|| ReaderError::InvalidCodec {
                    message: "video stream vanished on reopen".into(),
                    path: self.path.clone(),
                })?;
            let mut codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| ReaderError::InvalidCodec {
                    message: e.to_string(),
                    path: self.path.clone(),
                })?;
            codec_ctx.set_threading(ffmpeg::threading::Config {
                kind: ffmpeg::threading::Type::Frame,
                count: thread_count,
                safe: true,
            });
            self.video_decoder = Some(codec_ctx.decoder().video().map_err(|e| ReaderError::InvalidCodec {
                message: e.to_string(),
                path: self.path.clone(),
            })?);
        }

        if self.info.has_audio {
            let stream = ictx
                .stream(self.info.audio_stream_index as usize)
                .ok_or_else(|| ReaderError::InvalidCodec {
                    message: "audio stream vanished on reopen".into(),
                    path: self.path.clone(),
                })?;
            let codec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| ReaderError::InvalidCodec {
                    message: e.to_string(),
                    path: self.path.clone(),
                })?;
            self.audio_decoder = Some(codec_ctx.decoder().audio().map_err(|e| ReaderError::InvalidCodec {
                message: e.to_string(),
                path: self.path.clone(),
            })?);
        }

        self.ictx = Some(ictx);
        Ok(())
    }

    /// Sizes the byte budgets of `final_cache` and `missing_frames`
    /// proportional to decode parallelism. `working_cache` holds nothing
    /// but in-flight frames and has no budget of its own — its original
    /// headroom (`threads * 30`) is given to `final_cache` instead, since
    /// that's the cache callers actually hold frames from.
    fn size_caches(&mut self) {
        let thread_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as u64;
        let (w, h) = (self.info.width.max(1) as u32, self.info.height.max(1) as u32);
        let (sr, ch) = (self.info.sample_rate.max(1) as u32, self.info.channels.max(1) as u32);

        self.final_cache
            .set_max_bytes_from_info(thread_count * 30, w, h, sr, ch);
        self.missing_frames
            .set_max_bytes_from_info(thread_count * 2, w, h, sr, ch);
    }

    pub(crate) fn reopen(&mut self) {
        let had_video = self.info.has_video;
        let had_audio = self.info.has_audio;
        self.video_decoder = None;
        self.audio_decoder = None;
        self.ictx = None;
        self.video_pts_offset = None;
        self.audio_pts_offset = None;
        if self.open_codec_contexts().is_ok() {
            self.info.has_video = had_video;
            self.info.has_audio = had_audio;
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn set_enable_seek(&mut self, enable: bool) {
        self.enable_seek = enable;
    }

    pub fn set_max_size(&mut self, width: u32, height: u32) {
        self.max_width = width;
        self.max_height = height;
    }

    pub fn cache(&self) -> &FrameCache {
        &self.final_cache
    }

    pub fn display_info(&self) {
        self.info.display();
    }

    pub fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.video_decoder = None;
        self.audio_decoder = None;
        self.ictx = None;
        self.working_cache.clear();
        self.missing_frames.clear();
        self.final_cache.clear();
        self.bookkeeping.lock().unwrap().clear();
        self.last_frame = 0;
        self.largest_frame_processed = 0;
        self.current_video_frame = 0;
        self.previous_packet_location = None;
        self.last_video_frame = None;
        self.video_pts_offset = None;
        self.audio_pts_offset = None;
        self.seek_state = SeekState::default();
        self.opened = false;
    }

    /// Returns the frame at `requested_frame`, clamped to
    /// `[1, video_length_frames]` when the length is known.
    pub fn get_frame(&mut self, requested_frame: i64) -> Result<Arc<Frame>, ReaderError> {
        if !self.opened {
            return Err(ReaderError::ReaderClosed {
                message: "get_frame called on a closed reader".into(),
                path: self.path.clone(),
            });
        }

        let requested_frame = if self.info.video_length_frames > 0 {
            requested_frame.clamp(1, self.info.video_length_frames)
        } else {
            requested_frame.max(1)
        };

        if let Some(frame) = self.final_cache.get(requested_frame) {
            return Ok(frame);
        }

        // Frame 1 establishes video_pts_offset/audio_pts_offset from the
        // first packet of each stream; every PTS-to-frame conversion after
        // that (including the seek below) depends on them. If this is the
        // very first read and it isn't already asking for frame 1, prime
        // the offsets before doing anything frame-1-aware like seeking.
        if self.last_frame == 0 && requested_frame != 1 {
            self.read_stream(1);
        }

        let diff = requested_frame - self.last_frame;
        if self.last_frame != 0 && (1..=20).contains(&diff) {
            // Forward within range: keep streaming from the current position.
        } else if self.enable_seek {
            self.seek(requested_frame);
        } else if diff < 0 {
            self.reopen();
        }

        self.read_stream(requested_frame);

        if let Some(frame) = self.final_cache.get(requested_frame) {
            Ok(frame)
        } else if let Some(frame) = self.final_cache.get(self.largest_frame_processed) {
            Ok(frame)
        } else {
            let mut blank = Frame::blank(requested_frame, self.info.sample_rate, self.info.channels);
            blank.add_color(
                self.info.width.max(1) as u32,
                self.info.height.max(1) as u32,
                [0, 0, 0, 255],
            );
            Ok(Arc::new(blank))
        }
    }
}

impl Drop for MediaReader {
    fn drop(&mut self) {
        self.close();
    }
}
