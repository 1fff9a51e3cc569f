// The packet pump: demuxes one packet at a time, routes it to the video or
// audio processor, and runs the promotion/gap-filling sweeps that move
// completed frames from `working_cache` into `final_cache`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ffmpeg_the_third as ffmpeg;

use scanline_core::{Frame, PictureType};

use crate::bookkeeping::FORCE_COMPLETE_AFTER_CHECKS;
use crate::pts::PtsMapper;
use crate::reader::MediaReader;

/// A decoded frame more than this many frames behind the one actually
/// requested is assumed to be pre-roll left over from a keyframe seek, and
/// is decoded (to keep the codec state correct) but otherwise discarded.
const DISCARD_BEHIND_REQUESTED: i64 = 20;

/// Packets are pumped until the target frame is ready, or until this many
/// have been processed in a single call — a hard backstop against a
/// pathological file that never produces the requested frame.
const MAX_PACKETS_PER_CALL: u32 = 4096;

impl MediaReader {
    pub(crate) fn read_stream(&mut self, requested_frame: i64) {
        let thread_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let mut packets_processed: u32 = 0;

        loop {
            if packets_processed >= MAX_PACKETS_PER_CALL {
                break;
            }

            while self.bookkeeping.lock().unwrap().processing_count() >= thread_count {
                thread::sleep(Duration::from_millis(1));
            }

            let next = match self.ictx.as_mut() {
                Some(ictx) => ictx.packets().next(),
                None => None,
            };

            let (stream_index, packet) = match next {
                Some(Ok((stream, packet))) => (stream.index(), packet),
                Some(Err(_)) => continue,
                None => {
                    self.finish_stream(requested_frame);
                    break;
                }
            };
            packets_processed += 1;

            if self.info.has_video && stream_index == self.info.video_stream_index as usize {
                self.process_video_packet(&packet, requested_frame);
            } else if self.info.has_audio && stream_index == self.info.audio_stream_index as usize {
                self.process_audio_packet(&packet, requested_frame);
            }

            if !self.seek_state.is_seeking {
                self.check_missing_frame(requested_frame);
                self.check_working_frames(false, requested_frame);
            }

            if self.final_cache.get(requested_frame).is_some() && packets_processed >= thread_count as u32 {
                break;
            }
        }
    }

    /// Called once the demuxer reports end of stream: sweeps every
    /// remaining working frame through promotion, forcing completion of
    /// anything still partial instead of waiting for packets that will
    /// never arrive.
    fn finish_stream(&mut self, requested_frame: i64) {
        self.check_working_frames(true, requested_frame);
    }

    pub(crate) fn process_video_packet(&mut self, packet: &ffmpeg::Packet, requested_frame: i64) {
        // Decoder is taken out of `self` for the duration of this call so the
        // loop body below is free to call other `&mut self` methods (seek
        // handling, bookkeeping) without fighting the borrow checker over a
        // long-lived reference into one of `self`'s fields.
        let Some(mut decoder) = self.video_decoder.take() else { return };
        if decoder.send_packet(packet).is_err() {
            self.video_decoder = Some(decoder);
            return;
        }

        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let pts = match decoded.pts() {
                Some(p) => p,
                None => continue,
            };

            if self.video_pts_offset.is_none() {
                self.video_pts_offset = Some(PtsMapper::establish_offset(pts));
            }
            let offset = self.video_pts_offset.unwrap();
            let current_frame = self.pts.video_pts_to_frame(pts, offset);

            if self.seek_state.is_seeking && self.check_seek(true, current_frame) {
                continue;
            }

            if current_frame == self.current_video_frame {
                continue; // duplicate PTS, same frame already emitted
            }
            if current_frame > self.current_video_frame && self.current_video_frame > 0 {
                let mut bk = self.bookkeeping.lock().unwrap();
                for missing in (self.current_video_frame + 1)..current_frame {
                    bk.record_missing_video(missing, self.current_video_frame);
                }
            }
            self.current_video_frame = current_frame;

            if current_frame < requested_frame - DISCARD_BEHIND_REQUESTED {
                continue;
            }

            self.bookkeeping.lock().unwrap().begin_video(current_frame);

            let (out_w, out_h) = crate::helpers::scale::constrained_size(
                decoder.width(),
                decoder.height(),
                self.max_width,
                self.max_height,
            );

            let scaled = match scale_to_rgba(decoder.format(), decoder.width(), decoder.height(), out_w, out_h, &decoded) {
                Some(pixels) => pixels,
                None => {
                    self.bookkeeping.lock().unwrap().end_video(current_frame);
                    continue;
                }
            };

            let working = self
                .working_cache
                .get_or_create(current_frame, self.info.sample_rate, self.info.channels);
            {
                let mut frame = working.lock().unwrap();
                frame.add_image(out_w, out_h, 4, &scaled);
                frame.picture_type = picture_type_from_ffmpeg(decoded.picture_type());
            }
            self.last_video_frame = Some(Arc::new(working.lock().unwrap().clone()));

            self.bookkeeping.lock().unwrap().end_video(current_frame);
            self.largest_frame_processed = self.largest_frame_processed.max(current_frame);
        }

        self.video_decoder = Some(decoder);
    }

    pub(crate) fn process_audio_packet(&mut self, packet: &ffmpeg::Packet, requested_frame: i64) {
        let Some(mut decoder) = self.audio_decoder.take() else { return };
        if decoder.send_packet(packet).is_err() {
            self.audio_decoder = Some(decoder);
            return;
        }

        let mut decoded = ffmpeg::util::frame::audio::Audio::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let pts = match decoded.pts() {
                Some(p) => p,
                None => continue,
            };

            if self.audio_pts_offset.is_none() {
                self.audio_pts_offset = Some(PtsMapper::establish_offset(pts));
            }
            let offset = self.audio_pts_offset.unwrap();

            let mut location = self
                .pts
                .audio_pts_location(pts, offset, self.info.sample_rate, self.info.channels);

            if self.seek_state.is_seeking && self.check_seek(false, location.frame) {
                continue;
            }

            if location.frame < requested_frame - DISCARD_BEHIND_REQUESTED {
                continue;
            }

            if let Some(prev) = self.previous_packet_location {
                let spf = Frame::samples_per_frame(location.frame, self.pts.fps, self.info.sample_rate, self.info.channels);
                if location.is_near(&prev, spf.max(1)) {
                    location = prev;
                } else if location.frame > prev.frame {
                    let mut bk = self.bookkeeping.lock().unwrap();
                    for missing in (prev.frame + 1)..location.frame {
                        bk.record_missing_audio(missing, prev.frame);
                    }
                }
            }

            let channels = self.info.channels.max(1) as usize;
            let samples_i16 = interleaved_i16(&decoded, channels);
            let total_samples = samples_i16.len() / channels;

            let mut per_channel: Vec<Vec<f32>> = vec![Vec::with_capacity(total_samples); channels];
            for frame_idx in 0..total_samples {
                for ch in 0..channels {
                    let raw = samples_i16[frame_idx * channels + ch];
                    per_channel[ch].push(raw as f32 / 32_768.0);
                }
            }

            let mut cursor_frame = location.frame;
            let mut cursor_sample = location.sample_start as usize;
            let mut consumed = 0usize;
            const GAIN: f32 = 0.98;

            while consumed < total_samples {
                let spf = Frame::samples_per_frame(cursor_frame, self.pts.fps, self.info.sample_rate, self.info.channels)
                    .max(1) as usize;
                let remaining_in_frame = spf.saturating_sub(cursor_sample);
                let take = remaining_in_frame.min(total_samples - consumed);
                if take == 0 {
                    cursor_frame += 1;
                    cursor_sample = 0;
                    continue;
                }

                self.bookkeeping.lock().unwrap().begin_audio(cursor_frame);
                let working = self
                    .working_cache
                    .get_or_create(cursor_frame, self.info.sample_rate, self.info.channels);
                {
                    let mut frame = working.lock().unwrap();
                    for ch in 0..channels {
                        let slice = &per_channel[ch][consumed..consumed + take];
                        frame.add_audio(true, ch, cursor_sample, slice, GAIN);
                    }
                }
                self.bookkeeping.lock().unwrap().end_audio(cursor_frame);
                self.largest_frame_processed = self.largest_frame_processed.max(cursor_frame);

                consumed += take;
                cursor_sample += take;
                if cursor_sample >= spf {
                    cursor_frame += 1;
                    cursor_sample = 0;
                }
            }

            self.previous_packet_location = Some(scanline_core::AudioLocation {
                frame: cursor_frame,
                sample_start: cursor_sample as i64,
            });
        }

        self.audio_decoder = Some(decoder);
    }

    /// Pulls the smallest-indexed frame out of `working_cache` and promotes
    /// it into `final_cache` once both of its applicable streams are
    /// ready, stopping at the first frame that isn't ready yet so frames
    /// are never delivered out of order.
    pub(crate) fn check_working_frames(&mut self, end_of_stream: bool, _requested_frame: i64) {
        loop {
            let Some(number) = self.working_cache.smallest_number() else { break };

            self.check_missing_frame(number);

            let Some(working) = self.working_cache.get(number) else { continue };

            let mut bk = self.bookkeeping.lock().unwrap();
            let mut is_video_ready = bk.is_video_ready(number, self.info.has_video);
            let mut is_audio_ready = bk.is_audio_ready(number, self.info.has_audio);

            // The most recently written audio packet may still be filling
            // this exact frame's sample window. Don't promote out from
            // under it until either the stream has ended or a later packet
            // has moved on to writing a different frame.
            if is_audio_ready {
                if let Some(prev) = self.previous_packet_location {
                    if prev.frame == number && !end_of_stream {
                        is_audio_ready = false;
                    }
                }
            }

            let checked = bk.check(number);
            if checked >= FORCE_COMPLETE_AFTER_CHECKS && !(is_video_ready && is_audio_ready) {
                bk.mark_processed(number, true, true);
                is_video_ready = true;
                is_audio_ready = true;
            }
            drop(bk);

            if self.is_seek_trash(number) {
                self.working_cache.remove(number);
                self.bookkeeping.lock().unwrap().forget(number);
                continue;
            }

            if !(end_of_stream || (is_video_ready && is_audio_ready)) {
                break;
            }

            let mut completed = working.lock().unwrap().clone();
            if self.info.has_video && completed.image().is_none() {
                if let Some(last) = &self.last_video_frame {
                    if let Some(img) = last.image() {
                        completed.add_image(img.width, img.height, 4, &img.data);
                    }
                }
            }

            let completed = Arc::new(completed);
            self.final_cache.add(completed.clone());
            if self.bookkeeping.lock().unwrap().take_missing_source(number).is_some() {
                self.missing_frames.add(completed);
            }

            self.working_cache.remove(number);
            self.bookkeeping.lock().unwrap().forget(number);
            self.last_frame = self.last_frame.max(number);
        }
    }

    /// Fills `requested` from a previously completed frame if it was ever
    /// recorded missing (a gap the decoder itself never produced a packet
    /// for), promoting the substitute directly into `final_cache`.
    pub(crate) fn check_missing_frame(&mut self, requested: i64) {
        self.bookkeeping.lock().unwrap().check(requested);

        let Some(source_number) = self.bookkeeping.lock().unwrap().take_missing_source(requested) else {
            return;
        };

        let source = self
            .missing_frames
            .get(source_number)
            .or_else(|| self.final_cache.get(source_number));

        let Some(source) = source else { return };

        let mut substitute = Frame::blank(requested, self.info.sample_rate, self.info.channels);
        if let Some(img) = source.image() {
            substitute.add_image(img.width, img.height, 4, &img.data);
        }

        let substitute = Arc::new(substitute);
        self.final_cache.add(substitute.clone());
        self.missing_frames.add(source);
        self.working_cache.remove(requested);
        self.bookkeeping.lock().unwrap().mark_processed(requested, true, true);
        self.last_frame = self.last_frame.max(requested);
    }

    /// A frame decoded immediately after a seek, before the seek's own
    /// target window has caught up, is pre-roll: the demuxer landed on the
    /// keyframe before the target and is still decoding through the gap.
    fn is_seek_trash(&self, number: i64) -> bool {
        if self.seek_state.seek_count == 0 {
            return false;
        }
        let max_seeked = self
            .seek_state
            .seek_audio_frame_found
            .max(self.seek_state.seek_video_frame_found);
        max_seeked > 0 && number < self.seek_state.seeking_frame && number <= max_seeked
    }
}

/// Collapses FFmpeg's full picture-type enum (which distinguishes switching
/// and SI/SP variants no consumer of this crate cares about) onto the
/// reader's own `I`/`P`/`B`/`Unknown`.
fn picture_type_from_ffmpeg(kind: ffmpeg::picture::Type) -> PictureType {
    use ffmpeg::picture::Type as FfiPictureType;
    match kind {
        FfiPictureType::I => PictureType::I,
        FfiPictureType::P => PictureType::P,
        FfiPictureType::B => PictureType::B,
        _ => PictureType::Unknown,
    }
}

fn scale_to_rgba(
    src_format: ffmpeg::format::Pixel,
    src_w: u32,
    src_h: u32,
    out_w: u32,
    out_h: u32,
    decoded: &ffmpeg::util::frame::video::Video,
) -> Option<Vec<u8>> {
    use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};

    let mut scaler = SwsContext::get(src_format, src_w, src_h, ffmpeg::format::Pixel::RGBA, out_w, out_h, Flags::BILINEAR).ok()?;
    let mut out = ffmpeg::util::frame::video::Video::empty();
    scaler.run(decoded, &mut out).ok()?;

    let stride = out.stride(0);
    let raw = out.data(0);
    let row_bytes = out_w as usize * 4;
    Some(
        (0..out_h as usize)
            .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
            .copied()
            .collect(),
    )
}

/// De-interleaves nothing — resamples the decoded frame to signed 16-bit
/// interleaved PCM at the source rate, matching the codec-library contract
/// the reader was specified against.
fn interleaved_i16(decoded: &ffmpeg::util::frame::audio::Audio, channels: usize) -> Vec<i16> {
    use ffmpeg::software::resampling::context::Context as ResamplingContext;
    use ffmpeg::util::format::sample::{Sample as SampleFormat, Type as SampleType};

    let mut resampler = match ResamplingContext::get(
        decoded.format(),
        decoded.channel_layout(),
        decoded.rate(),
        SampleFormat::I16(SampleType::Packed),
        decoded.channel_layout(),
        decoded.rate(),
    ) {
        Ok(r) => r,
        Err(_) => return vec![0; decoded.samples() * channels],
    };

    let mut resampled = ffmpeg::util::frame::audio::Audio::empty();
    if resampler.run(decoded, &mut resampled).is_err() {
        return vec![0; decoded.samples() * channels];
    }

    let raw = resampled.data(0);
    let n = resampled.samples() * channels;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(i16::from_ne_bytes([raw[i * 2], raw[i * 2 + 1]]));
    }
    out
}
