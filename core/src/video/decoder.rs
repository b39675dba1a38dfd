use super::{MediaInfo, VideoFrame as Frame, init};
use anyhow::{Context, Result, anyhow};
use ffmpeg_next as ffmpeg;
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use std::time::{Duration, Instant};

/// Longest a single decode call may spend before the stream is treated as broken
const DECODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sequential video decoder over a local media file
pub struct VideoDecoder {
    format_context: ffmpeg::format::context::Input,
    video_stream_index: usize,
    codec_context: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    frame_rate: f64,
    time_base: f64,
    next_pts: i64,
    draining: bool,
    eof: bool,
}

impl VideoDecoder {
    /// Open the media file at `path` and prepare its first video stream
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        init().context("Failed to initialize FFmpeg - check FFmpeg library installation")?;

        let path_str = path.as_ref().to_string_lossy();
        log::info!("Opening media: {}", path_str);

        if !path.as_ref().is_file() {
            return Err(anyhow!("Media file does not exist: {}", path_str));
        }

        let format_context = ffmpeg::format::input(&path)
            .map_err(|e| anyhow!("Failed to open '{}' as a media file: {}", path_str, e))?;
        log::debug!(
            "Opened container {} with {} streams",
            format_context.format().name(),
            format_context.streams().count()
        );

        let (video_stream_index, stream) = format_context
            .streams()
            .enumerate()
            .find(|(_, s)| s.parameters().medium() == ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {}", path_str))?;

        let codec_name = stream.parameters().id().name();
        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .with_context(|| format!("Failed to create decoder context for codec {}", codec_name))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .with_context(|| format!("Failed to create video decoder for codec {}", codec_name))?;

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(anyhow!("Invalid video dimensions: {}x{}", decoder.width(), decoder.height()));
        }

        let frame_rate = f64::from(stream.rate().0) / f64::from(stream.rate().1);
        let time_base = f64::from(stream.time_base().0) / f64::from(stream.time_base().1);

        let frame_rate = if frame_rate.is_nan() || frame_rate <= 0.0 || frame_rate > 1000.0 {
            log::warn!("Unusual frame rate detected: {:.2} fps, using 30fps", frame_rate);
            30.0
        } else {
            frame_rate
        };

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGBA,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| anyhow!("Failed to create scaler for pixel format {:?}: {}", decoder.format(), e))?;

        log::info!(
            "Video decoder ready: {} {}x{} @ {:.2}fps",
            codec_name,
            decoder.width(),
            decoder.height(),
            frame_rate
        );

        Ok(Self {
            format_context,
            video_stream_index,
            codec_context: decoder,
            scaler,
            frame_rate,
            time_base,
            next_pts: 0,
            draining: false,
            eof: false,
        })
    }

    /// Container duration in seconds, 0 when the container does not say
    pub fn duration(&self) -> f64 {
        let raw = self.format_context.duration();
        if raw <= 0 {
            return 0.0;
        }
        raw as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    }

    pub fn get_media_info(&self) -> MediaInfo {
        let audio_codec = self
            .format_context
            .streams()
            .find(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
            .map(|s| s.parameters().id().name().to_string());

        MediaInfo {
            duration: self.duration(),
            width: self.codec_context.width(),
            height: self.codec_context.height(),
            frame_rate: self.frame_rate,
            format_name: self.format_context.format().name().to_string(),
            video_codec: self.codec_context.id().name().to_string(),
            audio_codec,
        }
    }

    /// Decode the next frame, `None` once the stream is exhausted
    pub fn decode_next_frame(&mut self) -> Result<Option<Frame>> {
        if self.eof {
            return Ok(None);
        }

        let start_time = Instant::now();
        loop {
            if start_time.elapsed() > DECODE_TIMEOUT {
                return Err(anyhow!(
                    "Timeout while decoding frame at {:.2}s - possible corrupted video segment",
                    self.next_pts as f64 * self.time_base
                ));
            }

            // Drain whatever the decoder already holds before feeding more packets
            if let Some(frame) = self.receive_frame()? {
                return Ok(Some(frame));
            }

            if self.draining {
                self.eof = true;
                log::debug!("End of video stream reached");
                return Ok(None);
            }

            match self.format_context.packets().next() {
                Some((stream, packet)) if stream.index() == self.video_stream_index => {
                    if let Err(e) = self.codec_context.send_packet(&packet) {
                        log::warn!(
                            "Error sending packet at {:.2}s: {}",
                            packet.pts().unwrap_or(self.next_pts) as f64 * self.time_base,
                            e
                        );
                    }
                }
                Some(_) => continue,
                None => {
                    // Flush the decoder so trailing frames come out
                    let _ = self.codec_context.send_eof();
                    self.draining = true;
                }
            }
        }
    }

    fn receive_frame(&mut self) -> Result<Option<Frame>> {
        let mut frame = ffmpeg::util::frame::video::Video::empty();
        match self.codec_context.receive_frame(&mut frame) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other {
                errno: ffmpeg::error::EAGAIN,
            })
            | Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => {
                log::warn!("Error receiving frame: {}", e);
                return Ok(None);
            }
        }

        let pts = frame.timestamp().or(frame.pts()).unwrap_or(self.next_pts);
        self.next_pts = pts + 1;
        let timestamp = pts as f64 * self.time_base;

        let mut rgba = ffmpeg::util::frame::video::Video::empty();
        self.scaler
            .run(&frame, &mut rgba)
            .map_err(|e| anyhow!("Failed to scale video frame: {}", e))?;

        let width = rgba.width();
        let height = rgba.height();
        let stride = rgba.stride(0);
        let row_bytes = width as usize * 4;

        // Rows may be padded; copy only the visible pixels
        let data = rgba.data(0);
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            if end > data.len() {
                return Err(anyhow!("Corrupted frame data for {}x{} frame", width, height));
            }
            pixels.extend_from_slice(&data[start..end]);
        }

        let image = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("Failed to build {}x{} image", width, height))?;

        log::trace!("Decoded frame at {:.3}s", timestamp);
        Ok(Some(Frame::new(
            DynamicImage::ImageRgba8(image),
            timestamp,
            1.0 / self.frame_rate,
        )))
    }

    /// Seek to a timestamp in seconds, clamped to the stream
    pub fn seek(&mut self, timestamp_secs: f64) -> Result<()> {
        let duration = self.duration();
        let timestamp_secs = if duration > 0.0 {
            timestamp_secs.clamp(0.0, duration)
        } else {
            timestamp_secs.max(0.0)
        };
        log::debug!("Seeking to {:.2}s", timestamp_secs);

        let timestamp = (timestamp_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        self.format_context
            .seek(timestamp, ..timestamp)
            .map_err(|e| anyhow!("Failed to seek to {:.2}s: {}", timestamp_secs, e))?;

        self.codec_context.flush();
        self.draining = false;
        self.eof = false;
        self.next_pts = (timestamp_secs / self.time_base) as i64;
        Ok(())
    }
}
