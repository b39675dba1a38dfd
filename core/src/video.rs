pub mod decoder;
pub mod worker;

pub use decoder::VideoDecoder;

use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use ffmpeg_next as ffmpeg;
use image::DynamicImage;

// Initialize FFmpeg only once; a failed first attempt is reported on every call
pub fn init() -> Result<()> {
    static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();
    init_once(&INIT, ffmpeg::init)
}

fn init_once<E: std::fmt::Display>(
    cell: &OnceLock<std::result::Result<(), String>>,
    init: impl FnOnce() -> std::result::Result<(), E>,
) -> Result<()> {
    cell.get_or_init(|| init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| anyhow!("Failed to initialize ffmpeg: {}", e))
}

/// A decoded video frame with timestamp information
#[derive(Clone)]
pub struct VideoFrame {
    /// The frame data as an RGBA image
    pub image: DynamicImage,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
    /// Duration of this frame in seconds
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn new(image: DynamicImage, timestamp: f64, duration: f64) -> Self {
        let width = image.width();
        let height = image.height();

        Self {
            image,
            timestamp,
            duration,
            width,
            height,
        }
    }

    /// Scale the frame to fit inside the target box, keeping its aspect ratio
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> Self {
        if self.width == 0 || self.height == 0 || max_width == 0 || max_height == 0 {
            return self.clone();
        }
        if self.width <= max_width && self.height <= max_height {
            return self.clone();
        }

        let ratio = self.width as f32 / self.height as f32;
        let (new_width, new_height) = if max_width as f32 / max_height as f32 > ratio {
            // Height is the limiting factor
            (((max_height as f32) * ratio).max(1.0) as u32, max_height)
        } else {
            (max_width, ((max_width as f32) / ratio).max(1.0) as u32)
        };

        // Large downscales look noticeably better with a smoothing filter
        let scale = new_width as f32 / self.width as f32;
        let filter = if scale < 0.7 {
            image::imageops::FilterType::Triangle
        } else {
            image::imageops::FilterType::Nearest
        };

        let resized = self.image.resize_exact(new_width, new_height, filter);
        VideoFrame::new(resized, self.timestamp, self.duration)
    }

    /// End of this frame's display window
    pub fn end_time(&self) -> f64 {
        self.timestamp + self.duration
    }
}

/// Stream information about an opened media file
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration: f64,       // Total duration in seconds, 0 when unknown
    pub width: u32,          // Video width in pixels
    pub height: u32,         // Video height in pixels
    pub frame_rate: f64,     // Frames per second
    pub format_name: String, // Container name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    pub video_codec: String,
    pub audio_codec: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn solid_frame(width: u32, height: u32) -> VideoFrame {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(width, height, |_, _| Rgba([255, 0, 0, 255]));
        VideoFrame::new(DynamicImage::ImageRgba8(img), 1.0, 0.04)
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        // 640x480 into the default 320x240 widget box
        let fitted = solid_frame(640, 480).fit_within(320, 240);
        assert_eq!((fitted.width, fitted.height), (320, 240));

        // 2:1 into a square box is width-limited
        let fitted = solid_frame(200, 100).fit_within(50, 50);
        assert_eq!((fitted.width, fitted.height), (50, 25));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        let fitted = solid_frame(100, 50).fit_within(320, 240);
        assert_eq!((fitted.width, fitted.height), (100, 50));
        assert_eq!(fitted.timestamp, 1.0);
    }

    #[test]
    fn test_failed_init_is_reported_again() {
        let cell = OnceLock::new();
        assert!(init_once(&cell, || Err("no codecs")).is_err());
        // A later attempt must not paper over the first failure
        let again = init_once(&cell, || Ok::<(), &str>(()));
        assert!(again.unwrap_err().to_string().contains("no codecs"));
    }

    #[test]
    fn test_end_time() {
        let frame = solid_frame(2, 2);
        assert!((frame.end_time() - 1.04).abs() < 1e-9);
    }
}
