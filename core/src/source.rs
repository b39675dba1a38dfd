use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sample clip loaded when nothing else is configured
pub const DEFAULT_URL: &str =
    "https://file-examples-com.github.io/uploads/2017/04/file_example_MP4_480_1_5MG.mp4";

/// Media types offered by the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Progressive MP4 file
    #[default]
    Mp4,
    /// HLS playlist (selectable, no playback path)
    M3u8,
}

impl MediaType {
    /// Every selectable type, in selector order
    pub const ALL: [MediaType; 2] = [MediaType::Mp4, MediaType::M3u8];

    /// MIME type handed to the playback widget along with the source
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaType::Mp4 => "video/mp4",
            MediaType::M3u8 => "application/x-mpegURL",
        }
    }

    /// Whether the load pipeline can play this type
    pub fn is_supported(self) -> bool {
        matches!(self, MediaType::Mp4)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Mp4 => "mp4",
            MediaType::M3u8 => "m3u8",
        }
    }

    /// Next entry in the selector, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Previous entry in the selector, wrapping around
    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(MediaType::Mp4),
            "m3u8" | "hls" => Ok(MediaType::M3u8),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// What the user has typed and selected; only read when a load starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSource {
    pub url: String,
    pub media_type: MediaType,
}

impl Default for PlaybackSource {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            media_type: MediaType::Mp4,
        }
    }
}

impl PlaybackSource {
    pub fn new(url: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            url: url.into(),
            media_type,
        }
    }
}
