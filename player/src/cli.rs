use std::path::PathBuf;

use blobplay_core::{MediaType, PlayerConfig};
use clap::Parser;

/// Terminal player for media downloaded over HTTP
#[derive(Debug, Parser)]
#[command(name = "blobplay", version, about)]
pub struct Args {
    /// URL to put in the URL field instead of the configured default
    pub url: Option<String>,

    /// Media type to select (mp4 or m3u8)
    #[arg(long = "type", value_name = "TYPE")]
    pub media_type: Option<MediaType>,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Progress poll interval in milliseconds
    #[arg(long, value_name = "N")]
    pub poll_interval_ms: Option<u64>,

    /// Widget width in pixels
    #[arg(long, value_name = "N")]
    pub width: Option<u32>,

    /// Widget height in pixels
    #[arg(long, value_name = "N")]
    pub height: Option<u32>,

    /// HTTP request timeout in seconds, 0 disables it
    #[arg(long, value_name = "N")]
    pub timeout_secs: Option<u64>,

    /// Where to write the log
    #[arg(long, value_name = "PATH", default_value = "blobplay.log")]
    pub log_file: PathBuf,

    /// Start loading the URL right away
    #[arg(long)]
    pub autoplay: bool,
}

impl Args {
    /// Layer the flags over a loaded config
    pub fn apply(&self, config: &mut PlayerConfig) {
        if let Some(url) = &self.url {
            config.default_url = url.clone();
        }
        if let Some(media_type) = self.media_type {
            config.default_media_type = media_type;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(width) = self.width {
            config.widget_width = width;
        }
        if let Some(height) = self.height {
            config.widget_height = height;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = (secs > 0).then_some(secs);
        }
    }
}
