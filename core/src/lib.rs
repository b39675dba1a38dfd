pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod poller;
pub mod source;
pub mod video;
pub mod widget;

// Re-exports
pub use config::PlayerConfig;
pub use controller::{ControllerEvent, PlaybackStatus, PlayerController, PlayerState, SeekBar};
pub use error::{PlayerError, Result};
pub use source::{DEFAULT_URL, MediaType, PlaybackSource};
pub use video::{MediaInfo, VideoFrame};
pub use widget::{FfmpegWidget, PlaybackWidget, SharedWidget, WidgetEvent};
