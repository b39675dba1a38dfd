use thiserror::Error;

use crate::source::MediaType;

/// Errors produced by the player core
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The server answered with something other than 200 OK
    #[error("network error: {status} {status_text}")]
    Network { status: u16, status_text: String },

    /// Connection-level failure, abort, timeout or truncated body
    #[error("transfer failed: {0}")]
    Transfer(#[from] reqwest::Error),

    /// The playback engine reported a failure
    #[error("playback widget error: {0}")]
    Widget(String),

    /// The selected media type has no working playback path
    #[error("media type '{0}' is not supported")]
    UnsupportedMediaType(MediaType),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PlayerError {
    /// Wrap an engine-side error
    pub fn widget(err: impl std::fmt::Display) -> Self {
        Self::Widget(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
