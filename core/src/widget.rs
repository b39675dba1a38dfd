pub mod engine;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{PlayerError, Result};
use crate::fetch::BlobUrl;
use crate::video::VideoFrame;

pub use engine::FfmpegWidget;

/// Capacity of a widget's event channel
pub const EVENT_CAPACITY: usize = 64;

/// Notifications a playback widget publishes to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// The first frame of a newly assigned source is available
    LoadedData,
    Play,
    Pause,
    /// Position jumped to the given time in seconds
    Seeked(f64),
    /// Playback reached the end of the media
    Ended,
    /// Internal engine failure
    Error(String),
}

/// A source handed to the widget: the blob reference plus its MIME type
#[derive(Debug)]
pub struct MediaSource {
    pub blob: BlobUrl,
    pub mime_type: &'static str,
}

/// Common capability of every playback engine
///
/// The widget owns the source it was given and its own playback clock.
/// Callers drive the clock with [`PlaybackWidget::tick`], which must be called
/// regularly since engines may deliver readiness from it, and observe state
/// changes through [`PlaybackWidget::subscribe`].
pub trait PlaybackWidget: Send {
    /// Replace the current source. Readiness is announced with
    /// [`WidgetEvent::LoadedData`] on the event channel.
    fn src(&mut self, source: MediaSource) -> Result<()>;

    /// Start or resume playback
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn paused(&self) -> bool;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// Jump to an absolute time in seconds; the engine clamps to the media
    fn set_current_time(&mut self, secs: f64) -> Result<()>;

    /// Total duration in seconds, 0 when nothing is loaded
    fn duration(&self) -> f64;

    /// New receiver for every event published from now on
    fn subscribe(&self) -> broadcast::Receiver<WidgetEvent>;

    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Advance the playback clock, decoding whatever frames are due
    fn tick(&mut self) -> Result<()>;

    /// Frame currently on screen
    fn current_frame(&self) -> Option<&VideoFrame>;
}

/// Lifetime-scoped handle to the single widget instance
pub type SharedWidget = Arc<Mutex<dyn PlaybackWidget>>;

pub fn shared<W: PlaybackWidget + 'static>(widget: W) -> SharedWidget {
    Arc::new(Mutex::new(widget))
}

/// Wait for the next `LoadedData` event on a subscription taken before the
/// source was assigned. An `Error` event or a dropped widget fails the wait.
pub async fn loaded_data(events: &mut broadcast::Receiver<WidgetEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(WidgetEvent::LoadedData) => return Ok(()),
            Ok(WidgetEvent::Error(message)) => return Err(PlayerError::Widget(message)),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Missed {} widget events while waiting for data", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(PlayerError::widget("widget went away before data loaded"));
            }
        }
    }
}
