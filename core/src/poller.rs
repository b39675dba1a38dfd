use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::controller::PlaybackStatus;
use crate::widget::PlaybackWidget;

/// Fraction of the media played, 0 when the duration is not usable yet
pub fn progress_fraction(current_time: f64, duration: f64) -> f64 {
    if !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
        return 0.0;
    }
    (current_time / duration).clamp(0.0, 1.0)
}

/// Periodic task sampling the widget's position into the shared status
///
/// The task holds only a weak reference to the widget and exits on its own
/// once the widget is gone; dropping the poller cancels it immediately.
pub struct ProgressPoller {
    handle: JoinHandle<()>,
}

impl ProgressPoller {
    /// Start polling on the current tokio runtime
    pub fn spawn(
        widget: Weak<Mutex<dyn PlaybackWidget>>,
        status: Arc<Mutex<PlaybackStatus>>,
        period: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let Some(widget) = widget.upgrade() else {
                    debug!("Widget dropped, progress poller exiting");
                    break;
                };
                let (current_time, duration) = {
                    let widget = widget.lock();
                    (widget.current_time(), widget.duration())
                };

                let progress = progress_fraction(current_time, duration);
                status.lock().progress = progress;
                trace!("Progress {:.3} ({:.2}s / {:.2}s)", progress, current_time, duration);
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
