use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::fetch::{self, BlobUrl};
use crate::poller::ProgressPoller;
use crate::source::{MediaType, PlaybackSource};
use crate::widget::{self, MediaSource, PlaybackWidget, SharedWidget, WidgetEvent};

/// Transport state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No widget mounted yet
    Uninitialized,
    /// Widget mounted, nothing loaded
    Idle,
    /// Download or widget load in progress
    Loading,
    Playing,
    Paused,
}

/// Displayed duration and progress
///
/// Derived from the widget; the widget owns the true playback time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackStatus {
    /// Rounded media duration in seconds
    pub duration_secs: u64,
    /// Position / duration, in [0, 1]
    pub progress: f64,
}

/// Round a widget-reported duration for display
pub fn rounded_duration(duration: f64) -> u64 {
    if duration.is_finite() && duration > 0.0 {
        duration.round() as u64
    } else {
        0
    }
}

/// Notifications from the controller's background work
#[derive(Debug)]
pub enum ControllerEvent {
    LoadStarted { url: String },
    Downloaded { bytes: usize },
    /// Data is ready and playback has started
    Ready { duration_secs: u64 },
    LoadFailed(PlayerError),
}

/// Horizontal geometry of a seek bar, in the same units as click positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekBar {
    pub left: f64,
    pub width: f64,
}

impl SeekBar {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Fractional position of a click. Not clamped: clicks outside stale
    /// bounds give values outside [0, 1]. `None` for a collapsed bar.
    pub fn fraction_at(&self, click_x: f64) -> Option<f64> {
        if self.width <= 0.0 || !self.width.is_finite() {
            return None;
        }
        Some((click_x - self.left) / self.width)
    }
}

/// State reflected by a widget that is not being driven by a load
fn state_of(widget: &dyn PlaybackWidget) -> PlayerState {
    if widget.duration() <= 0.0 {
        PlayerState::Idle
    } else if widget.paused() {
        PlayerState::Paused
    } else {
        PlayerState::Playing
    }
}

/// Everything one run of the load pipeline needs, detached from the controller
struct LoadJob {
    client: Client,
    source: PlaybackSource,
    widget: SharedWidget,
    status: Arc<Mutex<PlaybackStatus>>,
    state: Arc<Mutex<PlayerState>>,
    events: mpsc::UnboundedSender<ControllerEvent>,
    /// Load counter of the controller and this job's value of it
    latest: Arc<AtomicU64>,
    generation: u64,
}

impl LoadJob {
    /// Whether a newer Play or an unmount has taken over. Commits check this
    /// while holding the state lock, which is where `play` bumps the counter.
    fn superseded(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.generation
    }

    fn notify(&self, event: ControllerEvent) {
        if !self.superseded() {
            let _ = self.events.send(event);
        }
    }

    async fn run(self) {
        match self.pipeline().await {
            Ok(Some(duration_secs)) => {
                info!("Playing {} ({}s)", self.source.url, duration_secs);
                let _ = self.events.send(ControllerEvent::Ready { duration_secs });
            }
            Ok(None) => debug!("Load of {} was superseded", self.source.url),
            Err(e) => {
                let widget = self.widget.lock();
                let mut state = self.state.lock();
                if self.superseded() {
                    debug!("Superseded load of {} failed: {}", self.source.url, e);
                    return;
                }
                error!("Loading {} failed: {}", self.source.url, e);
                *state = state_of(&*widget);
                let _ = self.events.send(ControllerEvent::LoadFailed(e));
            }
        }
    }

    /// Run the load; `None` when a newer load took over before the commit
    async fn pipeline(&self) -> Result<Option<u64>> {
        self.notify(ControllerEvent::LoadStarted {
            url: self.source.url.clone(),
        });

        let blob = fetch::download(&self.client, &self.source.url).await?;
        match &blob.content_type {
            Some(content_type) if content_type != self.source.media_type.mime_type() => warn!(
                "Server sent {} for a {} source, trying anyway",
                content_type, self.source.media_type
            ),
            _ => {}
        }
        self.notify(ControllerEvent::Downloaded { bytes: blob.len() });

        let blob_url = BlobUrl::create(&blob, self.source.media_type)?;
        drop(blob);

        // Subscribe before assigning the source so the signal cannot be missed
        let mut ready = {
            let mut widget = self.widget.lock();
            if self.superseded() {
                return Ok(None);
            }
            let ready = widget.subscribe();
            widget.src(MediaSource {
                blob: blob_url,
                mime_type: self.source.media_type.mime_type(),
            })?;
            ready
        };
        widget::loaded_data(&mut ready).await?;
        debug!("Widget reported data ready");

        let mut widget = self.widget.lock();
        let mut state = self.state.lock();
        if self.superseded() {
            return Ok(None);
        }
        let duration_secs = rounded_duration(widget.duration());
        *self.status.lock() = PlaybackStatus {
            duration_secs,
            progress: 0.0,
        };
        widget.play()?;
        *state = PlayerState::Playing;

        Ok(Some(duration_secs))
    }
}

/// Persistent widget subscription: logs engine errors and keeps the
/// Playing/Paused state in line with what the widget does on its own
/// (reaching the end, failing, resuming). A load in progress owns the state.
fn spawn_widget_watcher(widget: &SharedWidget, state: Arc<Mutex<PlayerState>>) -> JoinHandle<()> {
    let mut events = widget.lock().subscribe();
    let widget: Weak<Mutex<dyn PlaybackWidget>> = Arc::downgrade(widget);

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Widget watcher skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match &event {
                WidgetEvent::Error(message) => error!("Playback widget error: {}", message),
                WidgetEvent::Ended => info!("Playback reached the end"),
                WidgetEvent::Play | WidgetEvent::Pause => {}
                WidgetEvent::LoadedData | WidgetEvent::Seeked(_) => continue,
            }

            let Some(widget) = widget.upgrade() else {
                break;
            };
            let widget = widget.lock();
            let mut state = state.lock();
            if matches!(*state, PlayerState::Playing | PlayerState::Paused) {
                *state = if widget.paused() {
                    PlayerState::Paused
                } else {
                    PlayerState::Playing
                };
            }
        }
    })
}

/// Coordinates the download, the widget lifecycle and the transport controls
pub struct PlayerController {
    config: PlayerConfig,
    client: Client,
    source: PlaybackSource,
    widget: Option<SharedWidget>,
    status: Arc<Mutex<PlaybackStatus>>,
    state: Arc<Mutex<PlayerState>>,
    events: mpsc::UnboundedSender<ControllerEvent>,
    /// Bumped by every Play and by unmount; a load commits only if it still matches
    load_generation: Arc<AtomicU64>,
    load_task: Option<JoinHandle<()>>,
    poller: Option<ProgressPoller>,
    watcher: Option<JoinHandle<()>>,
}

impl PlayerController {
    /// Create an unmounted controller and the receiving end of its events
    pub fn new(config: PlayerConfig) -> Result<(Self, mpsc::UnboundedReceiver<ControllerEvent>)> {
        config.validate()?;
        let client = fetch::build_client(&config)?;
        let (events, receiver) = mpsc::unbounded_channel();

        let controller = Self {
            source: PlaybackSource::new(config.default_url.clone(), config.default_media_type),
            config,
            client,
            widget: None,
            status: Arc::new(Mutex::new(PlaybackStatus::default())),
            state: Arc::new(Mutex::new(PlayerState::Uninitialized)),
            events,
            load_generation: Arc::new(AtomicU64::new(0)),
            load_task: None,
            poller: None,
            watcher: None,
        };
        Ok((controller, receiver))
    }

    /// Take ownership of the widget for the controller's lifetime and start
    /// the progress poller. Must be called inside a tokio runtime.
    pub fn mount(&mut self, widget: SharedWidget) {
        if self.widget.is_some() {
            warn!("Widget already mounted, replacing it");
            self.unmount();
        }

        widget
            .lock()
            .set_size(self.config.widget_width, self.config.widget_height);

        self.watcher = Some(spawn_widget_watcher(&widget, self.state.clone()));
        self.poller = Some(ProgressPoller::spawn(
            Arc::downgrade(&widget),
            self.status.clone(),
            self.config.poll_interval(),
        ));
        self.widget = Some(widget);
        *self.state.lock() = PlayerState::Idle;
        debug!("Widget mounted");
    }

    /// Cancel background work and release the widget
    pub fn unmount(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(widget) = self.widget.take() {
            widget.lock().pause();
            debug!("Widget unmounted");
        }
        let mut state = self.state.lock();
        self.load_generation.fetch_add(1, Ordering::SeqCst);
        *state = PlayerState::Uninitialized;
    }

    pub fn widget(&self) -> Option<&SharedWidget> {
        self.widget.as_ref()
    }

    pub fn source(&self) -> &PlaybackSource {
        &self.source
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.source.url = url.into();
    }

    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.source.media_type = media_type;
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.lock()
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    pub fn is_loading(&self) -> bool {
        self.state() == PlayerState::Loading
    }

    /// Start the load pipeline for the current source
    ///
    /// No-op without a widget. Unsupported media types fail here, before any
    /// network activity. Any load already in flight is abandoned. The outcome
    /// arrives as a [`ControllerEvent`].
    pub fn play(&mut self) -> Result<()> {
        let Some(widget) = self.widget.clone() else {
            debug!("play() before mount ignored");
            return Ok(());
        };

        if !self.source.media_type.is_supported() {
            warn!("Refusing to load {} source", self.source.media_type);
            return Err(PlayerError::UnsupportedMediaType(self.source.media_type));
        }

        if let Some(task) = self.load_task.take() {
            debug!("Abandoning previous load");
            task.abort();
        }

        let job = self.begin_load(widget);
        info!("Loading {} as {}", self.source.url, self.source.media_type);
        self.load_task = Some(tokio::spawn(job.run()));
        Ok(())
    }

    /// Enter Loading and claim a new load generation for the current source
    fn begin_load(&self, widget: SharedWidget) -> LoadJob {
        let generation = {
            let mut state = self.state.lock();
            *state = PlayerState::Loading;
            self.load_generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        LoadJob {
            client: self.client.clone(),
            source: self.source.clone(),
            widget,
            status: self.status.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
            latest: self.load_generation.clone(),
            generation,
        }
    }

    /// Invert the widget's paused state. No-op without a widget.
    pub fn toggle(&mut self) -> Result<()> {
        let Some(widget) = &self.widget else {
            return Ok(());
        };

        let mut widget = widget.lock();
        if widget.paused() {
            widget.play()?;
        } else {
            widget.pause();
        }

        let paused = widget.paused();
        let mut state = self.state.lock();
        if matches!(*state, PlayerState::Playing | PlayerState::Paused) {
            *state = if paused {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            };
        }
        debug!("Toggled playback, paused={}", paused);
        Ok(())
    }

    /// Seek to the time under a click on the seek bar, resuming if paused
    ///
    /// Returns the requested target time, or `None` when nothing happened.
    pub fn seek_click(&mut self, click_x: f64, bar: SeekBar) -> Result<Option<f64>> {
        let Some(fraction) = bar.fraction_at(click_x) else {
            return Ok(None);
        };
        let Some(widget) = &self.widget else {
            return Ok(None);
        };

        let target = {
            let mut widget = widget.lock();
            let target = fraction * widget.duration();
            widget.set_current_time(target)?;
            if widget.paused() {
                widget.play()?;
            }
            target
        };

        let mut state = self.state.lock();
        if *state == PlayerState::Paused {
            *state = PlayerState::Playing;
        }
        debug!("Seek click at fraction {:.3} -> {:.2}s", fraction, target);
        Ok(Some(target))
    }

    /// Jump to an absolute time without changing play/pause
    pub fn seek_to(&mut self, secs: f64) -> Result<()> {
        if let Some(widget) = &self.widget {
            widget.lock().set_current_time(secs)?;
        }
        Ok(())
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::serve_once;
    use crate::widget::fake::FakeWidget;
    use crate::widget::{WidgetEvent, shared};
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Give background tasks a chance to run until the state settles
    async fn wait_for_state(controller: &PlayerController, expected: PlayerState) -> PlayerState {
        for _ in 0..100 {
            if controller.state() == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        controller.state()
    }

    fn controller() -> (PlayerController, mpsc::UnboundedReceiver<ControllerEvent>) {
        let _ = env_logger::builder().is_test(true).try_init();
        PlayerController::new(PlayerConfig::default()).unwrap()
    }

    /// Skip progress events and return the final outcome of a load
    async fn outcome(events: &mut mpsc::UnboundedReceiver<ControllerEvent>) -> ControllerEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("load did not finish")
                .expect("event channel closed");
            match event {
                ControllerEvent::LoadStarted { .. } | ControllerEvent::Downloaded { .. } => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_seek_bar_fraction() {
        let bar = SeekBar::new(10.0, 100.0);
        assert_eq!(bar.fraction_at(10.0), Some(0.0));
        assert_eq!(bar.fraction_at(60.0), Some(0.5));
        // Stale bounds are not clamped
        assert_eq!(bar.fraction_at(0.0), Some(-0.1));
        assert_eq!(SeekBar::new(10.0, 0.0).fraction_at(10.0), None);
    }

    #[test]
    fn test_rounded_duration() {
        assert_eq!(rounded_duration(30.49), 30);
        assert_eq!(rounded_duration(30.5), 31);
        assert_eq!(rounded_duration(0.0), 0);
        assert_eq!(rounded_duration(f64::NAN), 0);
    }

    #[tokio::test]
    async fn test_controls_are_noops_before_mount() {
        let (mut controller, mut events) = controller();
        assert_eq!(controller.state(), PlayerState::Uninitialized);

        controller.play().unwrap();
        controller.toggle().unwrap();
        assert_eq!(controller.seek_click(5.0, SeekBar::new(0.0, 10.0)).unwrap(), None);

        assert_eq!(controller.state(), PlayerState::Uninitialized);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mount_sizes_widget_and_goes_idle() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::new(10.0));
        controller.mount(widget.clone());

        assert_eq!(controller.state(), PlayerState::Idle);
        assert_eq!(widget.lock().size(), (320, 240));

        controller.unmount();
        assert_eq!(controller.state(), PlayerState::Uninitialized);
        assert!(controller.widget().is_none());
    }

    #[tokio::test]
    async fn test_successful_load_resets_status_then_plays() {
        let (mut controller, mut events) = controller();
        let widget = shared(FakeWidget::new(29.6));
        controller.mount(widget.clone());
        *controller.status.lock() = PlaybackStatus {
            duration_secs: 99,
            progress: 0.7,
        };

        controller.set_url(serve_once("200 OK", b"mp4-bytes".to_vec()).await);
        controller.play().unwrap();
        assert_eq!(controller.state(), PlayerState::Loading);

        match outcome(&mut events).await {
            ControllerEvent::Ready { duration_secs } => assert_eq!(duration_secs, 30),
            other => panic!("unexpected outcome {:?}", other),
        }

        assert_eq!(
            controller.status(),
            PlaybackStatus {
                duration_secs: 30,
                progress: 0.0
            }
        );
        assert_eq!(controller.state(), PlayerState::Playing);
        let widget = widget.lock();
        assert!(!widget.paused());
        assert_eq!(widget.duration(), 29.6);
    }

    #[tokio::test]
    async fn test_source_carries_mime_type_of_selection() {
        let (mut controller, mut events) = controller();
        let fake = FakeWidget::new(5.0);
        let widget = Arc::new(Mutex::new(fake));
        controller.mount(widget.clone());

        controller.set_url(serve_once("200 OK", b"abc".to_vec()).await);
        controller.play().unwrap();
        outcome(&mut events).await;

        let widget = widget.lock();
        let source = widget.source.as_ref().unwrap();
        assert_eq!(source.mime_type, "video/mp4");
        assert_eq!(std::fs::read(source.blob.path()).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_failed_download_leaves_state_untouched() {
        let (mut controller, mut events) = controller();
        let widget = Arc::new(Mutex::new(FakeWidget::new(10.0)));
        controller.mount(widget.clone());
        let before = PlaybackStatus {
            duration_secs: 42,
            progress: 0.25,
        };
        *controller.status.lock() = before;

        controller.set_url(serve_once("500 Internal Server Error", Vec::new()).await);
        controller.play().unwrap();

        match outcome(&mut events).await {
            ControllerEvent::LoadFailed(PlayerError::Network { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(controller.status(), before);
        assert_eq!(controller.state(), PlayerState::Idle);
        assert_eq!(widget.lock().sources_assigned, 0);
    }

    #[tokio::test]
    async fn test_widget_error_fails_load() {
        let (mut controller, mut events) = controller();
        let mut fake = FakeWidget::new(10.0);
        fake.on_src = Some(WidgetEvent::Error("unsupported codec".into()));
        controller.mount(shared(fake));

        controller.set_url(serve_once("200 OK", b"xyz".to_vec()).await);
        controller.play().unwrap();

        assert!(matches!(
            outcome(&mut events).await,
            ControllerEvent::LoadFailed(PlayerError::Widget(_))
        ));
        assert_eq!(controller.status(), PlaybackStatus::default());
    }

    #[tokio::test]
    async fn test_streaming_type_is_explicitly_unsupported() {
        let (mut controller, mut events) = controller();
        controller.mount(shared(FakeWidget::new(10.0)));
        controller.set_media_type(MediaType::M3u8);

        assert!(matches!(
            controller.play(),
            Err(PlayerError::UnsupportedMediaType(MediaType::M3u8))
        ));
        assert_eq!(controller.state(), PlayerState::Idle);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::loaded(10.0, 3.0));
        controller.mount(widget.clone());

        let before = widget.lock().paused();
        controller.toggle().unwrap();
        assert_ne!(widget.lock().paused(), before);
        controller.toggle().unwrap();
        assert_eq!(widget.lock().paused(), before);
    }

    #[tokio::test]
    async fn test_toggle_tracks_transport_state() {
        let (mut controller, mut events) = controller();
        controller.mount(shared(FakeWidget::new(8.0)));
        controller.set_url(serve_once("200 OK", b"clip".to_vec()).await);
        controller.play().unwrap();
        outcome(&mut events).await;

        controller.toggle().unwrap();
        assert_eq!(controller.state(), PlayerState::Paused);
        controller.toggle().unwrap();
        assert_eq!(controller.state(), PlayerState::Playing);
    }

    #[tokio::test]
    async fn test_seek_click_edges() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::loaded(120.0, 0.0));
        controller.mount(widget.clone());
        let bar = SeekBar::new(4.0, 60.0);

        let start = controller.seek_click(4.0, bar).unwrap().unwrap();
        assert!(start.abs() < 1e-9);

        // Rightmost column lands within one column of the end
        let end = controller.seek_click(63.0, bar).unwrap().unwrap();
        assert!((120.0 - end) <= 120.0 / 60.0 + 1e-9);
        assert!((widget.lock().current_time() - end).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_seek_click_resumes_paused_playback() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::loaded(100.0, 10.0));
        controller.mount(widget.clone());
        assert!(widget.lock().paused());

        let target = controller.seek_click(50.0, SeekBar::new(0.0, 100.0)).unwrap();
        assert_eq!(target, Some(50.0));
        assert!(!widget.lock().paused());
    }

    #[tokio::test]
    async fn test_seek_click_outside_bar_is_clamped_by_widget() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::loaded(100.0, 10.0));
        controller.mount(widget.clone());

        let target = controller.seek_click(150.0, SeekBar::new(0.0, 100.0)).unwrap();
        assert_eq!(target, Some(150.0));
        assert_eq!(widget.lock().current_time(), 100.0);
    }

    #[tokio::test]
    async fn test_new_play_restarts_loading() {
        let (mut controller, mut events) = controller();
        let widget = Arc::new(Mutex::new(FakeWidget::new(6.0)));
        controller.mount(widget.clone());

        controller.set_url(serve_once("200 OK", b"first".to_vec()).await);
        controller.play().unwrap();
        controller.set_url(serve_once("200 OK", b"second".to_vec()).await);
        controller.play().unwrap();

        assert!(matches!(outcome(&mut events).await, ControllerEvent::Ready { .. }));
        let widget = widget.lock();
        let source = widget.source.as_ref().unwrap();
        assert_eq!(std::fs::read(source.blob.path()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_replaced_load_does_not_assign_or_commit() {
        let (mut controller, mut events) = controller();
        let widget = shared(FakeWidget::new(12.0));
        controller.mount(widget.clone());

        controller.set_url(serve_once("200 OK", b"old".to_vec()).await);
        let replaced = controller.begin_load(widget.clone());

        // The newer load waits on a server that never answers
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        controller.set_url(format!("http://{}/slow.mp4", silent.local_addr().unwrap()));
        controller.play().unwrap();

        replaced.run().await;

        assert_eq!(controller.state(), PlayerState::Loading);
        assert_eq!(controller.status(), PlaybackStatus::default());
        {
            let widget = widget.lock();
            assert_eq!(widget.sources_assigned, 0);
            assert!(widget.paused());
        }
        while let Ok(event) = events.try_recv() {
            assert!(matches!(event, ControllerEvent::LoadStarted { .. }), "unexpected {:?}", event);
        }
    }

    #[tokio::test]
    async fn test_play_during_source_assignment_wins() {
        let (mut controller, mut events) = controller();
        let mut fake = FakeWidget::new(12.0);
        let latest = controller.load_generation.clone();
        // Another Play lands while the widget is busy taking the source
        fake.during_src = Some(Box::new(move || {
            latest.fetch_add(1, Ordering::SeqCst);
        }));
        let widget = shared(fake);
        controller.mount(widget.clone());
        controller.set_url(serve_once("200 OK", b"old".to_vec()).await);

        let replaced = controller.begin_load(widget.clone());
        replaced.run().await;

        assert_eq!(controller.state(), PlayerState::Loading);
        assert_eq!(controller.status(), PlaybackStatus::default());
        {
            let widget = widget.lock();
            assert_eq!(widget.sources_assigned, 1);
            assert!(widget.paused());
        }
        while let Ok(event) = events.try_recv() {
            assert!(
                matches!(event, ControllerEvent::LoadStarted { .. } | ControllerEvent::Downloaded { .. }),
                "unexpected {:?}",
                event
            );
        }
    }

    #[tokio::test]
    async fn test_unmount_stops_pending_commit() {
        let (mut controller, mut events) = controller();
        let widget = shared(FakeWidget::new(5.0));
        controller.mount(widget.clone());
        controller.set_url(serve_once("500 Internal Server Error", Vec::new()).await);

        let job = controller.begin_load(widget.clone());
        controller.unmount();
        job.run().await;

        assert_eq!(controller.state(), PlayerState::Uninitialized);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_widget_reaching_end_pauses_state() {
        let (mut controller, mut events) = controller();
        let widget = shared(FakeWidget::new(8.0));
        controller.mount(widget.clone());
        controller.set_url(serve_once("200 OK", b"clip".to_vec()).await);
        controller.play().unwrap();
        outcome(&mut events).await;
        assert_eq!(controller.state(), PlayerState::Playing);

        {
            let mut widget = widget.lock();
            widget.paused = true;
            widget.events.send(WidgetEvent::Ended).unwrap();
        }
        assert_eq!(wait_for_state(&controller, PlayerState::Paused).await, PlayerState::Paused);

        {
            let mut widget = widget.lock();
            widget.paused = false;
            widget.events.send(WidgetEvent::Play).unwrap();
        }
        assert_eq!(wait_for_state(&controller, PlayerState::Playing).await, PlayerState::Playing);
    }

    #[tokio::test]
    async fn test_widget_events_leave_loading_alone() {
        let (mut controller, _events) = controller();
        let widget = shared(FakeWidget::loaded(8.0, 1.0));
        controller.mount(widget.clone());
        *controller.state.lock() = PlayerState::Loading;

        widget
            .lock()
            .events
            .send(WidgetEvent::Error("decoder hiccup".into()))
            .unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(controller.state(), PlayerState::Loading);
    }

    #[tokio::test]
    async fn test_watcher_stops_with_widget() {
        let widget = shared(FakeWidget::new(1.0));
        let watcher = spawn_widget_watcher(&widget, Arc::new(Mutex::new(PlayerState::Idle)));
        drop(widget);

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher should exit once the widget is gone")
            .unwrap();
    }
}
