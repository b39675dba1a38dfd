use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::{EVENT_CAPACITY, MediaSource, PlaybackWidget, WidgetEvent};
use crate::error::{PlayerError, Result};
use crate::video::worker::{self, DecodeCommand, Decoded};
use crate::video::{MediaInfo, VideoFrame};

/// Frames shown per tick at most; a player that falls further behind skips ahead
const MAX_CATCH_UP_FRAMES: usize = 8;

/// Playback widget backed by an ffmpeg decoder running on its own thread
///
/// [`PlaybackWidget::src`] and seeks only post commands to the decoder
/// thread. Decoded frames, readiness and failures are picked up by
/// [`PlaybackWidget::tick`], which must be called regularly. The clock is
/// anchored whenever playback starts or the position jumps.
pub struct FfmpegWidget {
    commands: Option<mpsc::Sender<DecodeCommand>>,
    output: Receiver<Decoded>,
    worker: Option<JoinHandle<()>>,
    /// Tag of the latest open or seek; older decoder output is dropped
    generation: u64,
    source: Option<MediaSource>,
    media_info: Option<MediaInfo>,
    frame: Option<VideoFrame>,
    /// Next decoded frame, held until it is due
    lookahead: Option<VideoFrame>,
    /// Source assigned, first frame not seen yet
    loading: bool,
    /// LoadedData was announced for the current source
    ready: bool,
    /// Show the next frame even if it is not due yet
    refresh: bool,
    /// Decoder has nothing more for this generation
    exhausted: bool,
    paused: bool,
    ended: bool,
    /// Position at the moment the clock was last anchored
    position: f64,
    anchor: Option<Instant>,
    width: u32,
    height: u32,
    events: broadcast::Sender<WidgetEvent>,
}

impl FfmpegWidget {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let thread = worker::spawn()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            commands: Some(thread.commands),
            output: thread.output,
            worker: Some(thread.handle),
            generation: 0,
            source: None,
            media_info: None,
            frame: None,
            lookahead: None,
            loading: false,
            ready: false,
            refresh: false,
            exhausted: false,
            paused: true,
            ended: false,
            position: 0.0,
            anchor: None,
            width,
            height,
            events,
        })
    }

    fn emit(&self, event: WidgetEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn send(&mut self, command: DecodeCommand) -> Result<()> {
        let sent = self
            .commands
            .as_ref()
            .is_some_and(|commands| commands.send(command).is_ok());
        if sent {
            Ok(())
        } else {
            Err(self.fail("Decoder thread is gone".to_string()))
        }
    }

    fn fail(&mut self, message: String) -> PlayerError {
        warn!("{}", message);
        if self.loading {
            // Nothing playable came out of this source
            self.loading = false;
            self.source = None;
        }
        self.position = self.clock_position();
        self.paused = true;
        self.anchor = None;
        self.exhausted = true;
        self.emit(WidgetEvent::Error(message.clone()));
        PlayerError::Widget(message)
    }

    fn clock_position(&self) -> f64 {
        let position = match self.anchor {
            Some(anchor) if !self.paused => self.position + anchor.elapsed().as_secs_f64(),
            _ => self.position,
        };
        let duration = self.duration();
        if duration > 0.0 { position.min(duration) } else { position }
    }

    fn show(&mut self, frame: VideoFrame) {
        self.frame = Some(frame.fit_within(self.width, self.height));
    }

    fn finish(&mut self) {
        let duration = self.duration();
        self.position = if duration > 0.0 { duration } else { self.clock_position() };
        self.paused = true;
        self.ended = true;
        self.anchor = None;
        info!("Playback ended at {:.2}s", self.position);
        self.emit(WidgetEvent::Ended);
    }

    /// Take the next decoder output for the current generation into the widget.
    /// Returns false when nothing is queued.
    fn receive(&mut self) -> Result<bool> {
        let decoded = match self.output.try_recv() {
            Ok(decoded) => decoded,
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => {
                return Err(self.fail("Decoder thread stopped".to_string()));
            }
        };
        if decoded.generation() != self.generation {
            return Ok(true);
        }

        match decoded {
            Decoded::Opened { info, .. } => {
                debug!(
                    "Opened {} {}x{} ({:.2}s)",
                    info.video_codec, info.width, info.height, info.duration
                );
                self.media_info = Some(info);
            }
            Decoded::Frame { frame, .. } => self.lookahead = Some(frame),
            Decoded::Ended { .. } if self.loading => {
                return Err(self.fail("Source contains no video frames".to_string()));
            }
            Decoded::Ended { .. } => self.exhausted = true,
            Decoded::Failed { message, .. } => return Err(self.fail(message)),
        }
        Ok(true)
    }
}

impl PlaybackWidget for FfmpegWidget {
    fn src(&mut self, source: MediaSource) -> Result<()> {
        debug!("Assigning source {} ({})", source.blob.path().display(), source.mime_type);

        self.generation += 1;
        // Dropping the previous source revokes its blob file
        self.source = None;
        self.media_info = None;
        self.frame = None;
        self.lookahead = None;
        self.loading = true;
        self.ready = false;
        self.refresh = false;
        self.exhausted = false;
        self.paused = true;
        self.ended = false;
        self.position = 0.0;
        self.anchor = None;

        let path = source.blob.path().to_path_buf();
        self.source = Some(source);
        self.send(DecodeCommand::Open {
            path,
            generation: self.generation,
        })
    }

    fn play(&mut self) -> Result<()> {
        if !self.ready {
            debug!("play() without a loaded source, staying paused");
            return Ok(());
        }
        if !self.paused {
            return Ok(());
        }
        if self.ended {
            self.set_current_time(0.0)?;
        }

        self.paused = false;
        self.anchor = Some(Instant::now());
        self.emit(WidgetEvent::Play);
        Ok(())
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.position = self.clock_position();
        self.paused = true;
        self.anchor = None;
        self.emit(WidgetEvent::Pause);
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn current_time(&self) -> f64 {
        self.clock_position()
    }

    fn set_current_time(&mut self, secs: f64) -> Result<()> {
        if !self.ready {
            return Ok(());
        }

        let duration = self.duration();
        let target = if duration > 0.0 {
            secs.clamp(0.0, duration)
        } else {
            secs.max(0.0)
        };

        self.generation += 1;
        self.lookahead = None;
        self.exhausted = false;
        self.refresh = true;
        self.ended = false;
        self.position = target;
        if !self.paused {
            self.anchor = Some(Instant::now());
        }

        self.send(DecodeCommand::Seek {
            secs: target,
            generation: self.generation,
        })?;
        self.emit(WidgetEvent::Seeked(target));
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.media_info.as_ref().map_or(0.0, |info| info.duration)
    }

    fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events.subscribe()
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn tick(&mut self) -> Result<()> {
        let mut shown = 0;

        loop {
            if self.lookahead.is_none() {
                if self.receive()? {
                    continue;
                }
                break;
            }
            let Some(frame) = self.lookahead.take() else {
                break;
            };

            if self.loading {
                self.loading = false;
                self.ready = true;
                self.position = frame.timestamp.max(0.0);
                self.show(frame);
                info!("Source ready, {:.2}s long", self.duration());
                self.emit(WidgetEvent::LoadedData);
                continue;
            }

            let due = frame.timestamp <= self.clock_position();
            if !due && !self.refresh {
                self.lookahead = Some(frame);
                break;
            }
            self.refresh = false;
            self.show(frame);
            shown += 1;
            if !due || shown >= MAX_CATCH_UP_FRAMES {
                break;
            }
        }

        if self.ready && self.exhausted && self.lookahead.is_none() && !self.paused {
            let now = self.clock_position();
            let duration = self.duration();
            let past_last = self.frame.as_ref().is_none_or(|f| now >= f.end_time());
            if past_last || (duration > 0.0 && now >= duration) {
                self.finish();
            }
        }

        Ok(())
    }

    fn current_frame(&self) -> Option<&VideoFrame> {
        self.frame.as_ref()
    }
}

impl Drop for FfmpegWidget {
    fn drop(&mut self) {
        // Closing the command channel stops the decoder thread
        self.commands = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Decoder thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{BlobUrl, MediaBlob};
    use crate::source::MediaType;
    use std::time::Duration;

    fn source_from(bytes: Vec<u8>) -> MediaSource {
        let blob = MediaBlob {
            bytes,
            content_type: None,
        };
        MediaSource {
            blob: BlobUrl::create(&blob, MediaType::Mp4).unwrap(),
            mime_type: MediaType::Mp4.mime_type(),
        }
    }

    /// Tick until the decoder thread has answered, or give up after 5s
    fn tick_until_settled(widget: &mut FfmpegWidget) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while widget.loading && Instant::now() < deadline {
            widget.tick()?;
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }

    #[test]
    fn test_widget_can_cross_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<FfmpegWidget>();
    }

    #[test]
    fn test_fresh_widget_is_paused_and_empty() {
        let widget = FfmpegWidget::new(320, 240).unwrap();
        assert!(widget.paused());
        assert_eq!(widget.duration(), 0.0);
        assert_eq!(widget.current_time(), 0.0);
        assert!(widget.current_frame().is_none());
        assert_eq!(widget.size(), (320, 240));
    }

    #[test]
    fn test_play_without_source_stays_paused() {
        let mut widget = FfmpegWidget::new(320, 240).unwrap();
        widget.play().unwrap();
        assert!(widget.paused());

        widget.set_current_time(12.0).unwrap();
        assert_eq!(widget.current_time(), 0.0);
        widget.tick().unwrap();
    }

    #[test]
    fn test_src_returns_before_decoding() {
        let mut widget = FfmpegWidget::new(320, 240).unwrap();
        widget.src(source_from(b"not a video".to_vec())).unwrap();
        assert!(widget.loading);
        assert!(widget.source.is_some());
    }

    #[test]
    fn test_unreadable_source_emits_error() {
        let mut widget = FfmpegWidget::new(320, 240).unwrap();
        let mut events = widget.subscribe();

        widget.src(source_from(b"not a video".to_vec())).unwrap();
        assert!(matches!(tick_until_settled(&mut widget), Err(PlayerError::Widget(_))));

        assert!(matches!(events.try_recv(), Ok(WidgetEvent::Error(_))));
        assert!(widget.source.is_none());
        widget.play().unwrap();
        assert!(widget.paused());
    }

    #[test]
    #[ignore = "needs a sample clip at BLOBPLAY_SAMPLE"]
    fn test_sample_loads_and_plays() {
        let bytes = std::fs::read(std::env::var("BLOBPLAY_SAMPLE").unwrap()).unwrap();
        let mut widget = FfmpegWidget::new(320, 240).unwrap();
        let mut events = widget.subscribe();
        widget.src(source_from(bytes)).unwrap();
        tick_until_settled(&mut widget).unwrap();

        assert_eq!(events.try_recv(), Ok(WidgetEvent::LoadedData));
        assert!(widget.duration() > 0.0);
        let frame = widget.current_frame().unwrap();
        assert!(frame.width <= 320 && frame.height <= 240);

        widget.play().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        widget.tick().unwrap();
        assert!(widget.current_time() > 0.0);

        widget.set_current_time(widget.duration() / 2.0).unwrap();
        assert!(matches!(events.try_recv(), Ok(WidgetEvent::Play)));
        assert!(matches!(events.try_recv(), Ok(WidgetEvent::Seeked(_))));
    }
}
