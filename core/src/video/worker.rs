use std::path::PathBuf;
use std::sync::mpsc::{
    self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError, sync_channel,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace, warn};

use super::{MediaInfo, VideoDecoder, VideoFrame};

/// Frames decoded ahead of the playback clock
pub const FRAME_QUEUE: usize = 8;

/// How long a full queue waits for a command before retrying the send
const QUEUE_POLL: Duration = Duration::from_millis(10);

/// Requests to the decoder thread. `generation` tags every output produced
/// after the request so the consumer can drop stale frames.
#[derive(Debug)]
pub enum DecodeCommand {
    Open { path: PathBuf, generation: u64 },
    Seek { secs: f64, generation: u64 },
}

/// What the decoder thread produces, in stream order
pub enum Decoded {
    Opened { generation: u64, info: MediaInfo },
    Frame { generation: u64, frame: VideoFrame },
    Ended { generation: u64 },
    Failed { generation: u64, message: String },
}

impl Decoded {
    pub fn generation(&self) -> u64 {
        match self {
            Decoded::Opened { generation, .. }
            | Decoded::Frame { generation, .. }
            | Decoded::Ended { generation }
            | Decoded::Failed { generation, .. } => *generation,
        }
    }
}

/// Endpoints of a running decoder thread
pub struct DecoderThread {
    pub commands: mpsc::Sender<DecodeCommand>,
    pub output: Receiver<Decoded>,
    pub handle: JoinHandle<()>,
}

/// Start a thread that owns the ffmpeg decoder. ffmpeg's scaler context is
/// not `Send`, so the decoder is created and used on this thread only.
/// The thread exits once the command sender is dropped.
pub fn spawn() -> std::io::Result<DecoderThread> {
    let (commands, command_rx) = mpsc::channel();
    let (output_tx, output) = sync_channel(FRAME_QUEUE);

    let handle = thread::Builder::new()
        .name("blobplay-decoder".to_string())
        .spawn(move || {
            debug!("Decoder thread started");
            DecodeWorker::default().run(command_rx, output_tx);
            debug!("Decoder thread finished");
        })?;

    Ok(DecoderThread {
        commands,
        output,
        handle,
    })
}

#[derive(Default)]
struct DecodeWorker {
    decoder: Option<VideoDecoder>,
    generation: u64,
    producing: bool,
}

impl DecodeWorker {
    fn run(mut self, commands: Receiver<DecodeCommand>, output: SyncSender<Decoded>) {
        let mut pending: Option<Decoded> = None;

        loop {
            if let Some(decoded) = pending.take() {
                match output.try_send(decoded) {
                    Ok(()) => {}
                    Err(TrySendError::Full(decoded)) => {
                        pending = Some(decoded);
                        // Queue is full; stay responsive to seeks while waiting
                        match commands.recv_timeout(QUEUE_POLL) {
                            Ok(command) => pending = self.handle(command),
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                        continue;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }

            let command = if self.producing {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                // Nothing to decode until told otherwise
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            pending = match command {
                Some(command) => self.handle(command),
                None => self.next_output(),
            };
        }
    }

    /// Apply a command; anything still queued for an older generation is dropped
    fn handle(&mut self, command: DecodeCommand) -> Option<Decoded> {
        match command {
            DecodeCommand::Open { path, generation } => {
                self.generation = generation;
                self.decoder = None;
                self.producing = false;

                match VideoDecoder::new(&path) {
                    Ok(decoder) => {
                        let info = decoder.get_media_info();
                        self.decoder = Some(decoder);
                        self.producing = true;
                        Some(Decoded::Opened { generation, info })
                    }
                    Err(e) => Some(Decoded::Failed {
                        generation,
                        message: format!("Cannot open source: {:#}", e),
                    }),
                }
            }
            DecodeCommand::Seek { secs, generation } => {
                self.generation = generation;
                let decoder = self.decoder.as_mut()?;
                match decoder.seek(secs) {
                    Ok(()) => {
                        self.producing = true;
                        None
                    }
                    Err(e) => {
                        self.producing = false;
                        Some(Decoded::Failed {
                            generation,
                            message: format!("Seek to {:.2}s failed: {:#}", secs, e),
                        })
                    }
                }
            }
        }
    }

    fn next_output(&mut self) -> Option<Decoded> {
        let generation = self.generation;
        let Some(decoder) = self.decoder.as_mut() else {
            self.producing = false;
            return None;
        };

        match decoder.decode_next_frame() {
            Ok(Some(frame)) => {
                trace!("Queued frame at {:.3}s", frame.timestamp);
                Some(Decoded::Frame { generation, frame })
            }
            Ok(None) => {
                self.producing = false;
                Some(Decoded::Ended { generation })
            }
            Err(e) => {
                warn!("Decode failed: {:#}", e);
                self.producing = false;
                Some(Decoded::Failed {
                    generation,
                    message: format!("Playback error: {:#}", e),
                })
            }
        }
    }
}
