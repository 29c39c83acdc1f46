//! # Transcription Bridge
//!
//! Decouples the session's async event loop from the backend's blocking
//! streaming call. The blocking call runs on a dedicated worker thread;
//! the session only ever performs non-blocking enqueues (audio frames in)
//! and async dequeues (transcript results out) against two queues:
//!
//! ```text
//! session task --frames--> [std mpsc] --> worker thread --> backend
//! session task <--results- [tokio mpsc] <- worker thread <-- backend
//! ```
//!
//! Frames reach the backend strictly in submission order; results reach
//! the session strictly in emission order. Closing the frame channel
//! (sentinel) is the only signal that ends the backend call, and teardown
//! waits for the worker only up to a bounded timeout before abandoning it.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{SpeechBackend, SpeechConfig, TranscriptResult};

enum Frame {
    Audio(Vec<u8>),
    Close,
}

/// Result of a non-blocking frame poll.
pub enum FramePoll {
    Frame(Vec<u8>),
    Idle,
    Closed,
}

/// The worker-side view of the audio frame queue.
///
/// Backends either block on [`FrameSource::recv`] or interleave sending
/// and receiving with [`FrameSource::poll`].
pub struct FrameSource {
    rx: std_mpsc::Receiver<Frame>,
}

impl FrameSource {
    /// Block until the next frame, or `None` once the stream is closed.
    pub fn recv(&self) -> Option<Vec<u8>> {
        match self.rx.recv() {
            Ok(Frame::Audio(bytes)) => Some(bytes),
            Ok(Frame::Close) | Err(_) => None,
        }
    }

    /// Wait up to `timeout` for the next frame.
    pub fn poll(&self, timeout: Duration) -> FramePoll {
        match self.rx.recv_timeout(timeout) {
            Ok(Frame::Audio(bytes)) => FramePoll::Frame(bytes),
            Ok(Frame::Close) => FramePoll::Closed,
            Err(std_mpsc::RecvTimeoutError::Timeout) => FramePoll::Idle,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => FramePoll::Closed,
        }
    }
}

/// The worker-side handle for emitting transcript results.
#[derive(Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<TranscriptResult>,
}

impl ResultSink {
    /// Emit one result. A send failure means the session is gone, which
    /// the worker can safely ignore; it will observe the closed frame
    /// channel soon after.
    pub fn emit(&self, result: TranscriptResult) {
        let _ = self.tx.send(result);
    }
}

/// Owns one backend streaming call and the queues around it.
///
/// Invariant: at most one bridge exists per session at any time, and the
/// close sentinel is sent at most once regardless of how often `close`
/// is called.
pub struct TranscriptionBridge {
    frame_tx: std_mpsc::Sender<Frame>,
    results_rx: Option<mpsc::UnboundedReceiver<TranscriptResult>>,
    worker: Option<thread::JoinHandle<()>>,
    closed: bool,
}

impl TranscriptionBridge {
    /// Spawn the worker thread and start the backend's streaming call.
    pub fn spawn(
        backend: Arc<dyn SpeechBackend>,
        config: SpeechConfig,
    ) -> std::io::Result<Self> {
        let (frame_tx, frame_rx) = std_mpsc::channel();
        let (result_tx, results_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name("transcription-bridge".to_string())
            .spawn(move || {
                let frames = FrameSource { rx: frame_rx };
                let results = ResultSink { tx: result_tx };

                if let Err(err) = backend.stream(&config, frames, results.clone()) {
                    // The fault must reach the session as a result, never
                    // as an unwind.
                    error!("speech backend stream failed: {}", err);
                    results.emit(TranscriptResult::failed(err.to_string()));
                }
                debug!("transcription worker exited");
            })?;

        Ok(Self {
            frame_tx,
            results_rx: Some(results_rx),
            worker: Some(worker),
            closed: false,
        })
    }

    /// Enqueue one audio frame for the backend. Never blocks.
    pub fn submit(&self, frame: Vec<u8>) {
        if self.closed {
            debug!("bridge already closed, dropping {} byte frame", frame.len());
            return;
        }
        if self.frame_tx.send(Frame::Audio(frame)).is_err() {
            warn!("transcription worker is gone, dropping audio frame");
        }
    }

    /// Signal end-of-audio. Idempotent; safe even if no frame was ever
    /// submitted.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.frame_tx.send(Frame::Close);
    }

    /// Hand the ordered result receiver to the session task. Yields
    /// `Some` exactly once.
    pub fn take_results(&mut self) -> Option<mpsc::UnboundedReceiver<TranscriptResult>> {
        self.results_rx.take()
    }

    /// Close the stream and wait for the worker, up to `timeout`.
    ///
    /// If the backend does not exit in time the thread is abandoned so
    /// session teardown can proceed; it holds no session resources at
    /// that point.
    pub fn shutdown(mut self, timeout: Duration) {
        self.close();

        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + timeout;
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }

            if worker.is_finished() {
                let _ = worker.join();
            } else {
                warn!(
                    "transcription worker did not exit within {:?}, abandoning it",
                    timeout
                );
            }
        }
    }
}
