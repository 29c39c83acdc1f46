//! # Speech Recognition Boundary
//!
//! Everything the pipeline knows about speech recognition lives behind
//! the [`SpeechBackend`] trait: a blocking one-shot transcription call
//! for batched sessions and a blocking streaming call for continuous
//! sessions. The backend's own protocol, model and accuracy are out of
//! scope here; faults cross this boundary only as [`BackendError`]
//! values, never as panics.
//!
//! ## Key Components:
//! - **SpeechBackend**: the recognizer trait, object-safe, shared per
//!   process.
//! - **TranscriptionBridge** (`bridge`): adapts the blocking streaming
//!   call to the async session loop via a worker thread and two queues.
//! - **RemoteRecognizer** (`remote`): production backend speaking to an
//!   external recognizer gateway over a blocking WebSocket.

pub mod bridge;
pub mod remote;

pub use bridge::{FrameSource, ResultSink, TranscriptionBridge};
pub use remote::RemoteRecognizer;

use std::fmt;

/// Recognition parameters, materialized once per session from the
/// application configuration.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// BCP-47 language code, e.g. "tr-TR".
    pub language: String,

    /// PCM sample rate in Hz.
    pub sample_rate: u32,

    /// Whether the backend should add punctuation.
    pub punctuation: bool,

    /// Domain vocabulary hints, e.g. "yüzde".
    pub phrase_hints: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            sample_rate: crate::audio::SAMPLE_RATE,
            punctuation: true,
            phrase_hints: vec!["yüzde".to_string()],
        }
    }
}

/// One transcription result emitted by the backend.
///
/// Interim results (`is_final == false`) are informational only; only
/// final results drive command interpretation. A result with `error`
/// set is the synthetic marker the bridge emits when the backend call
/// failed; it is always final and always the last result of its stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TranscriptResult {
    pub text: String,
    pub is_final: bool,
    pub error: Option<String>,
}

impl TranscriptResult {
    pub fn interim(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: false, error: None }
    }

    pub fn finalized(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: true, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { text: String::new(), is_final: true, error: Some(message.into()) }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Faults surfaced by a speech backend.
#[derive(Debug)]
pub enum BackendError {
    /// Could not reach or handshake with the recognizer.
    Connection(String),

    /// The recognizer answered with something this client cannot parse.
    Protocol(String),

    /// The recognizer failed mid-stream (network drop, quota, server
    /// fault).
    Stream(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Connection(msg) => write!(f, "backend connection error: {}", msg),
            BackendError::Protocol(msg) => write!(f, "backend protocol error: {}", msg),
            BackendError::Stream(msg) => write!(f, "backend stream error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// A speech recognizer.
///
/// Both calls are blocking by nature and must never run on the session's
/// event path: `transcribe` is offloaded to a blocking task, `stream`
/// runs on the bridge's dedicated worker thread.
pub trait SpeechBackend: Send + Sync {
    /// Transcribe one finite utterance, returning the best transcript.
    fn transcribe(&self, config: &SpeechConfig, audio: &[u8]) -> Result<String, BackendError>;

    /// Consume audio frames from `frames` until it is closed, emitting
    /// results into `results` as the recognizer produces them. Returns
    /// when the recognizer ends the stream; errors are returned, not
    /// panicked.
    fn stream(
        &self,
        config: &SpeechConfig,
        frames: FrameSource,
        results: ResultSink,
    ) -> Result<(), BackendError>;
}
