//! # Voice Session Pipeline
//!
//! The per-connection state machine: receives protocol messages, buffers
//! or forwards audio, drives the transcription bridge, interprets
//! finalized transcripts and produces the outbound protocol messages.
//!
//! ## Session Lifecycle:
//! 1. **Idle**: connection open, waiting for `session_start`
//! 2. **Listening**: greeting sent, audio and control messages accepted
//! 3. **Terminated**: absorbing; nothing is processed anymore
//!
//! The struct is transport-free on purpose: the WebSocket actor owns the
//! connection and feeds decoded messages in; every handler returns a
//! [`Step`] describing what to send and what follow-up work to schedule.
//! That keeps the whole pipeline testable against a stub backend.
//!
//! One state machine covers both configured modes: `batched` accumulates
//! an utterance and transcribes it on `end_of_utterance`; `continuous`
//! streams every chunk through the bridge and reacts to finalized
//! results as they arrive.

use std::sync::Arc;

use base64::Engine as _;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::audio::{self, UtteranceBuffer};
use crate::config::SessionMode;
use crate::nlu;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::speech::{SpeechBackend, SpeechConfig, TranscriptResult, TranscriptionBridge};

/// The only audio chunk format the pipeline honors.
pub const PCM_FORMAT: &str = "PCM_S16LE_16000";

const GREETING: &str = "Merhaba, hazırım.";
const PROMPT_NO_AUDIO: &str = "Ses alamadım, lütfen tekrar konuşur musunuz?";
const PROMPT_UNRECOGNIZED: &str = "Sizi anlayamadım, lütfen tekrar söyler misiniz?";
const PROMPT_CLARIFY: &str = "0 ile 100 arasında bir yüzde değeri söyler misiniz?";
const FAREWELL: &str = "Görüşmek üzere, kapatıyorum.";

fn confirmation(percent: u8) -> String {
    format!("PWM'i yüzde {}'a alıyorum.", percent)
}

/// Session lifecycle state. `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Terminated,
}

/// What one handled event asks the connection owner to do.
#[derive(Default)]
pub struct Step {
    /// Protocol messages to write, in order.
    pub outbound: Vec<ServerMessage>,

    /// A complete utterance ready for one-shot transcription (batched
    /// mode). Must run on a blocking task, never on the event path.
    pub transcribe: Option<Vec<u8>>,

    /// A freshly opened stream of transcription results to drain
    /// (continuous mode). Handed out at most once per bridge.
    pub results: Option<UnboundedReceiver<TranscriptResult>>,

    /// Close the connection after writing `outbound`.
    pub terminate: bool,
}

impl Step {
    fn say(text: &str) -> Self {
        Step { outbound: vec![ServerMessage::say(text)], ..Step::default() }
    }

    fn error(message: String) -> Self {
        Step { outbound: vec![ServerMessage::error(message)], ..Step::default() }
    }
}

/// One connection's voice session.
pub struct Session {
    id: String,
    state: SessionState,
    mode: SessionMode,
    buffer: UtteranceBuffer,
    heard_audio: bool,
    backend: Arc<dyn SpeechBackend>,
    speech_config: SpeechConfig,
    stop_phrases: Vec<String>,
    bridge: Option<TranscriptionBridge>,
}

impl Session {
    pub fn new(
        id: String,
        mode: SessionMode,
        backend: Arc<dyn SpeechBackend>,
        speech_config: SpeechConfig,
        stop_phrases: Vec<String>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            mode,
            buffer: UtteranceBuffer::new(),
            heard_audio: false,
            backend,
            speech_config,
            stop_phrases,
            bridge: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle one decoded inbound message.
    pub fn on_message(&mut self, message: ClientMessage) -> Step {
        if self.state == SessionState::Terminated {
            debug!(session = %self.id, "message after termination ignored");
            return Step::default();
        }

        match message {
            ClientMessage::SessionStart { locale } => self.start(locale),
            ClientMessage::AudioChunk { format, data } => self.audio_chunk(&format, &data),
            ClientMessage::EndOfUtterance => self.end_of_utterance(),
            ClientMessage::SessionEnd => self.end_session(),
        }
    }

    /// Handle one transcription result, from either mode.
    ///
    /// Interim results are informational only; a backend fault comes in
    /// as a synthetic error result and turns into a re-prompt, never a
    /// crash.
    pub fn on_transcript(&mut self, result: TranscriptResult) -> Step {
        if self.state == SessionState::Terminated {
            return Step::default();
        }

        if let Some(fault) = result.error {
            warn!(session = %self.id, "transcription failed: {}", fault);
            // A synthetic error result is always the last result of its
            // stream: the worker behind the bridge has already exited.
            // Drop the dead bridge so the next chunk opens a fresh one
            // and the session stays listening-capable.
            if self.mode == SessionMode::Continuous {
                if let Some(mut bridge) = self.bridge.take() {
                    bridge.close();
                }
            }
            return Step::say(PROMPT_UNRECOGNIZED);
        }

        if !result.is_final {
            debug!(session = %self.id, "interim transcript: {:?}", result.text);
            return Step::default();
        }

        let text = result.text.trim().to_string();
        if text.is_empty() {
            return Step::say(PROMPT_UNRECOGNIZED);
        }

        info!(session = %self.id, "final transcript: {:?}", text);
        let mut step = Step::default();
        step.outbound.push(ServerMessage::transcript(text.clone()));

        // Stop intents only exist in continuous mode; in batched mode the
        // client ends the session with an explicit message instead.
        if self.mode == SessionMode::Continuous && nlu::is_stop_intent(&text, &self.stop_phrases)
        {
            info!(session = %self.id, "stop intent recognized, ending session");
            step.outbound.push(ServerMessage::say(FAREWELL));
            step.outbound.push(ServerMessage::SessionEnd);
            step.terminate = true;
            self.terminate();
            return step;
        }

        match nlu::extract_percentage(&text) {
            Some(percent) => {
                step.outbound.push(ServerMessage::set_pwm(percent));
                step.outbound.push(ServerMessage::say(&confirmation(percent)));
            }
            None => step.outbound.push(ServerMessage::say(PROMPT_CLARIFY)),
        }

        step
    }

    /// The client went away or the connection is closing: same cleanup
    /// path as an explicit `session_end`. Returns the bridge (if any) so
    /// the caller can run the bounded teardown off the event path.
    pub fn take_bridge(&mut self) -> Option<TranscriptionBridge> {
        self.terminate();
        self.bridge.take()
    }

    fn start(&mut self, locale: Option<String>) -> Step {
        info!(session = %self.id, locale = ?locale, "session started");

        let mut step = Step::say(GREETING);

        if self.state == SessionState::Idle {
            self.state = SessionState::Listening;
        }

        // The continuous variant establishes its single backend stream
        // once, up front; the batched variant never needs one here.
        if self.mode == SessionMode::Continuous && self.bridge.is_none() {
            match self.open_stream() {
                Ok(results) => step.results = results,
                Err(message) => step.outbound.push(ServerMessage::error(message)),
            }
        }

        step
    }

    fn audio_chunk(&mut self, format: &str, data: &str) -> Step {
        if self.state != SessionState::Listening {
            debug!(session = %self.id, "audio before session_start discarded");
            return Step::default();
        }

        if format != PCM_FORMAT {
            warn!(session = %self.id, "unsupported audio format: {}", format);
            return Step::error(format!("unsupported_format:{}", format));
        }

        let bytes = match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(session = %self.id, "undecodable audio chunk: {}", err);
                return Step::error("invalid_audio".to_string());
            }
        };

        debug!(
            session = %self.id,
            bytes = bytes.len(),
            peak = audio::peak_amplitude(&bytes),
            "audio chunk received"
        );

        match self.mode {
            SessionMode::Continuous => {
                let mut step = Step::default();
                if self.bridge.is_none() {
                    match self.open_stream() {
                        Ok(results) => step.results = results,
                        Err(message) => return Step::error(message),
                    }
                }
                if let Some(bridge) = &self.bridge {
                    bridge.submit(bytes);
                    self.heard_audio = true;
                }
                step
            }
            SessionMode::Batched => match self.buffer.append(&bytes) {
                Ok(()) => {
                    self.heard_audio = true;
                    Step::default()
                }
                Err(err) => {
                    warn!(session = %self.id, "rejected audio chunk: {}", err);
                    Step::error("invalid_audio".to_string())
                }
            },
        }
    }

    fn end_of_utterance(&mut self) -> Step {
        match self.mode {
            SessionMode::Batched => {
                if self.buffer.is_empty() {
                    return Step::say(PROMPT_NO_AUDIO);
                }

                debug!(
                    session = %self.id,
                    seconds = self.buffer.duration_seconds(),
                    "utterance complete, transcribing"
                );
                Step { transcribe: Some(self.buffer.take()), ..Step::default() }
            }
            SessionMode::Continuous => {
                // The backend decides utterance boundaries here; the
                // message is a harmless no-op.
                debug!(session = %self.id, "end_of_utterance ignored in continuous mode");
                Step::default()
            }
        }
    }

    fn end_session(&mut self) -> Step {
        info!(session = %self.id, heard_audio = self.heard_audio, "client ended session");
        self.terminate();
        Step { terminate: true, ..Step::default() }
    }

    fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.buffer.clear();
        if let Some(bridge) = &mut self.bridge {
            bridge.close();
        }
    }

    /// Open the backend stream. At most one bridge ever exists per
    /// session.
    fn open_stream(
        &mut self,
    ) -> Result<Option<UnboundedReceiver<TranscriptResult>>, String> {
        match TranscriptionBridge::spawn(self.backend.clone(), self.speech_config.clone()) {
            Ok(mut bridge) => {
                let results = bridge.take_results();
                self.bridge = Some(bridge);
                Ok(results)
            }
            Err(err) => {
                error!(session = %self.id, "could not start transcription worker: {}", err);
                Err("backend_unavailable".to_string())
            }
        }
    }
}
