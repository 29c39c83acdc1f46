//! # Voice Session WebSocket Handler
//!
//! Owns the `/ws` connection: one actor per client, wrapping one
//! [`Session`] state machine. The actor's job is transport only; every
//! decision about greetings, audio, transcripts and termination is made
//! by the session and comes back as a [`Step`] the actor executes.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: client connects to `/ws` (admission is checked at
//!    the HTTP upgrade, before the actor exists)
//! 2. **Session**: client sends `session_start`, streams `audio_chunk`
//!    messages, and closes with `session_end`
//! 3. **Results**: the server pushes `assistant_say`, `final_transcript`,
//!    `function_call` and `error` messages as JSON text frames
//!
//! Transcription results arrive on background tasks and re-enter the
//! actor as [`RecognizerUpdate`] messages, so the session state is only
//! ever touched from the actor's own context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::protocol::{self, ServerMessage};
use crate::session::{Session, Step};
use crate::speech::{SpeechBackend, SpeechConfig, TranscriptResult};
use crate::state::AppState;

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long the client may stay silent before the connection is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Diagnostic for binary frames: the protocol is JSON text only, so a
/// binary frame is an unknown message kind like any other.
const BINARY_FRAME_DIAGNOSTIC: &str = "unknown_type:binary";

/// A transcription result crossing back into the actor context.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RecognizerUpdate(pub TranscriptResult);

/// WebSocket actor for one voice session.
pub struct VoiceWebSocket {
    session: Session,
    app_state: AppState,
    backend: Arc<dyn SpeechBackend>,
    speech_config: SpeechConfig,
    teardown_timeout: Duration,
    last_heartbeat: Instant,
}

impl VoiceWebSocket {
    pub fn new(
        app_state: AppState,
        backend: Arc<dyn SpeechBackend>,
    ) -> Self {
        let config = app_state.get_config();
        let speech_config = config.speech_config();
        let session = Session::new(
            Uuid::new_v4().to_string(),
            config.session.mode,
            backend.clone(),
            speech_config.clone(),
            config.session.stop_phrases.clone(),
        );

        Self {
            session,
            app_state,
            backend,
            speech_config,
            teardown_timeout: Duration::from_millis(config.session.teardown_timeout_ms),
            last_heartbeat: Instant::now(),
        }
    }

    /// Execute everything one [`Step`] asks for.
    fn apply_step(&mut self, step: Step, ctx: &mut ws::WebsocketContext<Self>) {
        for message in &step.outbound {
            if matches!(message, ServerMessage::FunctionCall { .. }) {
                self.app_state.record_command();
            }
            self.send(message, ctx);
        }

        // Batched mode: one blocking transcription call per utterance,
        // off the actor thread.
        if let Some(audio) = step.transcribe {
            let backend = self.backend.clone();
            let speech_config = self.speech_config.clone();
            let addr = ctx.address();

            tokio::task::spawn_blocking(move || {
                let result = match backend.transcribe(&speech_config, &audio) {
                    Ok(text) => TranscriptResult::finalized(text),
                    Err(err) => TranscriptResult::failed(err.to_string()),
                };
                addr.do_send(RecognizerUpdate(result));
            });
        }

        // Continuous mode: drain the bridge's result stream back into
        // the actor for as long as the session lives.
        if let Some(mut results) = step.results {
            let addr = ctx.address();
            tokio::spawn(async move {
                while let Some(result) = results.recv().await {
                    addr.do_send(RecognizerUpdate(result));
                }
                debug!("transcription result stream ended");
            });
        }

        if step.terminate {
            ctx.close(Some(ws::CloseReason {
                code: ws::CloseCode::Normal,
                description: None,
            }));
            ctx.stop();
        }
    }

    fn send(&self, message: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(message) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(session = %self.session.id(), "unserializable message: {}", err),
        }
    }
}

impl Actor for VoiceWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session = %self.session.id(), "voice connection opened");

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(session = %act.session.id(), "heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(session = %self.session.id(), "voice connection closed");
        self.app_state.end_session();

        // The bridge worker may be blocked inside the backend; the
        // bounded wait must not run on the event loop.
        if let Some(bridge) = self.session.take_bridge() {
            let timeout = self.teardown_timeout;
            tokio::task::spawn_blocking(move || bridge.shutdown(timeout));
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for VoiceWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match protocol::decode_client_message(&text) {
                Ok(message) => {
                    let step = self.session.on_message(message);
                    self.apply_step(step, ctx);
                }
                Err(err) => {
                    debug!(session = %self.session.id(), "undecodable frame: {}", err.message());
                    self.send(&ServerMessage::error(err.message()), ctx);
                }
            },
            Ok(ws::Message::Binary(_)) => {
                // Audio travels base64-encoded inside `audio_chunk`.
                warn!(session = %self.session.id(), "binary frame rejected");
                self.send(&ServerMessage::error(BINARY_FRAME_DIAGNOSTIC), ctx);
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session = %self.session.id(), "client closed connection: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(session = %self.session.id(), "unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(session = %self.session.id(), "websocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<RecognizerUpdate> for VoiceWebSocket {
    type Result = ();

    fn handle(&mut self, msg: RecognizerUpdate, ctx: &mut Self::Context) {
        let step = self.session.on_transcript(msg.0);
        self.apply_step(step, ctx);
    }
}

/// `/ws` endpoint: admission check, then upgrade to the session actor.
pub async fn voice_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
    backend: web::Data<dyn SpeechBackend>,
) -> ActixResult<HttpResponse> {
    let max = app_state.get_config().session.max_concurrent_sessions;

    if !app_state.begin_session() {
        warn!("voice session rejected, {} sessions already active", max);
        return Err(AppError::SessionLimit(max).into());
    }

    let actor = VoiceWebSocket::new(app_state.get_ref().clone(), backend.into_inner());

    match ws::start(actor, &req, stream) {
        Ok(response) => Ok(response),
        Err(err) => {
            // The slot was reserved before the handshake; give it back.
            app_state.end_session();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::speech::RemoteRecognizer;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::App;

    fn test_backend() -> Arc<dyn SpeechBackend> {
        Arc::new(RemoteRecognizer::new("ws://127.0.0.1:1"))
    }

    fn app_state(max_sessions: usize) -> AppState {
        let mut config = AppConfig::default();
        config.session.max_concurrent_sessions = max_sessions;
        AppState::new(config)
    }

    #[test]
    fn binary_frames_are_tagged_as_unknown_type() {
        let json =
            serde_json::to_string(&ServerMessage::error(BINARY_FRAME_DIAGNOSTIC)).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("unknown_type:binary"));
    }

    #[actix_web::test]
    async fn session_limit_is_enforced_before_the_upgrade() {
        let state = app_state(1);
        assert!(state.begin_session());

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::from(test_backend()))
                .route("/ws", web::get().to(voice_websocket)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/ws").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn failed_handshake_releases_the_session_slot() {
        let state = app_state(1);

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .app_data(web::Data::from(test_backend()))
                .route("/ws", web::get().to(voice_websocket)),
        )
        .await;

        // A plain GET without upgrade headers fails the handshake.
        let req = actix_test::TestRequest::get().uri("/ws").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_ne!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.status().is_client_error());

        assert_eq!(state.metrics_snapshot().active_sessions, 0);
    }
}
