//! # Remote Recognizer Backend
//!
//! Production [`SpeechBackend`] speaking to an external recognizer
//! gateway over a WebSocket. The wire protocol is small: one JSON
//! `start` message carrying the recognition parameters, binary frames of
//! raw PCM, a JSON `end` message, and JSON results
//! `{"text": ..., "is_final": ...}` coming back.
//!
//! The client is deliberately blocking (`tungstenite`): both trait calls
//! run off the session's event path, on a blocking task or the bridge's
//! worker thread. For the streaming call the socket read timeout is used
//! to interleave frame sending and result reading on that single thread.

use std::net::TcpStream;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

use super::bridge::{FramePoll, FrameSource, ResultSink};
use super::{BackendError, SpeechBackend, SpeechConfig, TranscriptResult};

/// How long one socket read may block before the worker checks the frame
/// queue again.
const READ_POLL: Duration = Duration::from_millis(20);

/// How long to wait on the frame queue per iteration while streaming.
const FRAME_POLL: Duration = Duration::from_millis(20);

type GatewaySocket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct GatewayResult {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_final: bool,
}

/// Blocking WebSocket client for the recognizer gateway.
pub struct RemoteRecognizer {
    endpoint: String,
}

impl RemoteRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    /// Connect and send the `start` control message.
    fn open(&self, config: &SpeechConfig) -> Result<GatewaySocket, BackendError> {
        let (mut socket, _response) = connect(self.endpoint.as_str())
            .map_err(|err| BackendError::Connection(err.to_string()))?;

        let start = json!({
            "type": "start",
            "language": config.language,
            "sample_rate": config.sample_rate,
            "punctuation": config.punctuation,
            "phrase_hints": config.phrase_hints,
        });
        socket
            .send(Message::Text(start.to_string()))
            .map_err(|err| BackendError::Connection(err.to_string()))?;

        debug!("recognizer gateway connected: {}", self.endpoint);
        Ok(socket)
    }

    fn send_end(socket: &mut GatewaySocket) -> Result<(), BackendError> {
        socket
            .send(Message::Text(json!({"type": "end"}).to_string()))
            .map_err(|err| BackendError::Stream(err.to_string()))
    }

    fn parse_result(raw: &str) -> Option<GatewayResult> {
        match serde_json::from_str(raw) {
            Ok(result) => Some(result),
            Err(err) => {
                warn!("unparseable gateway message: {}", err);
                None
            }
        }
    }
}

impl SpeechBackend for RemoteRecognizer {
    fn transcribe(&self, config: &SpeechConfig, audio: &[u8]) -> Result<String, BackendError> {
        let mut socket = self.open(config)?;

        socket
            .send(Message::Binary(audio.to_vec()))
            .map_err(|err| BackendError::Stream(err.to_string()))?;
        Self::send_end(&mut socket)?;

        loop {
            match socket.read() {
                Ok(Message::Text(raw)) => {
                    if let Some(result) = Self::parse_result(&raw) {
                        if result.is_final {
                            let _ = socket.close(None);
                            return Ok(result.text);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    return Err(BackendError::Protocol(
                        "gateway closed before a final result".to_string(),
                    ));
                }
                Ok(_) => {}
                Err(err) => return Err(BackendError::Stream(err.to_string())),
            }
        }
    }

    fn stream(
        &self,
        config: &SpeechConfig,
        frames: FrameSource,
        results: ResultSink,
    ) -> Result<(), BackendError> {
        let mut socket = self.open(config)?;

        // A short read timeout lets one thread alternate between pushing
        // frames and pulling results.
        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream
                .set_read_timeout(Some(READ_POLL))
                .map_err(|err| BackendError::Connection(err.to_string()))?;
        }

        let mut sending = true;
        loop {
            if sending {
                // Forward everything already queued before touching the
                // socket again.
                let mut wait = FRAME_POLL;
                loop {
                    match frames.poll(wait) {
                        FramePoll::Frame(bytes) => {
                            socket
                                .send(Message::Binary(bytes))
                                .map_err(|err| BackendError::Stream(err.to_string()))?;
                            wait = Duration::ZERO;
                        }
                        FramePoll::Closed => {
                            Self::send_end(&mut socket)?;
                            sending = false;
                            break;
                        }
                        FramePoll::Idle => break,
                    }
                }
            }

            match socket.read() {
                Ok(Message::Text(raw)) => {
                    if let Some(result) = Self::parse_result(&raw) {
                        let is_final = result.is_final;
                        results.emit(if is_final {
                            TranscriptResult::finalized(result.text)
                        } else {
                            TranscriptResult::interim(result.text)
                        });
                        // After end-of-audio the stream ends with the
                        // first final result.
                        if is_final && !sending {
                            let _ = socket.close(None);
                            return Ok(());
                        }
                    }
                }
                Ok(Message::Close(_)) => return Ok(()),
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(tungstenite::Error::Io(err))
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut => {}
                Err(err) => return Err(BackendError::Stream(err.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::TranscriptionBridge;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    /// Minimal scripted gateway: accepts one connection, consumes the
    /// start message and audio frames until `end`, then replies with the
    /// given results.
    fn scripted_gateway(results: Vec<(&'static str, bool)>) -> (String, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();

            // Start message first.
            let start = socket.read().unwrap();
            assert!(matches!(start, Message::Text(ref raw) if raw.contains("\"start\"")));

            let mut frames = 0usize;
            loop {
                match socket.read().unwrap() {
                    Message::Binary(_) => frames += 1,
                    Message::Text(raw) if raw.contains("\"end\"") => break,
                    other => panic!("unexpected gateway input: {:?}", other),
                }
            }

            for (text, is_final) in results {
                let reply = json!({"text": text, "is_final": is_final}).to_string();
                socket.send(Message::Text(reply)).unwrap();
            }
            let _ = socket.close(None);
            frames
        });

        (endpoint, handle)
    }

    #[test]
    fn batch_transcribe_returns_final_text() {
        let (endpoint, gateway) = scripted_gateway(vec![("yüzde 40", true)]);
        let recognizer = RemoteRecognizer::new(endpoint);

        let text = recognizer
            .transcribe(&SpeechConfig::default(), &[0u8; 320])
            .unwrap();

        assert_eq!(text, "yüzde 40");
        assert_eq!(gateway.join().unwrap(), 1);
    }

    #[test]
    fn connection_refused_surfaces_as_backend_error() {
        let recognizer = RemoteRecognizer::new("ws://127.0.0.1:1");
        let err = recognizer
            .transcribe(&SpeechConfig::default(), &[0u8; 2])
            .unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }

    #[tokio::test]
    async fn streaming_through_the_bridge_delivers_ordered_results() {
        let (endpoint, gateway) =
            scripted_gateway(vec![("kırk", false), ("kırk beş", true)]);
        let backend = Arc::new(RemoteRecognizer::new(endpoint));

        let mut bridge = TranscriptionBridge::spawn(backend, SpeechConfig::default()).unwrap();
        let mut results = bridge.take_results().unwrap();

        bridge.submit(vec![0u8; 320]);
        bridge.submit(vec![0u8; 320]);
        bridge.close();

        assert_eq!(results.recv().await, Some(TranscriptResult::interim("kırk")));
        assert_eq!(
            results.recv().await,
            Some(TranscriptResult::finalized("kırk beş"))
        );
        assert_eq!(results.recv().await, None);

        assert_eq!(gateway.join().unwrap(), 2);
    }
}
