//! # WebSocket Message Protocol
//!
//! JSON message types exchanged over the `/ws` voice session connection.
//! Every frame is a JSON object carrying a `type` tag plus type-specific
//! fields.
//!
//! ## Protocol:
//! - **Client → Server**: `session_start`, `audio_chunk` (base64 PCM),
//!   `end_of_utterance`, `session_end`
//! - **Server → Client**: `assistant_say`, `final_transcript`,
//!   `function_call`, `error`, `session_end`
//!
//! Decoding is deliberately forgiving: anything that is not a well-formed,
//! known message produces an outbound `error` message and the session
//! carries on. A bad frame must never take the connection down.

use serde::{Deserialize, Serialize};

/// Messages accepted from the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Opens the voice session and triggers the greeting.
    #[serde(rename = "session_start")]
    SessionStart {
        /// Requested locale, informational only (the server locale is
        /// fixed by configuration).
        locale: Option<String>,
    },

    /// One chunk of microphone audio.
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        /// Audio encoding tag; must equal `PCM_S16LE_16000` to be honored.
        format: String,
        /// Base64-encoded 16-bit little-endian PCM bytes.
        data: String,
    },

    /// Marks the end of one spoken utterance (batched mode).
    #[serde(rename = "end_of_utterance")]
    EndOfUtterance,

    /// Client-initiated session termination.
    #[serde(rename = "session_end")]
    SessionEnd,
}

/// Messages emitted to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Human-facing acknowledgement or prompt.
    #[serde(rename = "assistant_say")]
    AssistantSay { text: String },

    /// Finalized recognized speech.
    #[serde(rename = "final_transcript")]
    FinalTranscript { text: String },

    /// Actionable command for the external actuator.
    #[serde(rename = "function_call")]
    FunctionCall { name: String, args: FunctionArgs },

    /// Malformed input or unknown message type.
    #[serde(rename = "error")]
    Error { message: String },

    /// Server-initiated termination notice.
    #[serde(rename = "session_end")]
    SessionEnd,
}

/// Arguments of a `set_pwm` function call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionArgs {
    /// Validated duty-cycle percentage in [0, 100].
    pub percent: u8,
}

impl ServerMessage {
    pub fn say(text: impl Into<String>) -> Self {
        ServerMessage::AssistantSay { text: text.into() }
    }

    pub fn transcript(text: impl Into<String>) -> Self {
        ServerMessage::FinalTranscript { text: text.into() }
    }

    pub fn set_pwm(percent: u8) -> Self {
        ServerMessage::FunctionCall {
            name: "set_pwm".to_string(),
            args: FunctionArgs { percent },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The frame was not valid JSON at all.
    InvalidJson,
    /// The `type` tag named a message kind this protocol does not know.
    UnknownType(String),
    /// A known message kind with malformed or missing fields.
    InvalidPayload(String),
}

impl DecodeError {
    /// The diagnostic string placed in the outbound `error` message.
    pub fn message(&self) -> String {
        match self {
            DecodeError::InvalidJson => "invalid_json".to_string(),
            DecodeError::UnknownType(kind) => format!("unknown_type:{}", kind),
            DecodeError::InvalidPayload(kind) => format!("invalid_payload:{}", kind),
        }
    }
}

/// Decode one inbound text frame.
///
/// Decoding is two-stage so the offending `type` tag can be echoed back in
/// the diagnostic: first the raw JSON value, then the typed message.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| DecodeError::InvalidJson)?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("none")
        .to_string();

    match kind.as_str() {
        "session_start" | "audio_chunk" | "end_of_utterance" | "session_end" => {
            serde_json::from_value(value).map_err(|_| DecodeError::InvalidPayload(kind))
        }
        _ => Err(DecodeError::UnknownType(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_session_start_with_locale() {
        let msg = decode_client_message(r#"{"type":"session_start","locale":"tr-TR"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SessionStart { locale: Some("tr-TR".to_string()) }
        );
    }

    #[test]
    fn decodes_session_start_without_locale() {
        let msg = decode_client_message(r#"{"type":"session_start"}"#).unwrap();
        assert_eq!(msg, ClientMessage::SessionStart { locale: None });
    }

    #[test]
    fn decodes_audio_chunk() {
        let msg = decode_client_message(
            r#"{"type":"audio_chunk","format":"PCM_S16LE_16000","data":"AAA="}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::AudioChunk { format, data } => {
                assert_eq!(format, "PCM_S16LE_16000");
                assert_eq!(data, "AAA=");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn rejects_non_json_input() {
        assert_eq!(
            decode_client_message("this is not json"),
            Err(DecodeError::InvalidJson)
        );
        assert_eq!(DecodeError::InvalidJson.message(), "invalid_json");
    }

    #[test]
    fn rejects_unknown_type_with_diagnostic_tag() {
        let err = decode_client_message(r#"{"type":"telemetry"}"#).unwrap_err();
        assert_eq!(err.message(), "unknown_type:telemetry");
    }

    #[test]
    fn rejects_missing_type_tag() {
        let err = decode_client_message(r#"{"locale":"tr-TR"}"#).unwrap_err();
        assert_eq!(err.message(), "unknown_type:none");
    }

    #[test]
    fn rejects_known_type_with_bad_fields() {
        let err = decode_client_message(r#"{"type":"audio_chunk","format":42}"#).unwrap_err();
        assert_eq!(err.message(), "invalid_payload:audio_chunk");
    }

    #[test]
    fn function_call_wire_format_matches_contract() {
        let json = serde_json::to_string(&ServerMessage::set_pwm(40)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "function_call");
        assert_eq!(value["name"], "set_pwm");
        assert_eq!(value["args"]["percent"], 40);
    }

    #[test]
    fn error_message_round_trip() {
        let json = serde_json::to_string(&ServerMessage::error("invalid_json")).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("invalid_json"));
    }
}
