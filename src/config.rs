//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SESSION_MODE, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

use crate::speech::SpeechConfig;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub speech: SpeechSettings,
    pub session: SessionSettings,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Speech recognizer settings, handed to the backend per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// BCP-47 language code for recognition.
    pub language: String,

    /// PCM sample rate in Hz; clients must send audio at this rate.
    pub sample_rate: u32,

    /// Ask the backend for automatic punctuation.
    pub punctuation: bool,

    /// Domain vocabulary hints passed to the recognizer.
    pub phrase_hints: Vec<String>,

    /// WebSocket endpoint of the recognizer gateway.
    pub endpoint: String,
}

/// How a voice session moves audio through the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// One backend stream per session; chunks are forwarded as they
    /// arrive and results come back asynchronously.
    Continuous,

    /// Chunks accumulate per utterance; one transcription call per
    /// `end_of_utterance`.
    Batched,
}

/// Voice session behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub mode: SessionMode,

    /// Hard cap on simultaneously open voice sessions.
    pub max_concurrent_sessions: usize,

    /// How long session teardown waits for the transcription worker
    /// before abandoning it.
    pub teardown_timeout_ms: u64,

    /// Utterances containing any of these (after normalization) end a
    /// continuous session.
    pub stop_phrases: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            speech: SpeechSettings {
                language: "tr-TR".to_string(),
                sample_rate: crate::audio::SAMPLE_RATE,
                punctuation: true,
                phrase_hints: vec!["yüzde".to_string()],
                endpoint: "ws://127.0.0.1:9090/asr".to_string(),
            },
            session: SessionSettings {
                mode: SessionMode::Continuous,
                max_concurrent_sessions: 10,
                teardown_timeout_ms: 2000,
                stop_phrases: vec![
                    "dur".to_string(),
                    "kapat".to_string(),
                    "yeter".to_string(),
                    "asistan dur".to_string(),
                ],
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml and the
    /// environment, in that priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_SESSION_MODE=batched`: Override session mode
    /// - `HOST` / `PORT`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly set these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.session.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent sessions must be greater than 0"
            ));
        }

        if self.speech.sample_rate != crate::audio::SAMPLE_RATE {
            return Err(anyhow::anyhow!(
                "Unsupported sample rate {} (the pipeline requires {})",
                self.speech.sample_rate,
                crate::audio::SAMPLE_RATE
            ));
        }

        if self.speech.endpoint.is_empty() {
            return Err(anyhow::anyhow!("Speech backend endpoint cannot be empty"));
        }

        Ok(())
    }

    /// Materialize the per-session recognizer parameters.
    pub fn speech_config(&self) -> SpeechConfig {
        SpeechConfig {
            language: self.speech.language.clone(),
            sample_rate: self.speech.sample_rate,
            punctuation: self.speech.punctuation,
            phrase_hints: self.speech.phrase_hints.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.speech.language, "tr-TR");
        assert_eq!(config.session.mode, SessionMode::Continuous);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_port_zero() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_foreign_sample_rate() {
        let mut config = AppConfig::default();
        config.speech.sample_rate = 44_100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_session_cap() {
        let mut config = AppConfig::default();
        config.session.max_concurrent_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn session_mode_deserializes_from_lowercase() {
        let mode: SessionMode = serde_json::from_str(r#""batched""#).unwrap();
        assert_eq!(mode, SessionMode::Batched);
        let mode: SessionMode = serde_json::from_str(r#""continuous""#).unwrap();
        assert_eq!(mode, SessionMode::Continuous);
    }

    #[test]
    fn speech_config_mirrors_settings() {
        let config = AppConfig::default();
        let speech = config.speech_config();
        assert_eq!(speech.language, "tr-TR");
        assert_eq!(speech.sample_rate, 16_000);
        assert!(speech.punctuation);
        assert_eq!(speech.phrase_hints, vec!["yüzde".to_string()]);
    }
}
