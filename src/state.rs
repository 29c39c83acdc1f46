//! # Application State Management
//!
//! Shared state accessed by every HTTP handler and WebSocket actor. All
//! mutable pieces sit behind `Arc<RwLock<T>>` so handlers can read
//! concurrently while occasional writers (session bookkeeping) take the
//! lock briefly.
//!
//! Session admission lives here too: [`AppState::begin_session`] is the
//! single gate that enforces the concurrent session cap, atomically with
//! the counter increment.

use crate::config::AppConfig;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<RwLock<AppConfig>>,
    metrics: Arc<RwLock<SessionMetrics>>,
    start_time: Instant,
}

/// Voice session counters, reported by the health endpoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Currently open voice sessions.
    pub active_sessions: u32,

    /// Sessions accepted since server start.
    pub sessions_started: u64,

    /// `set_pwm` function calls emitted since server start.
    pub commands_emitted: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(SessionMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Copy of the current configuration. Cloning releases the lock
    /// immediately.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Try to admit one more voice session.
    ///
    /// Returns false when the configured cap is already reached; the
    /// check and the increment happen under one write lock so two
    /// racing upgrades cannot both squeeze past the cap.
    pub fn begin_session(&self) -> bool {
        let max = self.config.read().unwrap().session.max_concurrent_sessions;
        let mut metrics = self.metrics.write().unwrap();

        if (metrics.active_sessions as usize) >= max {
            return false;
        }

        metrics.active_sessions += 1;
        metrics.sessions_started += 1;
        true
    }

    /// Release one voice session slot. Underflow-safe.
    pub fn end_session(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    /// Count one emitted `set_pwm` command.
    pub fn record_command(&self) {
        self.metrics.write().unwrap().commands_emitted += 1;
    }

    pub fn metrics_snapshot(&self) -> SessionMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
