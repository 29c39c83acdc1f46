//! # Voice PWM Backend - Main Application Entry Point
//!
//! Actix-web server bridging a browser voice client to a streaming
//! speech recognizer: clients hold a WebSocket open on `/ws`, stream
//! microphone audio, and receive spoken acknowledgements plus `set_pwm`
//! commands extracted from Turkish percentage utterances.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment)
//! - **state**: shared state, session admission and counters
//! - **protocol**: the JSON message types on the `/ws` connection
//! - **session**: the per-connection voice session state machine
//! - **speech**: the recognizer boundary (trait, bridge, remote client)
//! - **nlu**: Turkish percentage extraction and stop-intent matching
//! - **audio**: utterance buffering and PCM instrumentation
//! - **websocket**: the connection actor wiring it all together
//! - **health / middleware / error**: the HTTP surface around it

mod audio;
mod config;
mod error;
mod health;
mod middleware;
mod nlu;
mod protocol;
mod session;
mod speech;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use speech::{RemoteRecognizer, SpeechBackend};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag, set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-pwm-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Recognizer gateway: {} ({}, {:?} mode)",
        config.speech.endpoint, config.speech.language, config.session.mode
    );

    let app_state = AppState::new(config.clone());
    let backend: Arc<dyn SpeechBackend> =
        Arc::new(RemoteRecognizer::new(config.speech.endpoint.clone()));
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::from(backend.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::RequestLogging)
            .route("/healthz", web::get().to(health::healthz))
            .route("/ws", web::get().to(websocket::voice_websocket))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging via tracing; `RUST_LOG` overrides the default filter.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_pwm_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
