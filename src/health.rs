use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Liveness report for `/healthz`: build identity, uptime, session
/// counters and the speech configuration the server was started with.
pub async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "lang": config.speech.language,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "mode": config.session.mode,
        "sessions": {
            "active": metrics.active_sessions,
            "started": metrics.sessions_started,
            "max": config.session.max_concurrent_sessions,
            "commands_emitted": metrics.commands_emitted
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn healthz_reports_status_and_language() {
        let state = AppState::new(AppConfig::default());
        state.begin_session();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/healthz", web::get().to(healthz)),
        )
        .await;

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["lang"], "tr-TR");
        assert_eq!(body["mode"], "continuous");
        assert_eq!(body["sessions"]["active"], 1);
        assert_eq!(body["sessions"]["started"], 1);
        assert_eq!(body["sessions"]["max"], 10);
    }
}
