use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use crate::infrastructure::db::{check_connection, DbPool};
use crate::infrastructure::providers::SpeechProvider;

/// Dependencies probed by the readiness check; `pool` is absent with the in-memory store
#[derive(Clone)]
pub struct HealthState {
    pub pool: Option<Arc<DbPool>>,
    pub provider: Arc<dyn SpeechProvider>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(state): State<HealthState>) -> impl IntoResponse {
    let database = match &state.pool {
        Some(pool) => match check_connection(pool).await {
            Ok(_) => "connected",
            Err(_) => "disconnected",
        },
        None => "in_memory",
    };
    let provider = if state.provider.is_configured() {
        "available"
    } else {
        "not_configured"
    };

    let ready = database != "disconnected" && provider == "available";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "database": database,
            "tts": provider,
            "provider": state.provider.name(),
        })),
    )
}
