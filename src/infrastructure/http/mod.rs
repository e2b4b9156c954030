pub mod request_id;

pub use request_id::{request_id_middleware, RequestId};

use axum::{middleware, routing::get, Router};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::controllers::{
    health::{self, HealthState},
    materials::MaterialController,
    speech::SpeechController,
};
use crate::infrastructure::config::Config;

/// Build the application router.
///
/// `audio_dir` is served at `/audio` when audio is stored on the local filesystem.
pub fn create_router(
    health_state: HealthState,
    speech_controller: Arc<SpeechController>,
    material_controller: Arc<MaterialController>,
    audio_dir: Option<PathBuf>,
) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(health_state);

    let speech_routes = Router::new()
        .route("/api/speech", axum::routing::post(SpeechController::synthesize))
        .route("/api/speech/jobs", axum::routing::post(SpeechController::start_job))
        .route("/api/speech/jobs/:job_id", get(SpeechController::get_job))
        .with_state(speech_controller);

    let material_routes = Router::new()
        .route(
            "/api/materials/:material_id/speech",
            get(MaterialController::get_status).post(MaterialController::start_generation),
        )
        .with_state(material_controller);

    let mut app = Router::new()
        .merge(health_routes)
        .merge(speech_routes)
        .merge(material_routes);

    if let Some(dir) = audio_dir {
        app = app.nest_service("/audio", ServeDir::new(dir));
    }

    app.layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn start_http_server(
    config: Arc<Config>,
    app: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
