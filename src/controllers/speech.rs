use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::speech::{
        JobStatusResponse, SpeechService, SpeechServiceApi, StartJobRequest, StartJobResponse,
        SynthesizeRequest, SynthesizeResponse,
    },
    error::AppResult,
};

pub struct SpeechController {
    speech_service: Arc<SpeechService>,
}

impl SpeechController {
    pub fn new(speech_service: Arc<SpeechService>) -> Self {
        Self { speech_service }
    }

    /// POST /api/speech - Synthesize a short text in one request
    pub async fn synthesize(
        State(controller): State<Arc<SpeechController>>,
        Json(request): Json<SynthesizeRequest>,
    ) -> AppResult<Json<SynthesizeResponse>> {
        let response = controller.speech_service.synthesize_once(request).await?;
        Ok(Json(response))
    }

    /// POST /api/speech/jobs - Start or join chunked generation
    ///
    /// 200 when the audio already exists, 202 while it is being generated.
    pub async fn start_job(
        State(controller): State<Arc<SpeechController>>,
        Json(request): Json<StartJobRequest>,
    ) -> AppResult<(StatusCode, Json<StartJobResponse>)> {
        let response = controller.speech_service.start_job(request).await?;
        let status = if response.cached {
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        };
        Ok((status, Json(response)))
    }

    /// GET /api/speech/jobs/{job_id} - Poll job progress
    pub async fn get_job(
        State(controller): State<Arc<SpeechController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<JobStatusResponse>> {
        let response = controller.speech_service.get_job_status(job_id).await?;
        Ok(Json(response))
    }
}
