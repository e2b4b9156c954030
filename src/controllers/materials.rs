use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::material::{
        MaterialService, MaterialServiceApi, MaterialSpeechResponse, MaterialStatusQuery,
        StartMaterialSpeechRequest,
    },
    error::AppResult,
};

pub struct MaterialController {
    material_service: Arc<MaterialService>,
}

impl MaterialController {
    pub fn new(material_service: Arc<MaterialService>) -> Self {
        Self { material_service }
    }

    /// POST /api/materials/{material_id}/speech - Queue chunk audio from the reader's position
    pub async fn start_generation(
        State(controller): State<Arc<MaterialController>>,
        Path(material_id): Path<Uuid>,
        Json(request): Json<StartMaterialSpeechRequest>,
    ) -> AppResult<(StatusCode, Json<MaterialSpeechResponse>)> {
        let response = controller
            .material_service
            .start_generation(material_id, request)
            .await?;
        Ok((StatusCode::ACCEPTED, Json(response)))
    }

    /// GET /api/materials/{material_id}/speech?voice= - Poll chunk audio for one voice
    pub async fn get_status(
        State(controller): State<Arc<MaterialController>>,
        Path(material_id): Path<Uuid>,
        Query(query): Query<MaterialStatusQuery>,
    ) -> AppResult<Json<MaterialSpeechResponse>> {
        let response = controller
            .material_service
            .get_status(material_id, &query.voice)
            .await?;
        Ok(Json(response))
    }
}
