pub mod error;
pub mod model;
pub mod service;

pub use error::MaterialServiceError;
pub use model::{
    ChunkClaim, ChunkKey, ChunkStatus, MaterialChunkAudio, MaterialChunkPlan, PlanOutcome,
};
pub use service::{MaterialService, MaterialServiceApi};

use crate::domain::chunking::ChunkBoundary;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for POST /api/materials/{material_id}/speech
#[derive(Debug, Serialize, Deserialize)]
pub struct StartMaterialSpeechRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Chunk the reader is at; generation fans out from here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_chunk: Option<usize>,
}

/// Query for GET /api/materials/{material_id}/speech
#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialStatusQuery {
    pub voice: String,
}

/// Status of one planned chunk; every field is null when the chunk was never requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialChunkStatus {
    pub index: i32,
    pub status: Option<ChunkStatus>,
    pub audio_url: Option<String>,
    pub error_message: Option<String>,
}

/// Response for both material speech endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct MaterialSpeechResponse {
    pub material_id: Uuid,
    pub voice: String,
    pub content_hash: String,
    pub total_chunks: i32,
    pub chunk_boundaries: Vec<ChunkBoundary>,
    pub chunks: Vec<MaterialChunkStatus>,
}
