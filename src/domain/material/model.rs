use crate::domain::chunking::ChunkBoundary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkStatus::Pending => write!(f, "pending"),
            ChunkStatus::Processing => write!(f, "processing"),
            ChunkStatus::Completed => write!(f, "completed"),
            ChunkStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Chunk boundaries of one content version of a material, shared by every voice and reader
#[derive(Debug, Clone, FromRow)]
pub struct MaterialChunkPlan {
    pub material_id: Uuid,
    pub content_hash: String,
    pub total_chunks: i32,
    pub chunk_boundaries: Json<Vec<ChunkBoundary>>,
    pub max_chunk_chars: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialChunkPlan {
    pub fn new(
        material_id: Uuid,
        content_hash: String,
        boundaries: Vec<ChunkBoundary>,
        max_chunk_chars: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            material_id,
            content_hash,
            total_chunks: boundaries.len() as i32,
            chunk_boundaries: Json(boundaries),
            max_chunk_chars: max_chunk_chars as i32,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn boundaries(&self) -> &[ChunkBoundary] {
        &self.chunk_boundaries.0
    }
}

/// Outcome of reconciling a material's stored plan with its current content
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Created(MaterialChunkPlan),
    Unchanged(MaterialChunkPlan),
    /// Content changed: the plan was recomputed and this many audio rows were purged
    Replaced {
        plan: MaterialChunkPlan,
        invalidated_rows: u64,
    },
}

impl PlanOutcome {
    pub fn plan(&self) -> &MaterialChunkPlan {
        match self {
            PlanOutcome::Created(plan) | PlanOutcome::Unchanged(plan) => plan,
            PlanOutcome::Replaced { plan, .. } => plan,
        }
    }

    pub fn into_plan(self) -> MaterialChunkPlan {
        match self {
            PlanOutcome::Created(plan) | PlanOutcome::Unchanged(plan) => plan,
            PlanOutcome::Replaced { plan, .. } => plan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub material_id: Uuid,
    pub chunk_index: i32,
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaterialChunkAudio {
    pub material_id: Uuid,
    pub chunk_index: i32,
    pub voice: String,
    /// Plan version this row belongs to
    pub content_hash: String,
    pub status: ChunkStatus,
    pub audio_url: Option<String>,
    pub storage_key: Option<String>,
    pub char_start: i32,
    pub char_end: i32,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to (re)queue one chunk.
///
/// Only valid while `content_hash` is the material's current plan. Then it succeeds when
/// no row exists, the row failed, the row belongs to another content version, or the row
/// sat in pending/processing past its staleness cutoff.
#[derive(Debug, Clone)]
pub struct ChunkClaim {
    pub key: ChunkKey,
    pub content_hash: String,
    pub char_start: i32,
    pub char_end: i32,
    pub processing_stale_before: DateTime<Utc>,
    pub pending_stale_before: DateTime<Utc>,
}

impl ChunkClaim {
    /// Whether an existing row may be reset to pending by this claim
    pub fn can_reclaim(&self, row: &MaterialChunkAudio) -> bool {
        if row.content_hash != self.content_hash {
            return true;
        }
        match row.status {
            ChunkStatus::Failed => true,
            ChunkStatus::Processing => row.updated_at < self.processing_stale_before,
            ChunkStatus::Pending => row.updated_at < self.pending_stale_before,
            ChunkStatus::Completed => false,
        }
    }
}
