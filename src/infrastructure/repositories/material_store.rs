use crate::domain::material::{ChunkClaim, ChunkKey, MaterialChunkAudio, MaterialChunkPlan, PlanOutcome};
use crate::error::AppResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for material chunk plans and per-(material, chunk, voice) audio
#[async_trait]
pub trait MaterialStore: Send + Sync {
    async fn get_plan(&self, material_id: Uuid) -> AppResult<Option<MaterialChunkPlan>>;

    /// Keep the stored plan if its content hash matches `candidate`; otherwise store
    /// `candidate` and delete every audio row of the material, atomically.
    async fn ensure_plan(&self, candidate: MaterialChunkPlan) -> AppResult<PlanOutcome>;

    /// Audio rows for one voice, ordered by chunk index
    async fn list_chunk_audio(
        &self,
        material_id: Uuid,
        voice: &str,
    ) -> AppResult<Vec<MaterialChunkAudio>>;

    /// Insert a pending row or reset a reclaimable one; true when the caller must enqueue
    async fn claim_chunk(&self, claim: &ChunkClaim) -> AppResult<bool>;

    /// Mark a claimed row as being worked on; false when the row is gone, completed, or
    /// belongs to another content version
    async fn mark_chunk_processing(&self, key: &ChunkKey, content_hash: &str) -> AppResult<bool>;

    /// Write-once completion; false when the row is already completed or was superseded
    async fn complete_chunk(
        &self,
        key: &ChunkKey,
        content_hash: &str,
        audio_url: &str,
        storage_key: &str,
    ) -> AppResult<bool>;

    /// Record a failure; never overrides a completed row
    async fn fail_chunk(&self, key: &ChunkKey, content_hash: &str, message: &str)
        -> AppResult<bool>;
}
