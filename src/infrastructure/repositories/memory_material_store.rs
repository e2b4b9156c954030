use super::material_store::MaterialStore;
use crate::domain::material::{
    ChunkClaim, ChunkKey, ChunkStatus, MaterialChunkAudio, MaterialChunkPlan, PlanOutcome,
};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

#[derive(Default)]
struct MaterialState {
    plans: HashMap<Uuid, MaterialChunkPlan>,
    /// Keyed by (material, voice, chunk index) so listing one voice comes out in order
    audio: BTreeMap<(Uuid, String, i32), MaterialChunkAudio>,
}

fn audio_key(key: &ChunkKey) -> (Uuid, String, i32) {
    (key.material_id, key.voice.clone(), key.chunk_index)
}

/// Process-local material store for tests and deployments without a database
#[derive(Default)]
pub struct InMemoryMaterialStore {
    state: Mutex<MaterialState>,
}

impl InMemoryMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MaterialStore for InMemoryMaterialStore {
    async fn get_plan(&self, material_id: Uuid) -> AppResult<Option<MaterialChunkPlan>> {
        Ok(self.state.lock().plans.get(&material_id).cloned())
    }

    async fn ensure_plan(&self, candidate: MaterialChunkPlan) -> AppResult<PlanOutcome> {
        let mut state = self.state.lock();
        let material_id = candidate.material_id;

        let Some(existing) = state.plans.get(&material_id) else {
            state.plans.insert(material_id, candidate.clone());
            return Ok(PlanOutcome::Created(candidate));
        };

        if existing.content_hash == candidate.content_hash {
            return Ok(PlanOutcome::Unchanged(existing.clone()));
        }

        let mut plan = candidate;
        plan.created_at = existing.created_at;

        let before = state.audio.len();
        state.audio.retain(|(id, _, _), _| *id != material_id);
        let invalidated_rows = (before - state.audio.len()) as u64;
        state.plans.insert(material_id, plan.clone());

        Ok(PlanOutcome::Replaced {
            plan,
            invalidated_rows,
        })
    }

    async fn list_chunk_audio(
        &self,
        material_id: Uuid,
        voice: &str,
    ) -> AppResult<Vec<MaterialChunkAudio>> {
        let state = self.state.lock();
        Ok(state
            .audio
            .range((material_id, voice.to_string(), i32::MIN)..=(material_id, voice.to_string(), i32::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn claim_chunk(&self, claim: &ChunkClaim) -> AppResult<bool> {
        let mut state = self.state.lock();
        let now = Utc::now();

        // Claims for superseded content must not overwrite rows of the current plan
        let current = state
            .plans
            .get(&claim.key.material_id)
            .is_some_and(|plan| plan.content_hash == claim.content_hash);
        if !current {
            return Ok(false);
        }

        match state.audio.get_mut(&audio_key(&claim.key)) {
            Some(row) if !claim.can_reclaim(row) => Ok(false),
            Some(row) => {
                row.content_hash = claim.content_hash.clone();
                row.status = ChunkStatus::Pending;
                row.audio_url = None;
                row.storage_key = None;
                row.char_start = claim.char_start;
                row.char_end = claim.char_end;
                row.error_message = None;
                row.updated_at = now;
                Ok(true)
            }
            None => {
                state.audio.insert(
                    audio_key(&claim.key),
                    MaterialChunkAudio {
                        material_id: claim.key.material_id,
                        chunk_index: claim.key.chunk_index,
                        voice: claim.key.voice.clone(),
                        content_hash: claim.content_hash.clone(),
                        status: ChunkStatus::Pending,
                        audio_url: None,
                        storage_key: None,
                        char_start: claim.char_start,
                        char_end: claim.char_end,
                        error_message: None,
                        attempts: 0,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn mark_chunk_processing(&self, key: &ChunkKey, content_hash: &str) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.audio.get_mut(&audio_key(key)) {
            Some(row)
                if row.content_hash == content_hash
                    && matches!(row.status, ChunkStatus::Pending | ChunkStatus::Processing) =>
            {
                row.status = ChunkStatus::Processing;
                row.attempts += 1;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_chunk(
        &self,
        key: &ChunkKey,
        content_hash: &str,
        audio_url: &str,
        storage_key: &str,
    ) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.audio.get_mut(&audio_key(key)) {
            Some(row) if row.content_hash == content_hash && row.status != ChunkStatus::Completed => {
                row.status = ChunkStatus::Completed;
                row.audio_url = Some(audio_url.to_string());
                row.storage_key = Some(storage_key.to_string());
                row.error_message = None;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_chunk(
        &self,
        key: &ChunkKey,
        content_hash: &str,
        message: &str,
    ) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.audio.get_mut(&audio_key(key)) {
            Some(row) if row.content_hash == content_hash && row.status != ChunkStatus::Completed => {
                row.status = ChunkStatus::Failed;
                row.error_message = Some(message.to_string());
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
