use super::material_store::MaterialStore;
use crate::domain::material::{
    ChunkClaim, ChunkKey, MaterialChunkAudio, MaterialChunkPlan, PlanOutcome,
};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub struct PgMaterialStore {
    pool: Arc<DbPool>,
}

impl PgMaterialStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaterialStore for PgMaterialStore {
    async fn get_plan(&self, material_id: Uuid) -> AppResult<Option<MaterialChunkPlan>> {
        let pool = self.pool.as_ref();
        let plan = sqlx::query_as::<_, MaterialChunkPlan>(
            r#"
            SELECT material_id, content_hash, total_chunks, chunk_boundaries, max_chunk_chars,
                   created_at, updated_at
            FROM material_chunk_plans
            WHERE material_id = $1
            "#,
        )
        .bind(material_id)
        .fetch_optional(pool)
        .await?;

        Ok(plan)
    }

    async fn ensure_plan(&self, candidate: MaterialChunkPlan) -> AppResult<PlanOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, MaterialChunkPlan>(
            r#"
            INSERT INTO material_chunk_plans
                (material_id, content_hash, total_chunks, chunk_boundaries, max_chunk_chars,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (material_id) DO NOTHING
            RETURNING material_id, content_hash, total_chunks, chunk_boundaries,
                      max_chunk_chars, created_at, updated_at
            "#,
        )
        .bind(candidate.material_id)
        .bind(&candidate.content_hash)
        .bind(candidate.total_chunks)
        .bind(&candidate.chunk_boundaries)
        .bind(candidate.max_chunk_chars)
        .bind(candidate.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(plan) = inserted {
            tx.commit().await?;
            return Ok(PlanOutcome::Created(plan));
        }

        // Row lock serializes concurrent recomputes of the same material
        let existing = sqlx::query_as::<_, MaterialChunkPlan>(
            r#"
            SELECT material_id, content_hash, total_chunks, chunk_boundaries, max_chunk_chars,
                   created_at, updated_at
            FROM material_chunk_plans
            WHERE material_id = $1
            FOR UPDATE
            "#,
        )
        .bind(candidate.material_id)
        .fetch_one(&mut *tx)
        .await?;

        if existing.content_hash == candidate.content_hash {
            tx.commit().await?;
            return Ok(PlanOutcome::Unchanged(existing));
        }

        let plan = sqlx::query_as::<_, MaterialChunkPlan>(
            r#"
            UPDATE material_chunk_plans
            SET content_hash = $2,
                total_chunks = $3,
                chunk_boundaries = $4,
                max_chunk_chars = $5,
                updated_at = NOW()
            WHERE material_id = $1
            RETURNING material_id, content_hash, total_chunks, chunk_boundaries,
                      max_chunk_chars, created_at, updated_at
            "#,
        )
        .bind(candidate.material_id)
        .bind(&candidate.content_hash)
        .bind(candidate.total_chunks)
        .bind(&candidate.chunk_boundaries)
        .bind(candidate.max_chunk_chars)
        .fetch_one(&mut *tx)
        .await?;

        let invalidated_rows = sqlx::query(
            r#"
            DELETE FROM material_chunk_audio WHERE material_id = $1
            "#,
        )
        .bind(candidate.material_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

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
        let pool = self.pool.as_ref();
        let rows = sqlx::query_as::<_, MaterialChunkAudio>(
            r#"
            SELECT material_id, chunk_index, voice, content_hash, status, audio_url, storage_key,
                   char_start, char_end, error_message, attempts, created_at, updated_at
            FROM material_chunk_audio
            WHERE material_id = $1 AND voice = $2
            ORDER BY chunk_index
            "#,
        )
        .bind(material_id)
        .bind(voice)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn claim_chunk(&self, claim: &ChunkClaim) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        // Only the current plan's content may be claimed; a late request for replaced
        // content inserts and updates nothing. FOR SHARE waits out a concurrent plan swap.
        let claimed = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO material_chunk_audio
                (material_id, chunk_index, voice, content_hash, status, char_start, char_end,
                 attempts, created_at, updated_at)
            SELECT $1, $2, $3, $4, 'pending', $5, $6, 0, NOW(), NOW()
            WHERE EXISTS (
                SELECT 1 FROM material_chunk_plans p
                WHERE p.material_id = $1 AND p.content_hash = $4
                FOR SHARE
            )
            ON CONFLICT (material_id, chunk_index, voice) DO UPDATE
            SET content_hash = EXCLUDED.content_hash,
                status = 'pending',
                audio_url = NULL,
                storage_key = NULL,
                char_start = EXCLUDED.char_start,
                char_end = EXCLUDED.char_end,
                error_message = NULL,
                updated_at = NOW()
            WHERE material_chunk_audio.content_hash <> EXCLUDED.content_hash
               OR material_chunk_audio.status = 'failed'
               OR (material_chunk_audio.status = 'processing'
                   AND material_chunk_audio.updated_at < $7)
               OR (material_chunk_audio.status = 'pending'
                   AND material_chunk_audio.updated_at < $8)
            RETURNING chunk_index
            "#,
        )
        .bind(claim.key.material_id)
        .bind(claim.key.chunk_index)
        .bind(&claim.key.voice)
        .bind(&claim.content_hash)
        .bind(claim.char_start)
        .bind(claim.char_end)
        .bind(claim.processing_stale_before)
        .bind(claim.pending_stale_before)
        .fetch_optional(pool)
        .await?;

        Ok(claimed.is_some())
    }

    async fn mark_chunk_processing(&self, key: &ChunkKey, content_hash: &str) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE material_chunk_audio
            SET status = 'processing', attempts = attempts + 1, updated_at = NOW()
            WHERE material_id = $1 AND chunk_index = $2 AND voice = $3
              AND content_hash = $4
              AND status IN ('pending', 'processing')
            "#,
        )
        .bind(key.material_id)
        .bind(key.chunk_index)
        .bind(&key.voice)
        .bind(content_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_chunk(
        &self,
        key: &ChunkKey,
        content_hash: &str,
        audio_url: &str,
        storage_key: &str,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE material_chunk_audio
            SET status = 'completed',
                audio_url = $5,
                storage_key = $6,
                error_message = NULL,
                updated_at = NOW()
            WHERE material_id = $1 AND chunk_index = $2 AND voice = $3
              AND content_hash = $4
              AND status <> 'completed'
            "#,
        )
        .bind(key.material_id)
        .bind(key.chunk_index)
        .bind(&key.voice)
        .bind(content_hash)
        .bind(audio_url)
        .bind(storage_key)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail_chunk(
        &self,
        key: &ChunkKey,
        content_hash: &str,
        message: &str,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE material_chunk_audio
            SET status = 'failed', error_message = $5, updated_at = NOW()
            WHERE material_id = $1 AND chunk_index = $2 AND voice = $3
              AND content_hash = $4
              AND status <> 'completed'
            "#,
        )
        .bind(key.material_id)
        .bind(key.chunk_index)
        .bind(&key.voice)
        .bind(content_hash)
        .bind(message)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
