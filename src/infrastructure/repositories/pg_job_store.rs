use super::job_store::{JobAdmission, JobStore};
use crate::domain::speech::{ChunkCompletion, GenerationJob, JobStatus, WholeTextCacheEntry};
use crate::error::{AppError, AppResult};
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct PgJobStore {
    pool: Arc<DbPool>,
}

impl PgJobStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn find_in_flight_job(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<GenerationJob>> {
        let pool = self.pool.as_ref();
        let job = sqlx::query_as::<_, GenerationJob>(
            r#"
            SELECT id, text_hash, voice, format, status, total_chunks, completed_chunks,
                   chunk_urls, error_message, requested_by, created_at, updated_at
            FROM generation_jobs
            WHERE text_hash = $1 AND voice = $2 AND status IN ('pending', 'processing')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(text_hash)
        .bind(voice)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_latest_job(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<GenerationJob>> {
        let pool = self.pool.as_ref();
        let job = sqlx::query_as::<_, GenerationJob>(
            r#"
            SELECT id, text_hash, voice, format, status, total_chunks, completed_chunks,
                   chunk_urls, error_message, requested_by, created_at, updated_at
            FROM generation_jobs
            WHERE text_hash = $1 AND voice = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(text_hash)
        .bind(voice)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }

    async fn create_or_join_job(
        &self,
        candidate: GenerationJob,
        stale_before: DateTime<Utc>,
    ) -> AppResult<JobAdmission> {
        let pool = self.pool.as_ref();

        let stalled = sqlx::query(
            r#"
            UPDATE generation_jobs
            SET status = 'failed',
                error_message = 'Generation stalled; superseded by a new job',
                updated_at = NOW()
            WHERE text_hash = $1
              AND voice = $2
              AND status IN ('pending', 'processing')
              AND updated_at < $3
            "#,
        )
        .bind(&candidate.text_hash)
        .bind(&candidate.voice)
        .bind(stale_before)
        .execute(pool)
        .await?
        .rows_affected();

        if stalled > 0 {
            tracing::warn!(
                text_hash = %candidate.text_hash,
                voice = %candidate.voice,
                stalled,
                "Failed stalled generation jobs"
            );
        }

        // The partial unique index on in-flight jobs turns a concurrent duplicate into a no-op
        let inserted = sqlx::query_as::<_, GenerationJob>(
            r#"
            INSERT INTO generation_jobs
                (id, text_hash, voice, format, status, total_chunks, completed_chunks,
                 chunk_urls, error_message, requested_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, 0,
                    array_fill(NULL::text, ARRAY[$5]), NULL, $6, $7, $7)
            ON CONFLICT (text_hash, voice) WHERE status IN ('pending', 'processing')
            DO NOTHING
            RETURNING id, text_hash, voice, format, status, total_chunks, completed_chunks,
                      chunk_urls, error_message, requested_by, created_at, updated_at
            "#,
        )
        .bind(candidate.id)
        .bind(&candidate.text_hash)
        .bind(&candidate.voice)
        .bind(candidate.format)
        .bind(candidate.total_chunks)
        .bind(&candidate.requested_by)
        .bind(candidate.created_at)
        .fetch_optional(pool)
        .await?;

        if let Some(job) = inserted {
            return Ok(JobAdmission::Created(job));
        }

        if let Some(job) = self
            .find_in_flight_job(&candidate.text_hash, &candidate.voice)
            .await?
        {
            return Ok(JobAdmission::Existing(job));
        }

        // The conflicting job finished between the insert and the lookup
        match self
            .find_latest_job(&candidate.text_hash, &candidate.voice)
            .await?
        {
            Some(job) => Ok(JobAdmission::Existing(job)),
            None => Err(AppError::Internal(
                "generation job vanished during admission".to_string(),
            )),
        }
    }

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<GenerationJob>> {
        let pool = self.pool.as_ref();
        let job = sqlx::query_as::<_, GenerationJob>(
            r#"
            SELECT id, text_hash, voice, format, status, total_chunks, completed_chunks,
                   chunk_urls, error_message, requested_by, created_at, updated_at
            FROM generation_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        Ok(job)
    }

    async fn mark_job_processing(&self, job_id: Uuid) -> AppResult<Option<JobStatus>> {
        let pool = self.pool.as_ref();
        let updated = sqlx::query_scalar::<_, JobStatus>(
            r#"
            UPDATE generation_jobs
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING status
            "#,
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        if updated.is_some() {
            return Ok(updated);
        }

        let current = sqlx::query_scalar::<_, JobStatus>(
            r#"
            SELECT status FROM generation_jobs WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        Ok(current)
    }

    async fn record_job_chunk(
        &self,
        job_id: Uuid,
        chunk_index: usize,
        audio_url: &str,
    ) -> AppResult<Option<ChunkCompletion>> {
        let pool = self.pool.as_ref();
        // Postgres arrays are 1-based
        let slot = chunk_index as i32 + 1;

        let row = sqlx::query_as::<_, (i32, i32, JobStatus)>(
            r#"
            UPDATE generation_jobs
            SET chunk_urls[$2] = $3,
                completed_chunks = completed_chunks + 1,
                status = CASE
                    WHEN completed_chunks + 1 = total_chunks THEN 'completed'
                    ELSE 'processing'
                END,
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('pending', 'processing')
              AND $2 BETWEEN 1 AND total_chunks
              AND chunk_urls[$2] IS NULL
            RETURNING completed_chunks, total_chunks, status
            "#,
        )
        .bind(job_id)
        .bind(slot)
        .bind(audio_url)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(completed_chunks, total_chunks, status)| ChunkCompletion {
            completed_chunks,
            total_chunks,
            status,
            job_completed: status == JobStatus::Completed,
        }))
    }

    async fn fail_job(&self, job_id: Uuid, status: JobStatus, message: &str) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs
            SET status = $2, error_message = $3, updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(job_id)
        .bind(status)
        .bind(message)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_cached_audio(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<WholeTextCacheEntry>> {
        let pool = self.pool.as_ref();
        let entry = sqlx::query_as::<_, WholeTextCacheEntry>(
            r#"
            UPDATE speech_cache
            SET access_count = access_count + 1, last_accessed_at = NOW()
            WHERE text_hash = $1 AND voice = $2
            RETURNING text_hash, voice, audio_url, storage_key, format, access_count,
                      last_accessed_at, created_at
            "#,
        )
        .bind(text_hash)
        .bind(voice)
        .fetch_optional(pool)
        .await?;

        Ok(entry)
    }

    async fn save_cached_audio(&self, entry: &WholeTextCacheEntry) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            INSERT INTO speech_cache
                (text_hash, voice, audio_url, storage_key, format, access_count,
                 last_accessed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (text_hash, voice) DO UPDATE
            SET audio_url = EXCLUDED.audio_url,
                storage_key = EXCLUDED.storage_key,
                format = EXCLUDED.format,
                last_accessed_at = EXCLUDED.last_accessed_at
            "#,
        )
        .bind(&entry.text_hash)
        .bind(&entry.voice)
        .bind(&entry.audio_url)
        .bind(&entry.storage_key)
        .bind(entry.format)
        .bind(entry.access_count)
        .bind(entry.last_accessed_at)
        .bind(entry.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}
