use crate::domain::speech::{ChunkCompletion, GenerationJob, JobStatus, WholeTextCacheEntry};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of asking the store to start a job for `(text_hash, voice)`
#[derive(Debug, Clone)]
pub enum JobAdmission {
    /// The candidate job was persisted; its chunks must be enqueued
    Created(GenerationJob),
    /// Another request got there first; this job is in flight or already finished
    Existing(GenerationJob),
}

impl JobAdmission {
    pub fn job(&self) -> &GenerationJob {
        match self {
            JobAdmission::Created(job) | JobAdmission::Existing(job) => job,
        }
    }
}

/// Persistence for generation jobs and the whole-text audio cache.
///
/// Every mutating method is a single atomic conditional update; callers never
/// read-modify-write job rows themselves.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Most recently created job for the key, whatever its status
    async fn find_latest_job(&self, text_hash: &str, voice: &str)
        -> AppResult<Option<GenerationJob>>;

    /// Persist `candidate` unless a job for the same key is in flight.
    ///
    /// In-flight jobs whose `updated_at` is older than `stale_before` are failed first so a
    /// crashed worker cannot block the key forever.
    async fn create_or_join_job(
        &self,
        candidate: GenerationJob,
        stale_before: DateTime<Utc>,
    ) -> AppResult<JobAdmission>;

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<GenerationJob>>;

    /// Move `pending` to `processing`; returns the resulting status, `None` for unknown jobs
    async fn mark_job_processing(&self, job_id: Uuid) -> AppResult<Option<JobStatus>>;

    /// Write `chunk_urls[chunk_index]`, increment the counter, and complete the job when the
    /// counter reaches the total, all in one step.
    ///
    /// Returns `None` (and changes nothing) when the job is unknown or terminal, the index
    /// is out of range, or the slot is already filled.
    async fn record_job_chunk(
        &self,
        job_id: Uuid,
        chunk_index: usize,
        audio_url: &str,
    ) -> AppResult<Option<ChunkCompletion>>;

    /// Move an in-flight job to `failed` or `rate_limited`; false if it was already terminal
    async fn fail_job(&self, job_id: Uuid, status: JobStatus, message: &str) -> AppResult<bool>;

    /// Cache lookup that also bumps `access_count` and `last_accessed_at` on hit
    async fn find_cached_audio(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<WholeTextCacheEntry>>;

    /// Insert or replace the entry for `(text_hash, voice)`
    async fn save_cached_audio(&self, entry: &WholeTextCacheEntry) -> AppResult<()>;
}
