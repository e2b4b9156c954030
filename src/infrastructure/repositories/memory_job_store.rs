use super::job_store::{JobAdmission, JobStore};
use crate::domain::speech::{ChunkCompletion, GenerationJob, JobStatus, WholeTextCacheEntry};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

type JobKey = (String, String);

#[derive(Default)]
struct JobState {
    jobs: HashMap<Uuid, GenerationJob>,
    /// Job ids per key in creation order
    history: HashMap<JobKey, Vec<Uuid>>,
    cache: HashMap<JobKey, WholeTextCacheEntry>,
}

impl JobState {
    fn in_flight_job(&self, key: &JobKey) -> Option<&GenerationJob> {
        self.history
            .get(key)?
            .iter()
            .rev()
            .filter_map(|id| self.jobs.get(id))
            .find(|job| job.status.is_in_flight())
    }
}

/// Process-local job store for tests and deployments without a database.
///
/// A single mutex guards all state, so each trait method is one critical section.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: Mutex<JobState>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(text_hash: &str, voice: &str) -> JobKey {
    (text_hash.to_string(), voice.to_string())
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_latest_job(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<GenerationJob>> {
        let state = self.state.lock();
        Ok(state
            .history
            .get(&key(text_hash, voice))
            .and_then(|ids| ids.last())
            .and_then(|id| state.jobs.get(id))
            .cloned())
    }

    async fn create_or_join_job(
        &self,
        candidate: GenerationJob,
        stale_before: DateTime<Utc>,
    ) -> AppResult<JobAdmission> {
        let mut state = self.state.lock();
        let job_key = key(&candidate.text_hash, &candidate.voice);
        let now = Utc::now();

        let stalled: Vec<Uuid> = state
            .history
            .get(&job_key)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        state.jobs.get(id).is_some_and(|job| {
                            job.status.is_in_flight() && job.updated_at < stale_before
                        })
                    })
                    .copied()
                    .collect()
            })
            .unwrap_or_default();

        for id in stalled {
            if let Some(job) = state.jobs.get_mut(&id) {
                job.status = JobStatus::Failed;
                job.error_message = Some("Generation stalled; superseded by a new job".to_string());
                job.updated_at = now;
            }
        }

        if let Some(existing) = state.in_flight_job(&job_key) {
            return Ok(JobAdmission::Existing(existing.clone()));
        }

        state
            .history
            .entry(job_key)
            .or_default()
            .push(candidate.id);
        state.jobs.insert(candidate.id, candidate.clone());

        Ok(JobAdmission::Created(candidate))
    }

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<GenerationJob>> {
        Ok(self.state.lock().jobs.get(&job_id).cloned())
    }

    async fn mark_job_processing(&self, job_id: Uuid) -> AppResult<Option<JobStatus>> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if job.status == JobStatus::Pending {
            job.status = JobStatus::Processing;
            job.updated_at = Utc::now();
        }
        Ok(Some(job.status))
    }

    async fn record_job_chunk(
        &self,
        job_id: Uuid,
        chunk_index: usize,
        audio_url: &str,
    ) -> AppResult<Option<ChunkCompletion>> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if !job.status.is_in_flight() {
            return Ok(None);
        }
        match job.chunk_urls.get(chunk_index) {
            Some(None) => {}
            _ => return Ok(None),
        }

        job.chunk_urls[chunk_index] = Some(audio_url.to_string());
        job.completed_chunks += 1;
        job.status = if job.completed_chunks == job.total_chunks {
            JobStatus::Completed
        } else {
            JobStatus::Processing
        };
        job.updated_at = Utc::now();

        Ok(Some(ChunkCompletion {
            completed_chunks: job.completed_chunks,
            total_chunks: job.total_chunks,
            status: job.status,
            job_completed: job.status == JobStatus::Completed,
        }))
    }

    async fn fail_job(&self, job_id: Uuid, status: JobStatus, message: &str) -> AppResult<bool> {
        let mut state = self.state.lock();
        match state.jobs.get_mut(&job_id) {
            Some(job) if job.status.is_in_flight() => {
                job.status = status;
                job.error_message = Some(message.to_string());
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_cached_audio(
        &self,
        text_hash: &str,
        voice: &str,
    ) -> AppResult<Option<WholeTextCacheEntry>> {
        let mut state = self.state.lock();
        Ok(state.cache.get_mut(&key(text_hash, voice)).map(|entry| {
            entry.access_count += 1;
            entry.last_accessed_at = Utc::now();
            entry.clone()
        }))
    }

    async fn save_cached_audio(&self, entry: &WholeTextCacheEntry) -> AppResult<()> {
        self.state
            .lock()
            .cache
            .insert(key(&entry.text_hash, &entry.voice), entry.clone());
        Ok(())
    }
}
