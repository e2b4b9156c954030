use super::task::{ChunkTarget, ChunkTask, TaskError, TaskOutcome};
use crate::domain::material::ChunkKey;
use crate::domain::speech::JobStatus;
use crate::error::AppError;
use crate::infrastructure::providers::{SpeechProvider, SynthesisRequest};
use crate::infrastructure::repositories::{JobStore, MaterialStore};
use crate::infrastructure::storage::{AudioStorage, StoredObject, UploadOptions};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Runs a single chunk task end to end: claim, synthesize, upload, record.
///
/// Results land in the job or material row through the stores' conditional writes, so a
/// task that lost a race (job already finished, plan replaced, slot filled) is a no-op.
pub struct ChunkExecutor {
    provider: Arc<dyn SpeechProvider>,
    storage: Arc<dyn AudioStorage>,
    job_store: Arc<dyn JobStore>,
    material_store: Arc<dyn MaterialStore>,
}

impl ChunkExecutor {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        storage: Arc<dyn AudioStorage>,
        job_store: Arc<dyn JobStore>,
        material_store: Arc<dyn MaterialStore>,
    ) -> Self {
        Self {
            provider,
            storage,
            job_store,
            material_store,
        }
    }

    pub async fn execute(&self, task: &ChunkTask) -> TaskOutcome {
        match &task.target {
            ChunkTarget::Job { job_id } => self.execute_job_chunk(*job_id, task).await,
            ChunkTarget::Material {
                material_id,
                content_hash,
            } => {
                self.execute_material_chunk(*material_id, content_hash, task)
                    .await
            }
        }
    }

    /// Record a task's final failure on its row
    pub async fn give_up(&self, task: &ChunkTask, error: &TaskError) {
        let result = match &task.target {
            ChunkTarget::Job { job_id } => {
                let status = if error.is_rate_limited() {
                    JobStatus::RateLimited
                } else {
                    JobStatus::Failed
                };
                let message = format!("chunk {} failed: {}", task.chunk_index, error);
                self.job_store
                    .fail_job(*job_id, status, &message)
                    .await
                    .map(|changed| {
                        if changed {
                            tracing::warn!(job_id = %job_id, status = %status, "Generation job failed");
                        }
                    })
            }
            ChunkTarget::Material {
                material_id,
                content_hash,
            } => {
                let message = if error.is_rate_limited() {
                    format!("rate limited: {}", error)
                } else {
                    error.to_string()
                };
                self.material_store
                    .fail_chunk(&chunk_key(*material_id, task), content_hash, &message)
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = result {
            tracing::error!(
                chunk_target = ?task.target,
                chunk_index = task.chunk_index,
                error = %e,
                "Failed to record chunk failure"
            );
        }
    }

    async fn execute_job_chunk(&self, job_id: Uuid, task: &ChunkTask) -> TaskOutcome {
        match self
            .job_store
            .mark_job_processing(job_id)
            .await
            .map_err(store_error)?
        {
            None => {
                tracing::warn!(job_id = %job_id, "Dropping chunk task for unknown job");
                return Ok(());
            }
            Some(status) if status.is_terminal() => {
                tracing::debug!(
                    job_id = %job_id,
                    chunk_index = task.chunk_index,
                    status = %status,
                    "Job already finished, skipping chunk"
                );
                return Ok(());
            }
            Some(_) => {}
        }

        let folder = format!("jobs/{}", job_id);
        let stored = self.synthesize_and_upload(task, &folder).await?;

        match self
            .job_store
            .record_job_chunk(job_id, task.chunk_index, &stored.url)
            .await
            .map_err(store_error)?
        {
            Some(completion) if completion.job_completed => {
                tracing::info!(
                    job_id = %job_id,
                    total_chunks = completion.total_chunks,
                    "Generation job completed"
                );
            }
            Some(completion) => {
                tracing::debug!(
                    job_id = %job_id,
                    chunk_index = task.chunk_index,
                    completed_chunks = completion.completed_chunks,
                    total_chunks = completion.total_chunks,
                    "Chunk recorded"
                );
            }
            None => {
                tracing::debug!(
                    job_id = %job_id,
                    chunk_index = task.chunk_index,
                    "Chunk result ignored, job finished or slot already filled"
                );
            }
        }

        Ok(())
    }

    async fn execute_material_chunk(
        &self,
        material_id: Uuid,
        content_hash: &str,
        task: &ChunkTask,
    ) -> TaskOutcome {
        let key = chunk_key(material_id, task);

        if !self
            .material_store
            .mark_chunk_processing(&key, content_hash)
            .await
            .map_err(store_error)?
        {
            tracing::debug!(
                material_id = %material_id,
                chunk_index = task.chunk_index,
                voice = %task.voice,
                "Material chunk completed or superseded, skipping"
            );
            return Ok(());
        }

        let hash_prefix = &content_hash[..content_hash.len().min(16)];
        let folder = format!("materials/{}/{}/{}", material_id, hash_prefix, task.voice);
        let stored = self.synthesize_and_upload(task, &folder).await?;

        let written = self
            .material_store
            .complete_chunk(&key, content_hash, &stored.url, &stored.key)
            .await
            .map_err(store_error)?;

        if written {
            tracing::debug!(
                material_id = %material_id,
                chunk_index = task.chunk_index,
                voice = %task.voice,
                "Material chunk completed"
            );
        } else {
            tracing::debug!(
                material_id = %material_id,
                chunk_index = task.chunk_index,
                "Material chunk result dropped"
            );
        }

        Ok(())
    }

    async fn synthesize_and_upload(
        &self,
        task: &ChunkTask,
        folder: &str,
    ) -> Result<StoredObject, TaskError> {
        let started = Instant::now();
        let audio = self
            .provider
            .synthesize(&SynthesisRequest {
                text: &task.text,
                voice: &task.voice,
                format: task.format,
            })
            .await?;

        tracing::debug!(
            provider = self.provider.name(),
            chunk_index = task.chunk_index,
            audio_size = audio.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Chunk synthesized"
        );

        let key = format!("chunk_{}", task.chunk_index);
        let stored = self
            .storage
            .upload(
                audio,
                &UploadOptions {
                    folder,
                    key: &key,
                    format: task.format,
                },
            )
            .await?;

        Ok(stored)
    }
}

fn chunk_key(material_id: Uuid, task: &ChunkTask) -> ChunkKey {
    ChunkKey {
        material_id,
        chunk_index: task.chunk_index as i32,
        voice: task.voice.clone(),
    }
}

fn store_error(err: AppError) -> TaskError {
    TaskError::transient(format!("store error: {}", err))
}
