use super::error::SpeechServiceError;
use super::model::{AudioFormat, GenerationJob, JobStatus, WholeTextCacheEntry};
use super::text::{clean_text, content_hash};
use super::voice::VoiceResolver;
use super::{
    JobStatusResponse, StartJobRequest, StartJobResponse, SynthesizeRequest, SynthesizeResponse,
};
use crate::domain::chunking::{chunk_texts, split_into_chunks};
use crate::domain::generation::{
    stale_cutoff, ChunkTarget, ChunkTask, GenerationSettings, Priority, TaskQueue,
};
use crate::infrastructure::providers::{SpeechProvider, SynthesisRequest};
use crate::infrastructure::repositories::{JobAdmission, JobStore};
use crate::infrastructure::storage::{AudioStorage, UploadOptions};
use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Text that passed validation, with everything that identifies its audio
struct PreparedText {
    text: String,
    text_hash: String,
    voice: String,
    format: AudioFormat,
}

pub struct SpeechService {
    job_store: Arc<dyn JobStore>,
    provider: Arc<dyn SpeechProvider>,
    storage: Arc<dyn AudioStorage>,
    queue: Arc<TaskQueue>,
    voices: Arc<VoiceResolver>,
    settings: GenerationSettings,
    completed_jobs: Option<Cache<Uuid, GenerationJob>>,
}

impl SpeechService {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        provider: Arc<dyn SpeechProvider>,
        storage: Arc<dyn AudioStorage>,
        queue: Arc<TaskQueue>,
        voices: Arc<VoiceResolver>,
        settings: GenerationSettings,
    ) -> Self {
        // Completed jobs never change, so pollers can be served from memory
        let completed_jobs = if settings.job_cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(10_000)
                    .time_to_idle(Duration::from_secs(30 * 60))
                    .build(),
            )
        } else {
            None
        };

        Self {
            job_store,
            provider,
            storage,
            queue,
            voices,
            settings,
            completed_jobs,
        }
    }
}

#[async_trait]
pub trait SpeechServiceApi: Send + Sync {
    /// Synthesize a short text in one provider request.
    ///
    /// Served from the whole-text cache when the same text was already synthesized with the
    /// same voice; the provider is not called in that case.
    async fn synthesize_once(
        &self,
        request: SynthesizeRequest,
    ) -> Result<SynthesizeResponse, SpeechServiceError>;

    /// Start (or join) chunked generation of a long text.
    ///
    /// This operation:
    /// - Returns a completed job for the same text and voice as a cache hit
    /// - Joins the in-flight job for the same text and voice if there is one
    /// - Otherwise creates a job and enqueues one task per chunk
    ///
    /// Never waits on the provider.
    async fn start_job(
        &self,
        request: StartJobRequest,
    ) -> Result<StartJobResponse, SpeechServiceError>;

    async fn get_job_status(&self, job_id: Uuid) -> Result<JobStatusResponse, SpeechServiceError>;
}

#[async_trait]
impl SpeechServiceApi for SpeechService {
    async fn synthesize_once(
        &self,
        request: SynthesizeRequest,
    ) -> Result<SynthesizeResponse, SpeechServiceError> {
        let prepared = self.prepare(
            &request.text,
            request.voice.as_deref(),
            request.format.as_deref(),
            self.settings.max_one_shot_chars,
        )?;

        if let Some(entry) = self
            .job_store
            .find_cached_audio(&prepared.text_hash, &prepared.voice)
            .await
            .map_err(|e| SpeechServiceError::Dependency(e.to_string()))?
        {
            tracing::info!(
                text_hash = %entry.text_hash,
                voice = %entry.voice,
                access_count = entry.access_count,
                "Speech cache hit"
            );
            return Ok(SynthesizeResponse {
                audio_url: entry.audio_url,
                cached: true,
                text_hash: entry.text_hash,
                voice: entry.voice,
                format: entry.format,
            });
        }

        let started = Instant::now();
        let audio = self
            .provider
            .synthesize(&SynthesisRequest {
                text: &prepared.text,
                voice: &prepared.voice,
                format: prepared.format,
            })
            .await?;

        tracing::info!(
            provider = self.provider.name(),
            text_hash = %prepared.text_hash,
            voice = %prepared.voice,
            audio_size = audio.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "One-shot speech synthesized"
        );

        let folder = format!("speech/{}", prepared.text_hash);
        let stored = self
            .storage
            .upload(
                audio,
                &UploadOptions {
                    folder: &folder,
                    key: &prepared.voice,
                    format: prepared.format,
                },
            )
            .await?;

        let now = Utc::now();
        self.job_store
            .save_cached_audio(&WholeTextCacheEntry {
                text_hash: prepared.text_hash.clone(),
                voice: prepared.voice.clone(),
                audio_url: stored.url.clone(),
                storage_key: stored.key,
                format: prepared.format,
                access_count: 0,
                last_accessed_at: now,
                created_at: now,
            })
            .await
            .map_err(|e| SpeechServiceError::Dependency(e.to_string()))?;

        Ok(SynthesizeResponse {
            audio_url: stored.url,
            cached: false,
            text_hash: prepared.text_hash,
            voice: prepared.voice,
            format: prepared.format,
        })
    }

    async fn start_job(
        &self,
        request: StartJobRequest,
    ) -> Result<StartJobResponse, SpeechServiceError> {
        let prepared = self.prepare(
            &request.text,
            request.voice.as_deref(),
            request.format.as_deref(),
            self.settings.max_text_chars,
        )?;

        tracing::info!(
            text_hash = %prepared.text_hash,
            voice = %prepared.voice,
            text_length = prepared.text.chars().count(),
            requested_by = ?request.requested_by,
            "Speech job request"
        );

        if let Some(job) = self
            .job_store
            .find_latest_job(&prepared.text_hash, &prepared.voice)
            .await
            .map_err(|e| SpeechServiceError::Dependency(e.to_string()))?
        {
            if job.status == JobStatus::Completed {
                tracing::info!(job_id = %job.id, "Speech job cache hit");
                self.remember_completed(&job).await;
                return Ok(StartJobResponse {
                    job: job.into(),
                    cached: true,
                });
            }
        }

        let boundaries = split_into_chunks(&prepared.text, self.settings.chunker);
        let texts = chunk_texts(&prepared.text, &boundaries);

        let candidate = GenerationJob::new(
            prepared.text_hash.clone(),
            prepared.voice.clone(),
            prepared.format,
            texts.len(),
            request.requested_by,
        );
        let stale_before = stale_cutoff(Utc::now(), self.settings.job_stale_after);

        let admission = self
            .job_store
            .create_or_join_job(candidate, stale_before)
            .await
            .map_err(|e| SpeechServiceError::Dependency(e.to_string()))?;

        match admission {
            JobAdmission::Created(job) => {
                for (index, text) in texts.into_iter().enumerate() {
                    self.queue.push(ChunkTask {
                        target: ChunkTarget::Job { job_id: job.id },
                        chunk_index: index,
                        text,
                        voice: job.voice.clone(),
                        format: job.format,
                        priority: Priority::Foreground(index as u32),
                        attempt: 1,
                    });
                }

                tracing::info!(
                    job_id = %job.id,
                    total_chunks = job.total_chunks,
                    "Speech job created"
                );

                Ok(StartJobResponse {
                    job: job.into(),
                    cached: false,
                })
            }
            JobAdmission::Existing(job) => {
                let cached = job.status == JobStatus::Completed;
                if cached {
                    self.remember_completed(&job).await;
                }
                tracing::info!(job_id = %job.id, status = %job.status, "Joined existing speech job");

                Ok(StartJobResponse {
                    job: job.into(),
                    cached,
                })
            }
        }
    }

    async fn get_job_status(&self, job_id: Uuid) -> Result<JobStatusResponse, SpeechServiceError> {
        if let Some(cache) = &self.completed_jobs {
            if let Some(job) = cache.get(&job_id).await {
                return Ok(job.into());
            }
        }

        let job = self
            .job_store
            .get_job(job_id)
            .await
            .map_err(|e| SpeechServiceError::Dependency(e.to_string()))?
            .ok_or(SpeechServiceError::NotFound)?;

        if job.status == JobStatus::Completed {
            self.remember_completed(&job).await;
        }

        Ok(job.into())
    }
}

impl SpeechService {
    fn prepare(
        &self,
        text: &str,
        voice: Option<&str>,
        format: Option<&str>,
        max_chars: usize,
    ) -> Result<PreparedText, SpeechServiceError> {
        if !self.provider.is_configured() {
            return Err(SpeechServiceError::NotConfigured(format!(
                "{} credentials are missing",
                self.provider.name()
            )));
        }

        let text = clean_text(text);
        if text.is_empty() {
            return Err(SpeechServiceError::Invalid(
                "Text must not be empty".to_string(),
            ));
        }

        let char_count = text.chars().count();
        if char_count > max_chars {
            return Err(SpeechServiceError::TooLarge(format!(
                "{} characters exceeds the limit of {}",
                char_count, max_chars
            )));
        }

        let format = match format {
            Some(format) => format
                .parse::<AudioFormat>()
                .map_err(SpeechServiceError::Invalid)?,
            None => self.settings.default_format,
        };

        let voice = self
            .voices
            .resolve(voice, &text, |language| self.provider.default_voice(language));

        Ok(PreparedText {
            text_hash: content_hash(&text),
            text,
            voice,
            format,
        })
    }

    async fn remember_completed(&self, job: &GenerationJob) {
        if let Some(cache) = &self.completed_jobs {
            cache.insert(job.id, job.clone()).await;
        }
    }
}
