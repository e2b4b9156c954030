use super::error::MaterialServiceError;
use super::model::{ChunkClaim, ChunkKey, MaterialChunkAudio, MaterialChunkPlan, PlanOutcome};
use super::{MaterialChunkStatus, MaterialSpeechResponse, StartMaterialSpeechRequest};
use crate::domain::chunking::{chunk_texts, split_into_chunks};
use crate::domain::generation::{
    stale_cutoff, ChunkTarget, ChunkTask, GenerationSettings, Priority, TaskQueue,
};
use crate::domain::speech::{content_hash, AudioFormat, VoiceResolver, AUTO_VOICE};
use crate::infrastructure::providers::SpeechProvider;
use crate::infrastructure::repositories::MaterialStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub struct MaterialService {
    material_store: Arc<dyn MaterialStore>,
    provider: Arc<dyn SpeechProvider>,
    queue: Arc<TaskQueue>,
    voices: Arc<VoiceResolver>,
    settings: GenerationSettings,
}

impl MaterialService {
    pub fn new(
        material_store: Arc<dyn MaterialStore>,
        provider: Arc<dyn SpeechProvider>,
        queue: Arc<TaskQueue>,
        voices: Arc<VoiceResolver>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            material_store,
            provider,
            queue,
            voices,
            settings,
        }
    }
}

#[async_trait]
pub trait MaterialServiceApi: Send + Sync {
    /// Plan a material's chunks and queue audio for every chunk that still needs it.
    ///
    /// This operation:
    /// - Recomputes the plan, dropping all stored audio, only if the content changed
    /// - Claims each chunk that is missing, failed, or stale
    /// - Queues claimed chunks starting at `start_chunk`, then the ones before it
    ///
    /// Returns the plan and the per-chunk statuses right after queueing.
    async fn start_generation(
        &self,
        material_id: Uuid,
        request: StartMaterialSpeechRequest,
    ) -> Result<MaterialSpeechResponse, MaterialServiceError>;

    /// Current plan and per-chunk statuses for one voice
    async fn get_status(
        &self,
        material_id: Uuid,
        voice: &str,
    ) -> Result<MaterialSpeechResponse, MaterialServiceError>;
}

#[async_trait]
impl MaterialServiceApi for MaterialService {
    async fn start_generation(
        &self,
        material_id: Uuid,
        request: StartMaterialSpeechRequest,
    ) -> Result<MaterialSpeechResponse, MaterialServiceError> {
        if !self.provider.is_configured() {
            return Err(MaterialServiceError::NotConfigured(format!(
                "{} credentials are missing",
                self.provider.name()
            )));
        }

        let content = request.content;
        if content.trim().is_empty() {
            return Err(MaterialServiceError::Invalid(
                "Content must not be empty".to_string(),
            ));
        }

        let char_count = content.chars().count();
        if char_count > self.settings.max_text_chars {
            return Err(MaterialServiceError::TooLarge(format!(
                "{} characters exceeds the limit of {}",
                char_count, self.settings.max_text_chars
            )));
        }

        let format = match request.format.as_deref() {
            Some(format) => format
                .parse::<AudioFormat>()
                .map_err(MaterialServiceError::Invalid)?,
            None => self.settings.default_format,
        };

        let voice = self
            .voices
            .resolve(request.voice.as_deref(), &content, |language| {
                self.provider.default_voice(language)
            });

        let candidate = MaterialChunkPlan::new(
            material_id,
            content_hash(&content),
            split_into_chunks(&content, self.settings.chunker),
            self.settings.chunker.max_chunk_chars,
        );

        // Rejected before the store so a bad request never replaces the plan
        let start_chunk = request.start_chunk.unwrap_or(0);
        if start_chunk >= candidate.total_chunks as usize {
            return Err(MaterialServiceError::Invalid(format!(
                "start_chunk {} is out of range for {} chunks",
                start_chunk, candidate.total_chunks
            )));
        }

        let outcome = self
            .material_store
            .ensure_plan(candidate)
            .await
            .map_err(|e| MaterialServiceError::Dependency(e.to_string()))?;

        match &outcome {
            PlanOutcome::Created(plan) => tracing::info!(
                material_id = %material_id,
                total_chunks = plan.total_chunks,
                "Material chunk plan created"
            ),
            PlanOutcome::Replaced {
                plan,
                invalidated_rows,
            } => tracing::info!(
                material_id = %material_id,
                total_chunks = plan.total_chunks,
                invalidated_rows,
                "Material content changed, chunk plan recomputed"
            ),
            PlanOutcome::Unchanged(_) => {}
        }

        let plan = outcome.into_plan();

        let enqueued = self
            .claim_and_enqueue(&plan, &content, &voice, format, start_chunk)
            .await?;

        tracing::info!(
            material_id = %material_id,
            voice = %voice,
            start_chunk,
            enqueued,
            total_chunks = plan.total_chunks,
            "Material speech requested"
        );

        self.build_response(plan, voice).await
    }

    async fn get_status(
        &self,
        material_id: Uuid,
        voice: &str,
    ) -> Result<MaterialSpeechResponse, MaterialServiceError> {
        let voice = voice.trim();
        if voice.is_empty() || voice.eq_ignore_ascii_case(AUTO_VOICE) {
            return Err(MaterialServiceError::Invalid(
                "A concrete voice is required to query chunk status".to_string(),
            ));
        }

        let plan = self
            .material_store
            .get_plan(material_id)
            .await
            .map_err(|e| MaterialServiceError::Dependency(e.to_string()))?
            .ok_or(MaterialServiceError::NotFound)?;

        self.build_response(plan, voice.to_string()).await
    }
}

impl MaterialService {
    /// Claim every chunk of the plan and queue the ones this call won; returns how many
    async fn claim_and_enqueue(
        &self,
        plan: &MaterialChunkPlan,
        content: &str,
        voice: &str,
        format: AudioFormat,
        start_chunk: usize,
    ) -> Result<usize, MaterialServiceError> {
        let boundaries = plan.boundaries();
        let texts = chunk_texts(content, boundaries);
        let now = Utc::now();
        let processing_stale_before = stale_cutoff(now, self.settings.chunk_stale_after);
        let pending_stale_before = stale_cutoff(now, self.settings.pending_stale_after);

        let mut enqueued = 0;
        for (index, (boundary, text)) in boundaries.iter().zip(texts).enumerate() {
            let claim = ChunkClaim {
                key: ChunkKey {
                    material_id: plan.material_id,
                    chunk_index: index as i32,
                    voice: voice.to_string(),
                },
                content_hash: plan.content_hash.clone(),
                char_start: boundary.start as i32,
                char_end: boundary.end as i32,
                processing_stale_before,
                pending_stale_before,
            };

            let claimed = self
                .material_store
                .claim_chunk(&claim)
                .await
                .map_err(|e| MaterialServiceError::Dependency(e.to_string()))?;
            if !claimed {
                continue;
            }

            self.queue.push(ChunkTask {
                target: ChunkTarget::Material {
                    material_id: plan.material_id,
                    content_hash: plan.content_hash.clone(),
                },
                chunk_index: index,
                text,
                voice: voice.to_string(),
                format,
                priority: Priority::for_reading_position(index, start_chunk),
                attempt: 1,
            });
            enqueued += 1;
        }

        Ok(enqueued)
    }

    async fn build_response(
        &self,
        plan: MaterialChunkPlan,
        voice: String,
    ) -> Result<MaterialSpeechResponse, MaterialServiceError> {
        let rows = self
            .material_store
            .list_chunk_audio(plan.material_id, &voice)
            .await
            .map_err(|e| MaterialServiceError::Dependency(e.to_string()))?;

        let chunks = chunk_statuses(&plan, rows);

        Ok(MaterialSpeechResponse {
            material_id: plan.material_id,
            voice,
            content_hash: plan.content_hash,
            total_chunks: plan.total_chunks,
            chunk_boundaries: plan.chunk_boundaries.0,
            chunks,
        })
    }
}

/// One entry per planned chunk; rows from another content version are ignored
fn chunk_statuses(
    plan: &MaterialChunkPlan,
    rows: Vec<MaterialChunkAudio>,
) -> Vec<MaterialChunkStatus> {
    let mut by_index: HashMap<i32, MaterialChunkAudio> = rows
        .into_iter()
        .filter(|row| row.content_hash == plan.content_hash)
        .map(|row| (row.chunk_index, row))
        .collect();

    (0..plan.total_chunks)
        .map(|index| match by_index.remove(&index) {
            Some(row) => MaterialChunkStatus {
                index,
                status: Some(row.status),
                audio_url: row.audio_url,
                error_message: row.error_message,
            },
            None => MaterialChunkStatus {
                index,
                status: None,
                audio_url: None,
                error_message: None,
            },
        })
        .collect()
}
