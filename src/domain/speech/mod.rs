pub mod error;
pub mod model;
pub mod service;
pub mod text;
pub mod voice;

pub use error::SpeechServiceError;
pub use model::{
    AudioFormat, ChunkCompletion, ChunkUrl, GenerationJob, JobStatus, WholeTextCacheEntry,
};
pub use service::{SpeechService, SpeechServiceApi};
pub use text::{clean_text, content_hash};
pub use voice::{LanguageCode, VoiceResolver, AUTO_VOICE};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request for POST /api/speech
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Response for POST /api/speech
#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub audio_url: String,
    /// True when the audio came from the whole-text cache and no provider call was made
    pub cached: bool,
    pub text_hash: String,
    pub voice: String,
    pub format: AudioFormat,
}

/// Request for POST /api/speech/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

/// Response for GET /api/speech/jobs/{job_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub voice: String,
    pub format: AudioFormat,
    pub total_chunks: i32,
    pub completed_chunks: i32,
    /// Only chunks that already have audio, in chunk order
    pub chunk_urls: Vec<ChunkUrl>,
    pub error_message: Option<String>,
}

/// Response for POST /api/speech/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    #[serde(flatten)]
    pub job: JobStatusResponse,
    /// True when a completed job already existed for this text and voice
    pub cached: bool,
}

impl From<GenerationJob> for JobStatusResponse {
    fn from(job: GenerationJob) -> Self {
        let chunk_urls = job.available_chunks();
        Self {
            job_id: job.id,
            status: job.status,
            voice: job.voice,
            format: job.format,
            total_chunks: job.total_chunks,
            completed_chunks: job.completed_chunks,
            chunk_urls,
            error_message: job.error_message,
        }
    }
}
