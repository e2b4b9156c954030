use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a long-form generation job.
///
/// `pending -> processing -> {completed | failed | rate_limited}`; the last three are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    RateLimited,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::RateLimited => "rate_limited",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::RateLimited
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output container requested from the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, Default)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Opus => "audio/ogg",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Pcm => "audio/L16",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "opus" => Ok(AudioFormat::Opus),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            "wav" => Ok(AudioFormat::Wav),
            "pcm" => Ok(AudioFormat::Pcm),
            other => Err(format!("Unsupported audio format: {}", other)),
        }
    }
}

/// One tracked long-form generation request, identified by `(text_hash, voice)`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GenerationJob {
    pub id: Uuid,
    pub text_hash: String,
    pub voice: String,
    pub format: AudioFormat,
    pub status: JobStatus,
    pub total_chunks: i32,
    pub completed_chunks: i32,
    /// Sparse, one slot per chunk; a slot is written once and never changes afterwards
    pub chunk_urls: Vec<Option<String>>,
    pub error_message: Option<String>,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(
        text_hash: String,
        voice: String,
        format: AudioFormat,
        total_chunks: usize,
        requested_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            text_hash,
            voice,
            format,
            status: JobStatus::Pending,
            total_chunks: total_chunks as i32,
            completed_chunks: 0,
            chunk_urls: vec![None; total_chunks],
            error_message: None,
            requested_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Populated chunk URLs in chunk order
    pub fn available_chunks(&self) -> Vec<ChunkUrl> {
        self.chunk_urls
            .iter()
            .enumerate()
            .filter_map(|(index, url)| {
                url.as_ref()
                    .filter(|u| !u.is_empty())
                    .map(|u| ChunkUrl {
                        index: index as i32,
                        url: u.clone(),
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUrl {
    pub index: i32,
    pub url: String,
}

/// Result of recording one finished chunk against its job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCompletion {
    pub completed_chunks: i32,
    pub total_chunks: i32,
    pub status: JobStatus,
    /// True only for the single call that moved the job to `completed`
    pub job_completed: bool,
}

/// Previously generated single-request audio, keyed by `(text_hash, voice)`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WholeTextCacheEntry {
    pub text_hash: String,
    pub voice: String,
    pub audio_url: String,
    pub storage_key: String,
    pub format: AudioFormat,
    pub access_count: i64,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
