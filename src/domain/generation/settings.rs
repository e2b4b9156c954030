use crate::domain::chunking::ChunkerConfig;
use crate::domain::speech::AudioFormat;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Tunables shared by the speech and material services
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub chunker: ChunkerConfig,
    pub default_format: AudioFormat,
    /// Largest text accepted by the job and material endpoints, in characters
    pub max_text_chars: usize,
    /// Largest text accepted by one-shot synthesis (a single provider request)
    pub max_one_shot_chars: usize,
    pub job_stale_after: Duration,
    pub chunk_stale_after: Duration,
    pub pending_stale_after: Duration,
    pub job_cache_enabled: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::new(800),
            default_format: AudioFormat::Mp3,
            max_text_chars: 500_000,
            max_one_shot_chars: 3_000,
            job_stale_after: Duration::from_secs(600),
            chunk_stale_after: Duration::from_secs(120),
            pending_stale_after: Duration::from_secs(900),
            job_cache_enabled: true,
        }
    }
}

/// `now - after`, saturating at the earliest representable instant
pub fn stale_cutoff(now: DateTime<Utc>, after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(after)
        .ok()
        .and_then(|after| now.checked_sub_signed(after))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
