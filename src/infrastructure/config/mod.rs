use crate::domain::chunking::ChunkerConfig;
use crate::domain::generation::{GenerationSettings, RetryPolicy};
use crate::domain::speech::AudioFormat;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Persistence
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    // Speech provider
    pub tts_provider: TtsProviderKind,
    pub aws_region: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_tts_model: String,
    pub provider_timeout_secs: u64,
    pub default_voice: String,
    pub default_audio_format: AudioFormat,
    // Audio storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub storage_public_base_url: String,
    pub local_storage_dir: String,
    // Chunking and workers
    pub max_chunk_chars: usize,
    pub chunk_lookahead_chars: Option<usize>,
    pub worker_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub rate_limit_backoff_ms: u64,
    // Staleness
    pub chunk_stale_after_secs: u64,
    pub pending_stale_after_secs: u64,
    pub job_stale_after_secs: u64,
    // Completed job cache
    pub job_cache_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TtsProviderKind {
    Polly,
    OpenAi,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required when {1}")]
    Missing(&'static str, String),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let store_backend = match env_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                }
                .into())
            }
        };

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing(
                "DATABASE_URL",
                "STORE_BACKEND=postgres".to_string(),
            )
            .into());
        }

        let tts_provider = match env_or("TTS_PROVIDER", "polly").to_lowercase().as_str() {
            "polly" => TtsProviderKind::Polly,
            "openai" => TtsProviderKind::OpenAi,
            other => {
                return Err(ConfigError::Invalid {
                    name: "TTS_PROVIDER",
                    value: other.to_string(),
                }
                .into())
            }
        };

        let storage_backend = match env_or("STORAGE_BACKEND", "local").to_lowercase().as_str() {
            "s3" => StorageBackend::S3,
            "local" => StorageBackend::Local,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                }
                .into())
            }
        };

        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", 8080)?;

        let config = Config {
            storage_public_base_url: env::var("STORAGE_PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}/audio", port)),
            host,
            port,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            store_backend,
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            tts_provider,
            aws_region: env_or("AWS_REGION", "eu-west-1"),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            openai_base_url: env_or(
                "OPENAI_BASE_URL",
                crate::infrastructure::providers::openai::DEFAULT_OPENAI_BASE_URL,
            ),
            openai_tts_model: env_or("OPENAI_TTS_MODEL", "tts-1"),
            provider_timeout_secs: parse_env("PROVIDER_TIMEOUT_SECS", 120)?,
            default_voice: env_or("DEFAULT_VOICE", "auto"),
            default_audio_format: parse_env("DEFAULT_AUDIO_FORMAT", AudioFormat::Mp3)?,
            storage_backend,
            s3_bucket: env_or("S3_BUCKET", ""),
            local_storage_dir: env_or("LOCAL_STORAGE_DIR", "./data/audio"),
            max_chunk_chars: parse_env("MAX_CHUNK_CHARS", 800)?,
            chunk_lookahead_chars: match env::var("CHUNK_LOOKAHEAD_CHARS") {
                Ok(value) => Some(parse_value("CHUNK_LOOKAHEAD_CHARS", &value)?),
                Err(_) => None,
            },
            worker_concurrency: parse_env("WORKER_CONCURRENCY", 4)?,
            retry_max_attempts: parse_env("RETRY_MAX_ATTEMPTS", 2)?,
            retry_backoff_ms: parse_env("RETRY_BACKOFF_MS", 5_000)?,
            rate_limit_backoff_ms: parse_env("RATE_LIMIT_BACKOFF_MS", 30_000)?,
            chunk_stale_after_secs: parse_env("CHUNK_STALE_AFTER_SECS", 120)?,
            pending_stale_after_secs: parse_env("PENDING_STALE_AFTER_SECS", 900)?,
            job_stale_after_secs: parse_env("JOB_STALE_AFTER_SECS", 600)?,
            job_cache_enabled: env::var("JOB_CACHE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<String>()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(true),
        };

        if config.storage_backend == StorageBackend::S3 && config.s3_bucket.is_empty() {
            return Err(ConfigError::Missing("S3_BUCKET", "STORAGE_BACKEND=s3".to_string()).into());
        }

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn chunker(&self) -> ChunkerConfig {
        let chunker = ChunkerConfig::new(self.max_chunk_chars);
        match self.chunk_lookahead_chars {
            Some(lookahead) => chunker.with_lookahead(lookahead),
            None => chunker,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            transient_backoff: Duration::from_millis(self.retry_backoff_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            chunker: self.chunker(),
            default_format: self.default_audio_format,
            job_stale_after: Duration::from_secs(self.job_stale_after_secs),
            chunk_stale_after: Duration::from_secs(self.chunk_stale_after_secs),
            pending_stale_after: Duration::from_secs(self.pending_stale_after_secs),
            job_cache_enabled: self.job_cache_enabled,
            ..GenerationSettings::default()
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_value(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
