use crate::error::AppError;
use crate::infrastructure::providers::ProviderError;
use crate::infrastructure::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SpeechServiceError {
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("text too large: {0}")]
    TooLarge(String),
    #[error("generation job not found")]
    NotFound,
    #[error("speech provider not configured: {0}")]
    NotConfigured(String),
    #[error("provider rate limited: {0}")]
    RateLimited(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for SpeechServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => SpeechServiceError::Invalid(msg),
            AppError::NotFound(_) => SpeechServiceError::NotFound,
            _ => SpeechServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<ProviderError> for SpeechServiceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => SpeechServiceError::NotConfigured(msg),
            ProviderError::RateLimited(msg) => SpeechServiceError::RateLimited(msg),
            ProviderError::Unsupported(msg) => SpeechServiceError::Invalid(msg),
            other => SpeechServiceError::Provider(other.to_string()),
        }
    }
}

impl From<StorageError> for SpeechServiceError {
    fn from(err: StorageError) -> Self {
        SpeechServiceError::Dependency(err.to_string())
    }
}

impl From<SpeechServiceError> for AppError {
    fn from(err: SpeechServiceError) -> Self {
        match err {
            SpeechServiceError::Invalid(msg) => AppError::BadRequest(msg),
            SpeechServiceError::TooLarge(msg) => AppError::PayloadTooLarge(msg),
            SpeechServiceError::NotFound => {
                AppError::NotFound("Generation job not found".to_string())
            }
            SpeechServiceError::NotConfigured(msg) => AppError::ServiceUnavailable(msg),
            SpeechServiceError::RateLimited(msg) => AppError::RateLimitExceeded(msg),
            SpeechServiceError::Provider(msg) => AppError::ExternalService(msg),
            SpeechServiceError::Dependency(msg) => AppError::Internal(msg),
            SpeechServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
