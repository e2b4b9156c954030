use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum MaterialServiceError {
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("content too large: {0}")]
    TooLarge(String),
    #[error("material has no speech plan")]
    NotFound,
    #[error("speech provider not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for MaterialServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => MaterialServiceError::Invalid(msg),
            AppError::NotFound(_) => MaterialServiceError::NotFound,
            _ => MaterialServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<MaterialServiceError> for AppError {
    fn from(err: MaterialServiceError) -> Self {
        match err {
            MaterialServiceError::Invalid(msg) => AppError::BadRequest(msg),
            MaterialServiceError::TooLarge(msg) => AppError::PayloadTooLarge(msg),
            MaterialServiceError::NotFound => {
                AppError::NotFound("Material has no speech plan".to_string())
            }
            MaterialServiceError::NotConfigured(msg) => AppError::ServiceUnavailable(msg),
            MaterialServiceError::Dependency(msg) => AppError::Internal(msg),
            MaterialServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
