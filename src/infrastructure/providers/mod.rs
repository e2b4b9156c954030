pub mod openai;
pub mod polly;

pub use openai::OpenAiProvider;
pub use polly::PollyProvider;

use crate::domain::speech::{AudioFormat, LanguageCode};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub voice: &'a str,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("speech provider is not configured: {0}")]
    NotConfigured(String),
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error calling provider: {0}")]
    Network(String),
    #[error("provider rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unsupported synthesis request: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Map a non-success HTTP status from the provider
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 {
            ProviderError::RateLimited(message)
        } else {
            ProviderError::Http { status, message }
        }
    }
}

/// External speech-generation provider.
///
/// Implementations make exactly one provider request per call; splitting long text is the
/// chunker's job, so the text handed in here is already bounded.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// False when credentials are missing; requests are then rejected up front
    fn is_configured(&self) -> bool {
        true
    }

    /// Voice used when the client asks for `auto`
    fn default_voice(&self, language: LanguageCode) -> &'static str;

    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, ProviderError>;
}
