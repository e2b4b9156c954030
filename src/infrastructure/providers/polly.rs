use super::{ProviderError, SpeechProvider, SynthesisRequest};
use crate::domain::speech::{AudioFormat, LanguageCode};
use async_trait::async_trait;
use aws_sdk_polly::{
    error::{ProvideErrorMetadata, SdkError},
    operation::synthesize_speech::SynthesizeSpeechError,
    types::{Engine, OutputFormat, VoiceId},
    Client as PollyClient,
};
use std::sync::Arc;
use std::time::Duration;

/// AWS Polly implementation of the speech provider
pub struct PollyProvider {
    polly_client: Arc<PollyClient>,
    engine: Engine,
    timeout: Duration,
}

impl PollyProvider {
    pub fn new(polly_client: Arc<PollyClient>, timeout: Duration) -> Self {
        Self {
            polly_client,
            engine: Engine::Neural,
            timeout,
        }
    }

    fn output_format(format: AudioFormat) -> Result<OutputFormat, ProviderError> {
        match format {
            AudioFormat::Mp3 => Ok(OutputFormat::Mp3),
            AudioFormat::Pcm => Ok(OutputFormat::Pcm),
            other => Err(ProviderError::Unsupported(format!(
                "AWS Polly cannot produce {} audio",
                other
            ))),
        }
    }

    fn classify(&self, err: SdkError<SynthesizeSpeechError>) -> ProviderError {
        match &err {
            SdkError::TimeoutError(_) => ProviderError::Timeout(self.timeout),
            SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                ProviderError::Network(format!("{:?}", err))
            }
            SdkError::ServiceError(context) => {
                let status = context.raw().status().as_u16();
                let service_err = context.err();
                let message = service_err
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| service_err.to_string());

                // Polly reports throttling as a 400 with a dedicated error code
                if service_err.code() == Some("ThrottlingException") {
                    ProviderError::RateLimited(message)
                } else {
                    ProviderError::from_status(status, message)
                }
            }
            SdkError::ConstructionFailure(_) => ProviderError::Unsupported(format!("{:?}", err)),
            _ => ProviderError::Network(format!("{:?}", err)),
        }
    }
}

#[async_trait]
impl SpeechProvider for PollyProvider {
    fn name(&self) -> &'static str {
        "polly"
    }

    fn default_voice(&self, language: LanguageCode) -> &'static str {
        match language {
            LanguageCode::English => "Joanna",
            LanguageCode::Spanish => "Lupe",
            LanguageCode::French => "Lea",
            LanguageCode::German => "Vicki",
            LanguageCode::Italian => "Bianca",
            LanguageCode::Portuguese => "Ines",
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, ProviderError> {
        let start_time = std::time::Instant::now();
        let output_format = Self::output_format(request.format)?;

        tracing::info!(
            provider = "polly",
            voice = request.voice,
            engine = ?self.engine,
            format = %request.format,
            text_length = request.text.len(),
            "Calling AWS Polly synthesize_speech"
        );

        let call = self
            .polly_client
            .synthesize_speech()
            .text(request.text)
            .voice_id(VoiceId::from(request.voice))
            .output_format(output_format)
            .engine(self.engine.clone())
            .send();

        let result = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(|e| {
                let classified = self.classify(e);
                tracing::error!(
                    error = %classified,
                    voice = request.voice,
                    text_length = request.text.len(),
                    "AWS Polly synthesize_speech failed"
                );
                classified
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to collect audio stream from Polly response");
            ProviderError::Network(format!("failed to read audio stream: {}", e))
        })?;

        let audio_bytes = audio_stream.into_bytes().to_vec();

        tracing::info!(
            provider = "polly",
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = request.text.len(),
            audio_size_bytes = audio_bytes.len(),
            "TTS synthesis completed"
        );

        Ok(audio_bytes)
    }
}
