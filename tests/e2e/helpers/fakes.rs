use async_trait::async_trait;
use parking_lot::Mutex;
use speechcast_backend::domain::speech::LanguageCode;
use speechcast_backend::infrastructure::providers::{
    ProviderError, SpeechProvider, SynthesisRequest,
};
use speechcast_backend::infrastructure::storage::{
    AudioStorage, StorageError, StoredObject, UploadOptions,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCall {
    pub text: String,
    pub voice: String,
}

/// Speech provider double: records every call and fails on demand.
///
/// Queued failures are consumed one per call; `fail_always` wins over the queue. Successful
/// calls return the input text as the "audio".
pub struct ScriptedProvider {
    calls: Mutex<Vec<ProviderCall>>,
    queued_failures: Mutex<VecDeque<ProviderError>>,
    fail_always: Mutex<Option<ProviderError>>,
    configured: bool,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(configured: bool, delay: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            queued_failures: Mutex::new(VecDeque::new()),
            fail_always: Mutex::new(None),
            configured,
            delay,
        }
    }

    pub fn fail_next(&self, error: ProviderError) {
        self.queued_failures.lock().push_back(error);
    }

    pub fn fail_always(&self, error: ProviderError) {
        *self.fail_always.lock() = Some(error);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn default_voice(&self, language: LanguageCode) -> &'static str {
        match language {
            LanguageCode::Spanish => "Lupe",
            _ => "Joanna",
        }
    }

    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Vec<u8>, ProviderError> {
        self.calls.lock().push(ProviderCall {
            text: request.text.to_string(),
            voice: request.voice.to_string(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = self.fail_always.lock().clone() {
            return Err(error);
        }
        if let Some(error) = self.queued_failures.lock().pop_front() {
            return Err(error);
        }

        Ok(request.text.as_bytes().to_vec())
    }
}

/// Object storage double keeping uploads in memory
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).cloned()
    }

    pub fn upload_count(&self) -> usize {
        *self.uploads.lock()
    }
}

#[async_trait]
impl AudioStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions<'_>,
    ) -> Result<StoredObject, StorageError> {
        let key = options.object_key();
        self.objects.lock().insert(key.clone(), bytes);
        *self.uploads.lock() += 1;

        Ok(StoredObject {
            url: format!("memory://audio/{}", key),
            key,
        })
    }
}
