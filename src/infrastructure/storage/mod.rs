pub mod local;
pub mod s3;

pub use local::LocalAudioStorage;
pub use s3::S3AudioStorage;

use crate::domain::speech::AudioFormat;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions<'a> {
    pub folder: &'a str,
    /// Object name inside the folder, without extension
    pub key: &'a str,
    pub format: AudioFormat,
}

impl UploadOptions<'_> {
    /// Full object key: `<folder>/<key>.<ext>`
    pub fn object_key(&self) -> String {
        format!(
            "{}/{}.{}",
            self.folder.trim_matches('/'),
            self.key.trim_matches('/'),
            self.format.extension()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("audio storage is not configured: {0}")]
    NotConfigured(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable object storage for generated audio.
///
/// Uploads are idempotent: writing the same key twice overwrites the first object.
#[async_trait]
pub trait AudioStorage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions<'_>,
    ) -> Result<StoredObject, StorageError>;
}

/// Join a base URL and an object key, percent-encoding each path segment
pub fn public_url(base_url: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}
