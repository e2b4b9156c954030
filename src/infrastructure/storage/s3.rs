use super::{public_url, AudioStorage, StorageError, StoredObject, UploadOptions};
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};
use std::sync::Arc;

/// S3 bucket storage; objects are addressed through a public (CDN or bucket) base URL
pub struct S3AudioStorage {
    s3_client: Arc<S3Client>,
    bucket: String,
    public_base_url: String,
}

impl S3AudioStorage {
    pub fn new(s3_client: Arc<S3Client>, bucket: String, public_base_url: String) -> Self {
        Self {
            s3_client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl AudioStorage for S3AudioStorage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions<'_>,
    ) -> Result<StoredObject, StorageError> {
        if self.bucket.is_empty() {
            return Err(StorageError::NotConfigured("S3_BUCKET is not set".to_string()));
        }

        let key = options.object_key();
        let size = bytes.len();

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(options.format.content_type())
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = ?e,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 put_object failed"
                );
                StorageError::Upload(format!("S3 put_object {}: {}", key, e))
            })?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Audio uploaded to S3");

        Ok(StoredObject {
            url: public_url(&self.public_base_url, &key),
            key,
        })
    }
}
