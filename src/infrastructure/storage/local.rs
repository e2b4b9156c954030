use super::{public_url, AudioStorage, StorageError, StoredObject, UploadOptions};
use async_trait::async_trait;
use std::path::PathBuf;

/// Filesystem storage for single-node deployments; the HTTP server serves `root` at `/audio`
pub struct LocalAudioStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalAudioStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: String) -> Self {
        Self {
            root: root.into(),
            public_base_url,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl AudioStorage for LocalAudioStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        options: &UploadOptions<'_>,
    ) -> Result<StoredObject, StorageError> {
        let key = options.object_key();
        if key.split('/').any(|segment| segment == "..") {
            return Err(StorageError::Upload(format!("invalid object key: {}", key)));
        }

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a partial file
        let tmp_path = path.with_extension(format!("{}.tmp", options.format.extension()));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(StoredObject {
            url: public_url(&self.public_base_url, &key),
            key,
        })
    }
}
