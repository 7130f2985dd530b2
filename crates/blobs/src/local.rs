use std::path::PathBuf;

use crate::{BlobError, BlobStore};

/// Blob store over a local directory tree. The base directory doubles as
/// the root served under `/static`.
#[derive(Debug, Clone)]
pub struct LocalBlobs {
    base_dir: PathBuf,
}

impl LocalBlobs {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobs {
    async fn save(
        &self,
        subdir: &str,
        stem: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<String, BlobError> {
        let relative = format!("{subdir}/{stem}{ext}");
        let path = self.base_dir.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(%relative, bytes = bytes.len(), "saved blob");
        Ok(relative)
    }

    fn absolute_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    async fn exists(&self, relative: &str) -> bool {
        tokio::fs::try_exists(self.base_dir.join(relative))
            .await
            .unwrap_or(false)
    }

    async fn delete(&self, relative: &str) -> Result<bool, BlobError> {
        let path = self.base_dir.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
