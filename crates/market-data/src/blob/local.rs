//! 로컬 디렉터리 Blob 저장소.
//!
//! 컨테이너는 하위 디렉터리, Blob은 파일로 저장됩니다.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::BlobStore;
use crate::error::{DataError, Result};

/// 로컬 디렉터리 저장소.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blob 파일 경로.
    pub fn blob_path(&self, container: &str, name: &str) -> PathBuf {
        self.root.join(container).join(name)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn ensure_container(&self, container: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join(container)).await?;
        Ok(())
    }

    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        let path = self.blob_path(container, name);

        if !overwrite && tokio::fs::try_exists(&path).await? {
            return Err(DataError::BlobError {
                status: 409,
                message: format!("이미 존재하는 Blob: {}/{}", container, name),
            });
        }

        let size = bytes.len();
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = size, "로컬 Blob 저장");
        Ok(())
    }
}
