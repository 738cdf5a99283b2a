use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{join_url, MediaError, MediaResult, MediaStore};

/// Files under `root`, served under `base_url`
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    fn path_for(&self, key: &str) -> MediaResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(MediaError::Upload(format!("invalid media key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> MediaResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        debug!(key = %key, content_type = %content_type, size = bytes.len(), "Stored media file");
        Ok(key.to_string())
    }

    async fn delete(&self, key: &str) -> MediaResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted media file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }
}
