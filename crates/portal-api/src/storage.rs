use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk store for uploaded documents.
///
/// Each document is a single flat file at `{dir}/{document_id}`; metadata
/// lives in the database.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Document storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn file_path(&self, document_id: Uuid) -> PathBuf {
        self.dir.join(document_id.to_string())
    }

    /// Writes `data` and returns its hex SHA-256.
    pub async fn write(&self, document_id: Uuid, data: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hex::encode(hasher.finalize());

        let path = self.file_path(document_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(digest)
    }

    pub async fn read(&self, document_id: Uuid) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(document_id)).await?)
    }

    /// Best effort: a missing file is not an error.
    pub async fn remove(&self, document_id: Uuid) {
        let path = self.file_path(document_id);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
