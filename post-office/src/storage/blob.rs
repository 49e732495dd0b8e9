use crate::error::{MailError, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Flat directory of attachment blobs
///
/// Blobs are written to `tmp/` first and renamed into place, so a reader never
/// sees a partial file.
#[derive(Debug, Clone)]
pub struct BlobStorage {
    base_path: PathBuf,
}

impl BlobStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store `data` and return the key to read it back with
    pub async fn store(&self, name: &str, data: &[u8]) -> Result<String> {
        self.ensure_structure().await?;

        let key = self.generate_key(name);
        let tmp_path = self.base_path.join("tmp").join(&key);
        let final_path = self.base_path.join(&key);

        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &final_path).await?;

        info!("Stored attachment {} as {}", name, final_path.display());

        Ok(key)
    }

    pub async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| {
            MailError::Storage(format!("Failed to read blob {:?}: {}", path, e))
        })
    }

    /// Remove a blob; a missing blob is not an error
    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already removed", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.base_path.join(key)),
            _ => Err(MailError::Storage(format!("Invalid blob key: {}", key))),
        }
    }

    async fn ensure_structure(&self) -> Result<()> {
        let dir = self.base_path.join("tmp");
        if !dir.exists() {
            fs::create_dir_all(&dir).await.map_err(|e| {
                MailError::Storage(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// `timestamp.pid.sequence.hostname.ext`
    fn generate_key(&self, name: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp_micros();
        let pid = std::process::id();
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let hostname = gethostname::gethostname()
            .to_string_lossy()
            .replace(['/', '.'], "_");

        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        format!("{}.{}.{}.{}{}", timestamp, pid, sequence, hostname, extension)
    }
}
