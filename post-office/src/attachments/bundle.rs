use crate::error::{MailError, Result};
use crate::mail::Attachment;
use crate::storage::BlobStorage;
use crate::store::Store;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Where the content of an attachment comes from
pub enum AttachmentSource {
    Bytes(Vec<u8>),
    /// Reader owned by the caller until it is drained
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    /// File opened, read and closed during resolution
    Path(PathBuf),
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            AttachmentSource::Reader(_) => f.write_str("Reader"),
            AttachmentSource::Path(path) => write!(f, "Path({:?})", path),
        }
    }
}

/// Attachment content with an optional explicit mimetype
#[derive(Debug)]
pub struct AttachmentSpec {
    pub source: AttachmentSource,
    pub mimetype: Option<String>,
}

impl AttachmentSpec {
    pub fn bytes(content: impl Into<Vec<u8>>) -> Self {
        Self {
            source: AttachmentSource::Bytes(content.into()),
            mimetype: None,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: AttachmentSource::Path(path.into()),
            mimetype: None,
        }
    }

    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            source: AttachmentSource::Reader(Box::new(reader)),
            mimetype: None,
        }
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    async fn into_content(self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        match self.source {
            AttachmentSource::Bytes(bytes) => return Ok(bytes),
            AttachmentSource::Reader(mut reader) => {
                reader.read_to_end(&mut content).await?;
            }
            AttachmentSource::Path(path) => {
                let source_error = |source| MailError::AttachmentSource {
                    path: path.display().to_string(),
                    source,
                };
                let mut file = File::open(&path).await.map_err(source_error)?;
                file.read_to_end(&mut content).await.map_err(source_error)?;
            }
        }
        Ok(content)
    }
}

/// Turns attachment inputs into stored [`Attachment`] records
#[derive(Clone)]
pub struct AttachmentBundle {
    store: Arc<dyn Store>,
    blobs: BlobStorage,
}

impl AttachmentBundle {
    pub fn new(store: Arc<dyn Store>, blobs: BlobStorage) -> Self {
        Self { store, blobs }
    }

    /// Persist every spec, in order
    ///
    /// Without explicit specs the template defaults are returned as they are,
    /// so emails share the template's attachment rows. When one spec fails,
    /// the rows and blobs already written for the others are removed.
    pub async fn resolve<I>(&self, specs: I, template_defaults: &[Attachment]) -> Result<Vec<Attachment>>
    where
        I: IntoIterator<Item = (String, AttachmentSpec)>,
    {
        let specs: Vec<_> = specs.into_iter().collect();
        if specs.is_empty() {
            return Ok(template_defaults.to_vec());
        }

        let mut attachments = Vec::with_capacity(specs.len());
        for (name, spec) in specs {
            match self.persist(&name, spec).await {
                Ok(attachment) => attachments.push(attachment),
                Err(e) => {
                    self.discard(&attachments).await;
                    return Err(e);
                }
            }
        }

        Ok(attachments)
    }

    async fn persist(&self, name: &str, spec: AttachmentSpec) -> Result<Attachment> {
        let mimetype = spec.mimetype.clone();
        let content = spec.into_content().await?;
        let key = self.blobs.store(name, &content).await?;

        match self.store.insert_attachment(name, &key, mimetype.as_deref()).await {
            Ok(attachment) => {
                debug!("Persisted attachment {} ({} bytes)", attachment.id, content.len());
                Ok(attachment)
            }
            Err(e) => {
                if let Err(remove_error) = self.blobs.remove(&key).await {
                    warn!("Cannot remove blob {}: {}", key, remove_error);
                }
                Err(e)
            }
        }
    }

    /// Best effort removal of attachments written by a failed resolution
    async fn discard(&self, attachments: &[Attachment]) {
        for attachment in attachments {
            if let Err(e) = self.store.delete_attachment(attachment.id).await {
                warn!("Cannot delete attachment {}: {}", attachment.id, e);
                continue;
            }
            if let Err(e) = self.blobs.remove(&attachment.file).await {
                warn!("Cannot remove blob {}: {}", attachment.file, e);
            }
        }
    }
}
