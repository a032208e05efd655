use std::path::Path;
use std::sync::Arc;

use tokio::fs;

use super::{FileTask, MediaKind};

/// Hard ceiling per file, 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("{name} is too large (>100MB).")]
    TooLarge { name: String, size: u64 },
    #[error("{name} format not supported.")]
    Unsupported { name: String, mime: String },
}

/// A file handed over by the picker or a drop, before validation.
#[derive(Clone, Debug)]
pub struct FileSelection {
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Declared MIME type; guessed from the name when absent.
    pub mime: Option<String>,
}

impl FileSelection {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("no usable file name in {}", path.display()))?
            .to_string();
        let bytes = fs::read(path).await?;
        Ok(Self::new(name, bytes))
    }

    pub fn mime(&self) -> String {
        match &self.mime {
            Some(mime) => mime.clone(),
            None => mime_guess::from_path(&self.name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        }
    }
}

/// Turns a selection into an idle task, or says why it was turned away.
pub fn validate(selection: FileSelection) -> Result<FileTask, IntakeError> {
    let size = selection.bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(IntakeError::TooLarge {
            name: selection.name,
            size,
        });
    }

    let mime = selection.mime();
    let kind = match MediaKind::from_mime(&mime) {
        Some(kind) if kind.is_supported() => kind,
        _ => {
            return Err(IntakeError::Unsupported {
                name: selection.name,
                mime,
            })
        }
    };

    Ok(FileTask::new(selection.name, mime, kind, selection.bytes))
}
