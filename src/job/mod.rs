pub mod intake;

use std::sync::Arc;

use serde::Serialize;
use strum_macros::Display;
use uuid::Uuid;

use crate::state::results::ResultHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Pdf,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime == "application/pdf" {
            Some(MediaKind::Pdf)
        } else {
            None
        }
    }

    /// Whether any processing route exists for this kind.
    pub fn is_supported(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Converting,
    Done,
}

/// One file under management, from intake until it is removed or the session
/// is reset. A result handle is held exactly while the task is done.
#[derive(Debug)]
pub struct FileTask {
    pub(crate) id: Uuid,
    pub(crate) original_name: String,
    pub(crate) mime: String,
    pub(crate) kind: MediaKind,
    pub(crate) bytes: Arc<[u8]>,
    pub(crate) status: TaskStatus,
    pub(crate) progress: u8,
    pub(crate) result: Option<ResultHandle>,
    pub(crate) compressed_size: Option<u64>,
}

impl FileTask {
    pub(crate) fn new(original_name: String, mime: String, kind: MediaKind, bytes: Arc<[u8]>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_name,
            mime,
            kind,
            bytes,
            status: TaskStatus::Idle,
            progress: 0,
            result: None,
            compressed_size: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn result(&self) -> Option<&ResultHandle> {
        self.result.as_ref()
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.status, TaskStatus::Idle);
        self.status = TaskStatus::Converting;
        self.progress = 0;
    }

    pub(crate) fn set_progress(&mut self, progress: u8) {
        if self.status == TaskStatus::Converting {
            self.progress = progress.min(100);
        }
    }

    pub(crate) fn finish(&mut self, result: ResultHandle, compressed_size: Option<u64>) {
        debug_assert_eq!(self.status, TaskStatus::Converting);
        self.status = TaskStatus::Done;
        self.progress = 100;
        self.result = Some(result);
        self.compressed_size = compressed_size;
    }

    /// Back to idle so the next dispatch picks the task up again.
    pub(crate) fn fail(&mut self) {
        if self.status == TaskStatus::Converting {
            self.status = TaskStatus::Idle;
            self.progress = 0;
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            name: self.original_name.clone(),
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            size: format_bytes(self.size()),
            compressed_size: self
                .compressed_size
                .filter(|compressed| *compressed < self.size())
                .map(format_bytes),
            result_url: self.result.as_ref().map(|r| r.url()),
        }
    }
}

/// Row shown for a task in the file list.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub name: String,
    pub kind: MediaKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub size: String,
    /// Only present when compression actually shrank the file.
    pub compressed_size: Option<String>,
    pub result_url: Option<String>,
}

/// Human-readable size, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mime_types() {
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert!(!MediaKind::Pdf.is_supported());
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 + 1), "3 GB");
    }

    #[test]
    fn failure_returns_to_idle() {
        let mut task = FileTask::new(
            "a.png".to_string(),
            "image/png".to_string(),
            MediaKind::Image,
            Arc::from(&b"x"[..]),
        );
        task.start();
        task.set_progress(30);
        assert_eq!(task.progress(), 30);
        task.fail();
        assert_eq!(task.status(), TaskStatus::Idle);
        assert_eq!(task.progress(), 0);

        // progress only moves while converting
        task.set_progress(70);
        assert_eq!(task.progress(), 0);
    }
}
