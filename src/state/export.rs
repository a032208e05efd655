use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use tokio::fs;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// What the download button hands to the user.
#[derive(Debug)]
pub enum Export {
    File { name: String, bytes: Arc<[u8]> },
    Archive { name: String, bytes: Vec<u8>, entries: Vec<String> },
}

impl Export {
    pub fn name(&self) -> &str {
        match self {
            Export::File { name, .. } | Export::Archive { name, .. } => name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Export::File { bytes, .. } => &bytes[..],
            Export::Archive { bytes, .. } => bytes.as_slice(),
        }
    }

    /// Writes the export into `dir` and returns the path it landed at.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        let path = dir.join(self.name());
        fs::write(&path, self.bytes()).await?;
        info!("saved {} ({} bytes)", path.display(), self.bytes().len());
        Ok(path)
    }
}

/// Last extension of a file name, lowercased. A name without a dot yields
/// the whole name.
pub fn original_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_lowercase()
}

/// The name with its final `.ext` removed. Dots inside directory parts and a
/// trailing bare dot do not count as an extension.
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}

/// `<base>.<ext>`, with nothing inserted between the two.
pub fn download_name(original: &str, extension: &str) -> String {
    format!("{}.{}", base_name(original), extension)
}

/// Bundles named payloads into a zip. Entries that would collide get a
/// ` (n)` suffix so every payload keeps its own entry.
pub fn build_archive(files: Vec<(String, Arc<[u8]>)>) -> Result<(Vec<u8>, Vec<String>), ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut used = HashSet::new();
    let mut entries = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let name = unique_name(&name, &used);
        zip.start_file(name.clone(), options)?;
        zip.write_all(&bytes)?;
        used.insert(name.clone());
        entries.push(name);
    }

    let buffer = zip.finish()?.into_inner();
    Ok((buffer, entries))
}

fn unique_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }

    let base = base_name(name);
    let ext = &name[base.len()..];
    (1..)
        .map(|n| format!("{} ({}){}", base, n, ext))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
