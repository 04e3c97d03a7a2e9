use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::domain::BlobRef;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("blob key '{0}' escapes the storage directory")]
    InvalidKey(String),
}

/// Image storage under randomly named keys.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a fresh key ending in `extension` (e.g. `.jpg`, may be empty).
    fn put(&self, extension: &str, bytes: &[u8]) -> Result<BlobRef, BlobError>;
    fn read(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError>;
}

/// Writes blobs to `<base>/<YYYY-MM-DD>/<uuid><ext>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, blob: &BlobRef) -> Result<PathBuf, BlobError> {
        let relative = Path::new(&blob.0);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || blob.0.is_empty() {
            return Err(BlobError::InvalidKey(blob.0.clone()));
        }
        Ok(self.base_dir.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, extension: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let directory = self.base_dir.join(&day);
        std::fs::create_dir_all(&directory).map_err(|source| BlobError::Io {
            path: directory.clone(),
            source,
        })?;

        let name = format!("{}{}", Uuid::new_v4().simple(), sanitize_extension(extension));
        let path = directory.join(&name);
        std::fs::write(&path, bytes).map_err(|source| BlobError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(BlobRef(format!("{day}/{name}")))
    }

    fn read(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(blob)?;
        std::fs::read(&path).map_err(|source| BlobError::Io { path, source })
    }
}

/// `.ext` from an uploaded file name, or empty when there is none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(sanitize_extension)
        .unwrap_or_default()
}

fn sanitize_extension(raw: &str) -> String {
    let cleaned: String = raw
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        String::new()
    } else {
        format!(".{cleaned}")
    }
}
