//! On-disk attachment storage.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::StorageError;
use crate::model::UNNAMED_ATTACHMENT;

/// Process-wide sequence mixed into every generated name. Two persists in the
/// same nanosecond still get distinct names.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Writes attachment payloads into a single content directory.
pub struct AttachmentStore {
    directory: PathBuf,
    ready: OnceCell<PathBuf>,
}

impl AttachmentStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            ready: OnceCell::new(),
        }
    }

    /// The configured directory, as given.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the content directory (recursively) and resolves it to an
    /// absolute path. Runs once per store; later calls return the cached path.
    pub async fn ensure_ready(&self) -> Result<&Path, StorageError> {
        let resolved = self
            .ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.directory)
                    .await
                    .map_err(|e| StorageError::CreateDirectory {
                        path: self.directory.clone(),
                        source: e,
                    })?;
                std::path::absolute(&self.directory).map_err(|e| StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                })
            })
            .await?;
        Ok(resolved.as_path())
    }

    /// Persists `content` under a unique name derived from `suggested_name`
    /// and returns the absolute path of the written file.
    ///
    /// The payload goes to a hidden temporary file first and is renamed into
    /// place, so the returned path never shows a partial write.
    pub async fn persist(
        &self,
        content: &[u8],
        suggested_name: Option<&str>,
    ) -> Result<PathBuf, StorageError> {
        let directory = self.ensure_ready().await?;

        let filename = unique_filename(suggested_name);
        let final_path = directory.join(&filename);
        let temp_path = directory.join(format!(".{}.part", uuid::Uuid::new_v4()));

        write_new_file(&temp_path, content).await?;

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::WriteFile {
                path: final_path,
                source: e,
            });
        }

        debug!("Stored {} bytes at {}", content.len(), final_path.display());
        Ok(final_path)
    }

    /// Removes a file previously returned by [`persist`](Self::persist).
    pub async fn discard(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

async fn write_new_file(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let to_err = |e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(to_err)?;

    let written = async {
        file.write_all(content).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(to_err(e));
    }
    Ok(())
}

/// Builds `<unix nanos>-<sequence>-<sanitized name>`.
pub fn unique_filename(suggested_name: Option<&str>) -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let name = suggested_name
        .map(sanitize_filename)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNNAMED_ATTACHMENT.to_string());
    format!("{}-{}-{}", nanos, seq, name)
}

/// Replaces anything outside a conservative character set and strips leading
/// dots so the result can never escape the content directory.
pub fn sanitize_filename(filename: &str) -> String {
    let filename = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let filename = filename.trim_matches(|c| c == '.' || c == ' ');

    if filename.len() > 200 {
        let ext_start = filename.rfind('.').unwrap_or(filename.len());
        let ext = &filename[ext_start..];
        let mut cut = 200 - ext.len().min(50);
        while !filename.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}{}", &filename[..cut], ext)
    } else {
        filename.to_string()
    }
}
