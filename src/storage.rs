//! Recording storage
//!
//! Owns the flat upload directory: creating it at startup, staging and
//! committing uploads, and scanning it for recordings.
//!
//! Uploads are written to a dot-prefixed staging file inside the upload
//! directory and only moved to their final `video_<secs>_<name>` filename once
//! the whole body has been received and synced. The move never replaces an
//! existing file. Dropping a [`PendingUpload`] without committing it removes
//! the staging file.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

// ============================================================
// Constants
// ============================================================

/// Prefix of every stored recording filename
pub const RECORDING_PREFIX: &str = "video_";

/// Prefix of in-flight staging files
pub const STAGING_PREFIX: &str = ".upload-";

/// Suffix of in-flight staging files
pub const STAGING_SUFFIX: &str = ".part";

// ============================================================
// Error Types
// ============================================================

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create upload directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to read upload directory {path}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to create staging file in {path}: {source}")]
    Stage { path: PathBuf, source: io::Error },

    #[error("failed to write upload data: {0}")]
    Write(#[source] io::Error),

    #[error("failed to store recording {filename}: {source}")]
    Persist { filename: String, source: io::Error },
}

pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================
// Recording
// ============================================================

/// A stored recording, with metadata taken from the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// File name inside the upload directory
    pub filename: String,
    /// Last modification time in Unix seconds
    pub last_modified: i64,
}

/// Build the stored filename for an upload
pub fn recording_filename(timestamp: i64, original_name: &str) -> String {
    format!("{RECORDING_PREFIX}{timestamp}_{original_name}")
}

/// Reduce a client-supplied filename to its final path component.
///
/// Both `/` and `\` are treated as separators. Returns `None` when nothing
/// usable is left.
pub fn sanitize_original_name(submitted: &str) -> Option<String> {
    let name = submitted
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_matches(char::from(0));

    match name {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Check that `name` is a single visible path component
fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', char::from(0)])
}

// ============================================================
// Store
// ============================================================

/// Handle to the upload directory
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    /// Open the store, creating the directory (and parents) if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Upload directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Start a new upload by creating a staging file
    pub fn begin_upload(&self) -> Result<PendingUpload> {
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|source| StorageError::Stage {
                path: self.dir.clone(),
                source,
            })?;

        let (file, path) = staged.into_parts();
        debug!(staging = %path.display(), "staging upload");

        Ok(PendingUpload {
            file: tokio::fs::File::from_std(file),
            path,
            dir: self.dir.clone(),
            bytes_written: 0,
        })
    }

    /// List stored recordings sorted by filename.
    ///
    /// Directories and staging files are skipped. An entry whose metadata
    /// cannot be read is logged and skipped.
    pub async fn list(&self) -> Result<Vec<Recording>> {
        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|source| StorageError::ReadDir {
                    path: self.dir.clone(),
                    source,
                })?;

        let mut recordings = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StorageError::ReadDir {
                        path: self.dir.clone(),
                        source,
                    })
                }
            };

            let filename = entry.file_name().to_string_lossy().into_owned();
            if filename.starts_with('.') {
                continue;
            }

            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(%filename, error = %e, "skipping recording with unreadable metadata");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let last_modified = match metadata.modified() {
                Ok(modified) => DateTime::<Utc>::from(modified).timestamp(),
                Err(e) => {
                    warn!(%filename, error = %e, "skipping recording without modification time");
                    continue;
                }
            };

            recordings.push(Recording {
                filename,
                last_modified,
            });
        }

        recordings.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(recordings)
    }

    /// Resolve a recording name to its path if it names a stored file
    pub async fn locate(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_component(filename) {
            return None;
        }

        let path = self.dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some(path),
            _ => None,
        }
    }
}

// ============================================================
// Pending upload
// ============================================================

/// An upload being written to a staging file
#[derive(Debug)]
pub struct PendingUpload {
    file: tokio::fs::File,
    path: TempPath,
    dir: PathBuf,
    bytes_written: u64,
}

impl PendingUpload {
    /// Append a chunk of upload data
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(StorageError::Write)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Number of bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush the data to disk and move it to `video_<timestamp>_<original_name>`.
    ///
    /// Fails without touching the existing file if that name is taken.
    pub async fn commit(mut self, original_name: &str, timestamp: i64) -> Result<Recording> {
        self.file.flush().await.map_err(StorageError::Write)?;
        self.file.sync_all().await.map_err(StorageError::Write)?;
        drop(self.file);

        let filename = recording_filename(timestamp, original_name);
        let target = self.dir.join(&filename);

        let staged = self.path;
        let persisted = tokio::task::spawn_blocking(move || {
            staged.persist_noclobber(&target).map_err(|e| e.error)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);

        persisted.map_err(|source| StorageError::Persist {
            filename: filename.clone(),
            source,
        })?;

        Ok(Recording {
            filename,
            last_modified: timestamp,
        })
    }
}
