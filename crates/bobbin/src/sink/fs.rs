//! Filesystem sink
//!
//! Layout:
//! - `<cars_dir>/<did>.car`
//! - `<records_dir>/<did>/_commit.json`
//! - `<records_dir>/<did>/<collection>/<rkey>.json`
//! - `<records_dir>/<did>/_blob/<cid>`

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use super::{Namespace, OutputSink, validate_component, validate_key};
use crate::error::{ConfigError, SinkError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes units as files under two output roots
#[derive(Debug, Clone)]
pub struct FsSink {
    cars_dir: PathBuf,
    records_dir: PathBuf,
}

fn io_error(path: &Path, source: std::io::Error) -> SinkError {
    SinkError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl FsSink {
    /// Sink writing archives to `cars_dir` and everything else to `records_dir`
    pub fn new(cars_dir: impl Into<PathBuf>, records_dir: impl Into<PathBuf>) -> Self {
        Self {
            cars_dir: cars_dir.into(),
            records_dir: records_dir.into(),
        }
    }

    /// Create both output roots
    pub async fn create_roots(&self) -> Result<(), ConfigError> {
        for dir in [&self.cars_dir, &self.records_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::OutputRoot {
                    path: dir.display().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Physical path of a unit
    pub fn path_for(&self, namespace: &Namespace, key: &str) -> Result<PathBuf, SinkError> {
        validate_key(key)?;
        let path = match namespace {
            Namespace::Archives => {
                validate_component(key)?;
                self.cars_dir.join(key)
            }
            Namespace::Repo(did) => {
                validate_component(did)?;
                let mut path = self.records_dir.join(did.as_str());
                path.extend(key.split('/'));
                let mut file = path.into_os_string();
                file.push(".json");
                PathBuf::from(file)
            }
            Namespace::Blobs(did) => {
                validate_component(did)?;
                validate_component(key)?;
                self.records_dir.join(did.as_str()).join("_blob").join(key)
            }
        };
        Ok(path)
    }
}

/// Write to a sibling temp file, then rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SinkError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| io_error(parent, e))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

impl OutputSink for FsSink {
    async fn write_unit(
        &self,
        namespace: &Namespace,
        key: &str,
        bytes: Bytes,
    ) -> Result<(), SinkError> {
        let path = self.path_for(namespace, key)?;
        write_atomic(&path, &bytes).await?;
        tracing::trace!(path = %path.display(), len = bytes.len(), "wrote unit");
        Ok(())
    }

    async fn exists(&self, namespace: &Namespace, key: &str) -> Result<bool, SinkError> {
        let path = self.path_for(namespace, key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error(&path, e))
    }
}
