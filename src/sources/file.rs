use crate::error::CatalogError;
use crate::sources::traits::SnapshotSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Snapshot staged at a fixed path
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

async fn read_snapshot(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        read_snapshot(&self.path).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Newest timestamped snapshot in a results directory.
///
/// The scrapers name files `results_YYYYMMDD_HHMMSS.json`, so the newest
/// one is the name that sorts last.
pub struct LatestFileSource {
    dir: PathBuf,
    prefix: String,
}

impl LatestFileSource {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Path of the snapshot `fetch` would read right now
    pub async fn latest(&self) -> Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut newest: Option<String> = None;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with(&self.prefix) || !name.ends_with(".json") {
                continue;
            }
            if newest.as_deref().map_or(true, |current| name.as_str() > current) {
                newest = Some(name);
            }
        }

        match newest {
            Some(name) => Ok(self.dir.join(name)),
            None => Err(CatalogError::NoSnapshot {
                dir: self.dir.clone(),
                prefix: self.prefix.clone(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl SnapshotSource for LatestFileSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let path = self.latest().await?;
        info!("Using snapshot {}", path.display());
        read_snapshot(&path).await
    }

    fn describe(&self) -> String {
        format!("{}/{}*.json", self.dir.display(), self.prefix)
    }
}
