use crate::sources::{FileSource, HttpSource, LatestFileSource, SnapshotSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// A fixed staged file
    #[default]
    File,
    /// Newest timestamped file in a results directory
    Latest,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub kind: SnapshotKind,
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/latest.json")
}
fn default_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_prefix() -> String {
    "results_".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            kind: SnapshotKind::default(),
            path: default_path(),
            dir: default_dir(),
            prefix: default_prefix(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SnapshotConfig {
    pub fn build_source(&self) -> Result<Arc<dyn SnapshotSource>> {
        let source: Arc<dyn SnapshotSource> = match self.kind {
            SnapshotKind::File => Arc::new(FileSource::new(&self.path)),
            SnapshotKind::Latest => Arc::new(LatestFileSource::new(&self.dir, &self.prefix)),
            SnapshotKind::Http => {
                let url = self
                    .url
                    .as_deref()
                    .context("snapshot.url is required when snapshot.kind = \"http\"")?;
                Arc::new(HttpSource::new(url, Duration::from_secs(self.timeout_secs))?)
            }
        };
        Ok(source)
    }
}

/// What to do when a record's prices are not newest-first
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceOrderPolicy {
    /// Log the offending units and keep the data
    #[default]
    Warn,
    /// Fail the refresh
    Strict,
    Ignore,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ValidationConfig {
    #[serde(default)]
    pub price_order: PriceOrderPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    if config.snapshot.kind == SnapshotKind::Http && config.snapshot.url.is_none() {
        anyhow::bail!("snapshot.url is required when snapshot.kind = \"http\"");
    }

    Ok(config)
}
