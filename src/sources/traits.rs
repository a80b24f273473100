use anyhow::Result;
use async_trait::async_trait;

/// Common trait for everything that can hand over a listing snapshot.
/// The repository only sees raw bytes; parsing happens after the fetch.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot document
    async fn fetch(&self) -> Result<Vec<u8>>;

    /// Human-readable description (path or URL) for logs and load reports
    fn describe(&self) -> String;
}
