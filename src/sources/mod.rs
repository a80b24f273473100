pub mod file;
pub mod http;
pub mod traits;

pub use file::{FileSource, LatestFileSource};
pub use http::HttpSource;
pub use traits::SnapshotSource;
