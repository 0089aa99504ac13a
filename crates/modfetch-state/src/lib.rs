//! Durable, crash-safe state store tracking in-flight and completed downloads.
//!
//! Every status transition recorded here survives a process restart: a chunk
//! marked `complete` is still `complete` after `kill -9`, which is what makes
//! resume possible without re-verifying the whole file from scratch.

mod error;
mod model;
mod store;

pub use error::{Error, Result};
pub use model::{ChunkRecord, ChunkStatus, DownloadRecord, DownloadStatus, HostCapsRecord};
pub use store::Store;
