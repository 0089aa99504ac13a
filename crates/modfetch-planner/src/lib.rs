//! Decides how a download is shaped: chunk boundaries, the destination
//! filename, and the deterministic staging-file path.

mod chunks;
mod filename;
mod staging;

pub use chunks::{plan_chunks, ChunkBounds};
pub use filename::derive_filename;
pub use staging::{staging_key, staging_path};
