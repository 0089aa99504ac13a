use std::path::PathBuf;
use std::time::Duration;

use modfetch_policy::BackoffPolicy;

/// The engine's tunables, populated from `modfetch.toml` plus CLI/env overlay
/// by the binary crate. Every field here corresponds to an input named in the
/// engine's external-interface contract.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub download_root: PathBuf,
    pub partials_root: Option<PathBuf>,
    pub stage_partials: bool,
    pub chunk_size_mb: u64,
    pub per_file_chunks: usize,
    pub per_host_requests: usize,
    pub backoff: BackoffPolicy,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub max_redirects: usize,
    pub safetensors_deep_verify_after_download: bool,
    pub always_no_resume: bool,
}

impl EngineConfig {
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb * 1024 * 1024
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Width of the worker pool for one download: capped by both the
    /// per-file and per-host concurrency limits.
    pub fn worker_pool_width(&self) -> usize {
        self.per_file_chunks.min(self.per_host_requests).max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("."),
            partials_root: None,
            stage_partials: false,
            chunk_size_mb: 8,
            per_file_chunks: 8,
            per_host_requests: 4,
            backoff: BackoffPolicy::default(),
            timeout_seconds: 30,
            user_agent: format!("modfetch/{} ({}/{})", env!("CARGO_PKG_VERSION"), std::env::consts::OS, std::env::consts::ARCH),
            max_redirects: 10,
            safetensors_deep_verify_after_download: false,
            always_no_resume: false,
        }
    }
}
