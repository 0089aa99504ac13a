use std::path::PathBuf;
use std::time::Duration;

use modfetch_engine::EngineConfig;
use modfetch_policy::BackoffPolicy;
use serde::Deserialize;

/// On-disk shape of `modfetch.toml`. Every field is optional: a missing
/// field falls back to `EngineConfig::default()`, then the CLI flag/env
/// overlay is applied on top in [`FileConfig::into_engine_config`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub download_root: Option<PathBuf>,
    pub partials_root: Option<PathBuf>,
    pub stage_partials: Option<bool>,
    pub chunk_size_mb: Option<u64>,
    pub per_file_chunks: Option<usize>,
    pub per_host_requests: Option<usize>,
    pub max_retries: Option<u32>,
    pub backoff: Option<BackoffFileConfig>,
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    pub max_redirects: Option<usize>,
    pub safetensors_deep_verify_after_download: Option<bool>,
    pub always_no_resume: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffFileConfig {
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub retry_after_cap_seconds: Option<u64>,
}

impl FileConfig {
    /// Loads `modfetch.toml` from `path` if present; a missing file is not
    /// an error, since every field has a default.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merges this file config under the `MODFETCH_*` environment overlay,
    /// then into an [`EngineConfig`]. Env vars win over the file; neither
    /// wins over an explicit CLI flag, which the caller applies afterward.
    pub fn into_engine_config(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        let backoff_file = self.backoff.unwrap_or_default();
        let default_backoff = BackoffPolicy::default();

        EngineConfig {
            download_root: env_path("MODFETCH_DOWNLOAD_ROOT").or(self.download_root).unwrap_or(defaults.download_root),
            partials_root: env_path("MODFETCH_PARTIALS_ROOT").or(self.partials_root).or(defaults.partials_root),
            stage_partials: env_bool("MODFETCH_STAGE_PARTIALS").or(self.stage_partials).unwrap_or(defaults.stage_partials),
            chunk_size_mb: env_num("MODFETCH_CHUNK_SIZE_MB").or(self.chunk_size_mb).unwrap_or(defaults.chunk_size_mb),
            per_file_chunks: env_num("MODFETCH_PER_FILE_CHUNKS").or(self.per_file_chunks).unwrap_or(defaults.per_file_chunks),
            per_host_requests: env_num("MODFETCH_PER_HOST_REQUESTS").or(self.per_host_requests).unwrap_or(defaults.per_host_requests),
            backoff: BackoffPolicy {
                max_attempts: env_num("MODFETCH_MAX_RETRIES").or(self.max_retries).unwrap_or(default_backoff.max_attempts),
                min_delay: env_num("MODFETCH_BACKOFF_MIN_MS").or(backoff_file.min_ms).map(Duration::from_millis).unwrap_or(default_backoff.min_delay),
                max_delay: env_num("MODFETCH_BACKOFF_MAX_MS").or(backoff_file.max_ms).map(Duration::from_millis).unwrap_or(default_backoff.max_delay),
                retry_after_cap: env_num("MODFETCH_RETRY_AFTER_CAP_SECONDS")
                    .or(backoff_file.retry_after_cap_seconds)
                    .map(Duration::from_secs)
                    .unwrap_or(default_backoff.retry_after_cap),
            },
            timeout_seconds: env_num("MODFETCH_TIMEOUT_SECONDS").or(self.timeout_seconds).unwrap_or(defaults.timeout_seconds),
            user_agent: std::env::var("MODFETCH_USER_AGENT").ok().or(self.user_agent).unwrap_or(defaults.user_agent),
            max_redirects: env_num("MODFETCH_MAX_REDIRECTS").or(self.max_redirects).unwrap_or(defaults.max_redirects),
            safetensors_deep_verify_after_download: env_bool("MODFETCH_SAFETENSORS_DEEP_VERIFY")
                .or(self.safetensors_deep_verify_after_download)
                .unwrap_or(defaults.safetensors_deep_verify_after_download),
            always_no_resume: env_bool("MODFETCH_NO_RESUME").or(self.always_no_resume).unwrap_or(defaults.always_no_resume),
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_num<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
