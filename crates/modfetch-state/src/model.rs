use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Planning,
    Running,
    Hold,
    Complete,
    ChecksumMismatch,
    VerifyFailed,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Pending,
    Running,
    Complete,
    Dirty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    pub dest: String,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_length: Option<u64>,
    pub status: DownloadStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at_unix: u64,
}

impl DownloadRecord {
    pub fn new(url: impl Into<String>, dest: impl Into<String>) -> Self {
        let created_at_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            url: url.into(),
            dest: dest.into(),
            expected_hash: None,
            actual_hash: None,
            etag: None,
            last_modified: None,
            content_length: None,
            status: DownloadStatus::Planning,
            retry_count: 0,
            last_error: None,
            created_at_unix,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: u32,
    pub start: u64,
    pub end: u64,
    pub status: ChunkStatus,
    pub hash: Option<String>,
}

impl ChunkRecord {
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCapsRecord {
    pub host: String,
    pub head_succeeded: bool,
    pub accept_ranges: bool,
}
