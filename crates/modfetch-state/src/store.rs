use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::model::{ChunkRecord, DownloadRecord, HostCapsRecord};

/// Durable, crash-safe store for download and chunk progress.
///
/// Backed by `sled`: every write here is fsync'd by sled before the call
/// returns, so a chunk marked `complete` is still `complete` after `kill -9`.
pub struct Store {
    downloads: sled::Tree,
    chunks: sled::Tree,
    host_caps: sled::Tree,
}

fn dl_key(url: &str, dest: &str) -> Result<Vec<u8>> {
    postcard::to_allocvec(&(url, dest)).map_err(|e| Error::Corrupted(e.to_string()))
}

/// First 8 bytes of SHA-1("<url>|<dest>") as a big-endian u64, used as the
/// chunk tree's composite-key prefix so a download's chunks sort contiguously
/// in index order without a secondary index structure.
fn dl_hash(url: &str, dest: &str) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(dest.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("sha1 digest is 20 bytes"))
}

fn chunk_key(url: &str, dest: &str, index: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&dl_hash(url, dest).to_be_bytes());
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn chunk_prefix(url: &str, dest: &str) -> [u8; 8] {
    dl_hash(url, dest).to_be_bytes()
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            downloads: db.open_tree("downloads")?,
            chunks: db.open_tree("chunks")?,
            host_caps: db.open_tree("host_caps")?,
        })
    }

    pub fn upsert_download(&self, record: &DownloadRecord) -> Result<()> {
        let key = dl_key(&record.url, &record.dest)?;
        let value = postcard::to_allocvec(record).map_err(|e| Error::Corrupted(e.to_string()))?;
        self.downloads.insert(key, value)?;
        Ok(())
    }

    pub fn get_download(&self, url: &str, dest: &str) -> Result<Option<DownloadRecord>> {
        let key = dl_key(url, dest)?;
        match self.downloads.get(key)? {
            Some(bytes) => {
                let record = postcard::from_bytes(&bytes).map_err(|e| Error::Corrupted(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Atomically increments the download's retry counter and returns the new value.
    pub fn increment_retry(&self, url: &str, dest: &str) -> Result<u32> {
        let key = dl_key(url, dest)?;
        let updated = self.downloads.fetch_and_update(&key, |existing| {
            existing.map(|bytes| {
                let mut record: DownloadRecord =
                    postcard::from_bytes(bytes).expect("download record corrupted in tree");
                record.retry_count += 1;
                postcard::to_allocvec(&record).expect("download record serializes")
            })
        })?;
        match updated {
            Some(bytes) => {
                let record: DownloadRecord =
                    postcard::from_bytes(&bytes).map_err(|e| Error::Corrupted(e.to_string()))?;
                Ok(record.retry_count)
            }
            None => Err(Error::NotFound),
        }
    }

    pub fn upsert_chunk(&self, url: &str, dest: &str, chunk: &ChunkRecord) -> Result<()> {
        let key = chunk_key(url, dest, chunk.index);
        let value = postcard::to_allocvec(chunk).map_err(|e| Error::Corrupted(e.to_string()))?;
        self.chunks.insert(key, value)?;
        Ok(())
    }

    /// Lists all chunks of a download, ordered by index.
    pub fn list_chunks(&self, url: &str, dest: &str) -> Result<Vec<ChunkRecord>> {
        let prefix = chunk_prefix(url, dest);
        let mut out = Vec::new();
        for entry in self.chunks.scan_prefix(prefix) {
            let (_, value) = entry?;
            let chunk: ChunkRecord = postcard::from_bytes(&value).map_err(|e| Error::Corrupted(e.to_string()))?;
            out.push(chunk);
        }
        out.sort_by_key(|c| c.index);
        Ok(out)
    }

    /// Deletes every chunk row for a download, used when switching to single-stream.
    pub fn delete_chunks(&self, url: &str, dest: &str) -> Result<()> {
        let prefix = chunk_prefix(url, dest);
        let keys: Vec<_> = self.chunks.scan_prefix(prefix).keys().collect::<std::result::Result<_, _>>()?;
        for key in keys {
            self.chunks.remove(key)?;
        }
        Ok(())
    }

    pub fn upsert_host_caps(&self, record: &HostCapsRecord) -> Result<()> {
        let value = postcard::to_allocvec(record).map_err(|e| Error::Corrupted(e.to_string()))?;
        self.host_caps.insert(record.host.as_bytes(), value)?;
        Ok(())
    }

    pub fn get_host_caps(&self, host: &str) -> Result<Option<HostCapsRecord>> {
        match self.host_caps.get(host.as_bytes())? {
            Some(bytes) => {
                let record = postcard::from_bytes(&bytes).map_err(|e| Error::Corrupted(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Finds the most recently created download row targeting `dest`,
    /// regardless of source url. Used by status queries where the caller
    /// only knows the local path it asked for.
    pub fn find_by_dest(&self, dest: &str) -> Result<Option<DownloadRecord>> {
        let mut best: Option<DownloadRecord> = None;
        for entry in self.downloads.iter() {
            let (_, value) = entry?;
            let record: DownloadRecord = postcard::from_bytes(&value).map_err(|e| Error::Corrupted(e.to_string()))?;
            if record.dest != dest {
                continue;
            }
            if best.as_ref().map(|b| record.created_at_unix > b.created_at_unix).unwrap_or(true) {
                best = Some(record);
            }
        }
        Ok(best)
    }

    /// Lists every download row matching `status`, for UI-facing status queries.
    pub fn list_downloads_by_status(
        &self,
        status: crate::model::DownloadStatus,
    ) -> Result<Vec<DownloadRecord>> {
        let mut out = Vec::new();
        for entry in self.downloads.iter() {
            let (_, value) = entry?;
            let record: DownloadRecord = postcard::from_bytes(&value).map_err(|e| Error::Corrupted(e.to_string()))?;
            if record.status == status {
                out.push(record);
            }
        }
        Ok(out)
    }
}
