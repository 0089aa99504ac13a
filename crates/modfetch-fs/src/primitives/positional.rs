//! A write-at-offset primitive for concurrent, non-overlapping writers to one file.
//!
//! Several workers hold the same `Arc<File>` and each writes only the byte range it
//! owns. No worker ever seeks the shared handle, so there is no cursor to race on.

use crate::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt as WindowsFileExt;

/// A handle to a file opened for positional I/O, shared across workers.
#[derive(Clone)]
pub struct PositionalFile {
    file: Arc<File>,
    path: PathBuf,
}

impl PositionalFile {
    /// Opens `path` for read/write, creating it if absent, and truncates (or
    /// extends, where the filesystem supports sparse files) it to `len` bytes.
    pub fn create_sized(path: impl AsRef<Path>, len: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Write { path: path.clone(), source: e })?;
        file.set_len(len).map_err(|e| Error::Write { path: path.clone(), source: e })?;
        Ok(Self { file: Arc::new(file), path })
    }

    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::options()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Read { path: path.clone(), source: e })?;
        Ok(Self { file: Arc::new(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `buf` at absolute offset `offset`, independent of any other
    /// in-flight write to a disjoint region of the same file.
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<()> {
        #[cfg(unix)]
        {
            self.file
                .write_all_at(buf, offset)
                .map_err(|e| Error::Write { path: self.path.clone(), source: e })
        }
        #[cfg(windows)]
        {
            let mut written = 0usize;
            while written < buf.len() {
                let n = self
                    .file
                    .seek_write(&buf[written..], offset + written as u64)
                    .map_err(|e| Error::Write { path: self.path.clone(), source: e })?;
                if n == 0 {
                    return Err(Error::Write {
                        path: self.path.clone(),
                        source: std::io::Error::other("seek_write returned zero bytes written"),
                    });
                }
                written += n;
            }
            Ok(())
        }
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        #[cfg(unix)]
        {
            self.file
                .read_exact_at(buf, offset)
                .map_err(|e| Error::Read { path: self.path.clone(), source: e })
        }
        #[cfg(windows)]
        {
            let mut read = 0usize;
            while read < buf.len() {
                let n = self
                    .file
                    .seek_read(&mut buf[read..], offset + read as u64)
                    .map_err(|e| Error::Read { path: self.path.clone(), source: e })?;
                if n == 0 {
                    return Err(Error::Read {
                        path: self.path.clone(),
                        source: std::io::Error::other("seek_read hit eof early"),
                    });
                }
                read += n;
            }
            Ok(())
        }
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all().map_err(|e| Error::Write { path: self.path.clone(), source: e })
    }

    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| Error::Read { path: self.path.clone(), source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn disjoint_concurrent_writes_produce_exact_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("staging.part");
        let total = 64usize;
        let pf = PositionalFile::create_sized(&path, total as u64).unwrap();

        let expected: Vec<u8> = (0..total as u8).collect();
        let chunk_size = 8;
        thread::scope(|scope| {
            for (i, chunk) in expected.chunks(chunk_size).enumerate() {
                let pf = pf.clone();
                let chunk = chunk.to_vec();
                scope.spawn(move || {
                    pf.write_at((i * chunk_size) as u64, &chunk).unwrap();
                });
            }
        });

        let mut actual = vec![0u8; total];
        pf.read_at(0, &mut actual).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn create_sized_truncates_to_requested_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sparse.part");
        let pf = PositionalFile::create_sized(&path, 4096).unwrap();
        assert_eq!(pf.len().unwrap(), 4096);
    }
}
