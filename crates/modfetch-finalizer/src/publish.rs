use std::fs::{self, File};
use std::path::Path;

use modfetch_verify::hash_file;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::safetensors;

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Whether `dest`'s extension marks it as a safetensors container that
    /// should be reconciled (truncated to its declared length) after publish.
    pub safetensors: bool,
    /// Run the expensive per-tensor shape/dtype check in addition to length
    /// reconciliation. No effect unless `safetensors` is also set.
    pub deep_validate: bool,
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub dest: std::path::PathBuf,
    pub sha256_hex: String,
    pub sidecar: std::path::PathBuf,
}

/// Publishes a finished staging file to its final destination:
///
/// 1. fsync the staging file
/// 2. if `safetensors`, reconcile the staging file's length against its header
/// 3. rename into place (falling back to copy+delete across devices)
/// 4. recompute the whole-file hash
/// 5. write a `<dest>.sha256` sidecar and fsync it plus the parent directory
///
/// Steps 2 runs before the rename so a file short of its declared length
/// fails before anything is visible at `dest`.
pub fn publish(staging: &Path, dest: &Path, options: PublishOptions) -> Result<PublishOutcome> {
    fsync_file(staging)?;

    if options.safetensors {
        let header = safetensors::parse_header(staging)?;
        if options.deep_validate {
            safetensors::deep_validate(&header, staging)?;
        }
        safetensors::reconcile_length(staging)?;
    }

    rename_or_copy(staging, dest)?;

    let sha256_hex = hash_file(dest).map_err(|e| Error::Io { path: dest.to_path_buf(), source: e })?;
    debug!(path = %dest.display(), sha256 = %sha256_hex, "recomputed whole-file digest after publish");

    let sidecar = sidecar_path(dest);
    fs::write(&sidecar, format!("{sha256_hex}  {}\n", file_name_lossy(dest)))
        .map_err(|e| Error::Io { path: sidecar.clone(), source: e })?;
    fsync_file(&sidecar)?;
    fsync_dir(dest.parent().unwrap_or_else(|| Path::new(".")))?;

    info!(path = %dest.display(), "published download");

    Ok(PublishOutcome { dest: dest.to_path_buf(), sha256_hex, sidecar })
}

pub fn sidecar_path(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".sha256");
    std::path::PathBuf::from(name)
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn fsync_file(path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| Error::Io { path: path.to_path_buf(), source: e })?;
    file.sync_all().map_err(|e| Error::Io { path: path.to_path_buf(), source: e })
}

fn fsync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let file = File::open(dir).map_err(|e| Error::Io { path: dir.to_path_buf(), source: e })?;
        file.sync_all().map_err(|e| Error::Io { path: dir.to_path_buf(), source: e })?;
    }
    // Directory handles can't be opened for sync on Windows; renames there
    // are already durable once the file itself is flushed.
    let _ = dir;
    Ok(())
}

/// Renames `staging` to `dest`, falling back to copy+delete when the two
/// paths live on different filesystems (EXDEV) — e.g. a staging directory
/// configured on a different mount than the destination.
fn rename_or_copy(staging: &Path, dest: &Path) -> Result<()> {
    match fs::rename(staging, dest) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(from = %staging.display(), to = %dest.display(), "cross-device rename, falling back to copy");
            fs::copy(staging, dest).map_err(|e| Error::Io { path: dest.to_path_buf(), source: e })?;
            fs::remove_file(staging).map_err(|e| Error::Io { path: staging.to_path_buf(), source: e })?;
            Ok(())
        }
        Err(e) => Err(Error::Io { path: dest.to_path_buf(), source: e }),
    }
}

fn is_cross_device(e: &std::io::Error) -> bool {
    const EXDEV: i32 = 18;
    e.raw_os_error() == Some(EXDEV)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn publish_renames_and_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("file.part");
        fs::write(&staging, b"hello world").unwrap();
        let dest = dir.path().join("file.bin");

        let outcome = publish(&staging, &dest, PublishOptions::default()).unwrap();

        assert!(dest.exists());
        assert!(!staging.exists());
        assert_eq!(outcome.sha256_hex, hash_file(&dest).unwrap());
        let sidecar_contents = fs::read_to_string(&outcome.sidecar).unwrap();
        assert!(sidecar_contents.starts_with(&outcome.sha256_hex));
    }

    #[test]
    fn publish_reconciles_safetensors_trailing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("model.part");

        let header_json = serde_json::json!({
            "w": { "dtype": "F32", "shape": [1], "data_offsets": [0, 4] }
        });
        let header_bytes = serde_json::to_vec(&header_json).unwrap();
        let mut file = File::create(&staging).unwrap();
        file.write_all(&(header_bytes.len() as u64).to_le_bytes()).unwrap();
        file.write_all(&header_bytes).unwrap();
        file.write_all(&[0u8; 4]).unwrap();
        file.write_all(b"garbage-trailer").unwrap();
        drop(file);

        let dest = dir.path().join("model.safetensors");
        let options = PublishOptions { safetensors: true, deep_validate: true };
        publish(&staging, &dest, options).unwrap();

        let header = safetensors::parse_header(&dest).unwrap();
        assert_eq!(fs::metadata(&dest).unwrap().len(), header.declared_total_len());
    }

    #[test]
    fn publish_fails_without_publishing_short_safetensors_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("model.part");

        let header_json = serde_json::json!({
            "w": { "dtype": "F32", "shape": [1], "data_offsets": [0, 4] }
        });
        let header_bytes = serde_json::to_vec(&header_json).unwrap();
        let mut file = File::create(&staging).unwrap();
        file.write_all(&(header_bytes.len() as u64).to_le_bytes()).unwrap();
        file.write_all(&header_bytes).unwrap();
        // declared 4 bytes of tensor data, write none: file is short.
        drop(file);

        let dest = dir.path().join("model.safetensors");
        let options = PublishOptions { safetensors: true, deep_validate: false };
        let err = publish(&staging, &dest, options).unwrap_err();

        assert!(matches!(err, Error::SafetensorsIncomplete { .. }));
        assert!(!dest.exists());
        assert!(staging.exists());
    }
}
