//! Hex-string digest helpers. The engine and state store exchange hashes as
//! lowercase hex (the conventional `sha256sum` representation), never raw bytes.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::{Hasher, Result, Sha256Hasher, VerificationError};

pub fn to_hex(digest: &[u8]) -> String {
    hex::encode(digest)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim()).map_err(|_| VerificationError::InvalidHex(s.to_string()))
}

/// Case-insensitive comparison between a computed digest and an expected hex string.
pub fn verify_hex(actual: &[u8], expected_hex: &str) -> Result<()> {
    let expected = from_hex(expected_hex)?;
    if actual == expected.as_slice() {
        Ok(())
    } else {
        Err(VerificationError::Mismatch { expected, actual: actual.to_vec() })
    }
}

/// Hashes an entire reader to completion, returning the lowercase hex digest.
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

/// Hashes the entire file at `path`.
pub fn hash_file(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

/// Hashes the inclusive byte range `[start, end]` of an open file, without
/// disturbing any other reader sharing the same path (opens its own handle).
pub fn hash_range(path: impl AsRef<Path>, start: u64, end: u64) -> io::Result<String> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let mut remaining = end - start + 1;
    let mut hasher = Sha256Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "file shorter than requested range"));
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    Ok(to_hex(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let digest = Sha256Hasher::digest(b"hello world");
        let hex = to_hex(&digest);
        assert_eq!(from_hex(&hex).unwrap(), digest);
    }

    #[test]
    fn verify_hex_is_case_insensitive() {
        let digest = Sha256Hasher::digest(b"abc");
        let upper = to_hex(&digest).to_uppercase();
        assert!(verify_hex(&digest, &upper).is_ok());
    }

    #[test]
    fn hash_reader_matches_digest() {
        let mut cursor = std::io::Cursor::new(b"hello world".to_vec());
        let hex = hash_reader(&mut cursor).unwrap();
        assert_eq!(hex, to_hex(&Sha256Hasher::digest(b"hello world")));
    }

    #[test]
    fn hash_range_hashes_only_the_slice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let got = hash_range(&path, 2, 5).unwrap();
        let want = to_hex(&Sha256Hasher::digest(b"2345"));
        assert_eq!(got, want);
    }
}
