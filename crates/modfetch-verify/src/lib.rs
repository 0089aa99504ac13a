//! Content verification primitives for downloaded artifacts.
//!
//! Provides incremental hashing and verification without enforcing a fixed
//! call site for when hashing happens: a `VerifiedReader` hashes bytes as a
//! caller reads them, so the CPU touches each byte once whether it's being
//! streamed into a positional writer or read back off disk for a repair pass.
//!
//! # Key Features
//!
//! - **Zero-copy verification**: hashing piggybacks on the read already happening
//! - **Incremental**: digests update as data streams through
//! - **Extensible**: the `Hasher` trait allows swapping in another digest
//!
//! ```
//! use modfetch_verify::{Sha256Hasher, VerifiedReader};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! std::io::copy(&mut reader, &mut buffer).unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::hasher::{DigestHasher, Hasher, Sha256Hasher};
pub use self::hex_digest::{from_hex, hash_file, hash_range, hash_reader, to_hex, verify_hex};
pub use self::reader::VerifiedReader;

mod error;
mod hasher;
mod hex_digest;
mod reader;
