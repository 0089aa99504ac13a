//! Filesystem primitives for staging downloaded artifacts: positional
//! (write-at-offset) writes into a shared staging file, shared by concurrent
//! chunk workers writing disjoint byte ranges of the same file.

mod error;
mod primitives;

pub use error::{Error, Result};

pub use primitives::PositionalFile;
