//! Error taxonomy, retry/backoff strategy, and host-advisory policy shared by
//! the transport and engine crates.

mod backoff;
mod error;
mod registry;

pub use backoff::{parse_retry_after, BackoffPolicy, RetryDecision};
pub use error::{EngineError, Result};
pub use registry::{lookup as lookup_known_host, HostHint};
