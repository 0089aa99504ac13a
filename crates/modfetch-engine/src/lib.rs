//! Orchestrates the Transport, Planner, State, Policy, and Finalizer crates
//! into a single resumable, verified download.

mod chunked;
mod config;
mod convert;
mod download;
mod hosts;
mod retry;
mod single_stream;

pub use config::EngineConfig;
pub use download::{DownloadOutcome, DownloadRequest, Engine};
pub use modfetch_policy::EngineError;
