//! HTTP probing, ranged chunk fetches, reachability checks, and redirect-scoped
//! authorization for the download engine.

mod client;
mod fetch;
mod probe;
mod reachable;
mod validators;

pub use fetch::{fetch_chunk, fetch_stream, ChunkOutcome, StreamOutcome};
pub use probe::{probe, ProbeResult};
pub use reachable::reachable;
pub use validators::Validators;

use std::time::Duration;

use modfetch_policy::EngineError;
use reqwest::header::HeaderMap;
use reqwest::Client;

/// A configured pair of HTTP clients (redirect-following and not) shared by
/// every operation against one engine instance.
#[derive(Clone)]
pub struct Transport {
    following: Client,
    non_following: Client,
}

impl Transport {
    pub fn new(user_agent: &str, max_redirects: usize, timeout: Duration) -> Result<Self, EngineError> {
        Ok(Self {
            following: client::build_client(user_agent, max_redirects, timeout)?,
            non_following: client::build_no_redirect_client(user_agent, timeout)?,
        })
    }

    pub async fn probe(&self, url: &str, headers: HeaderMap) -> Result<ProbeResult, EngineError> {
        probe::probe(&self.following, &self.non_following, url, headers).await
    }

    pub async fn fetch_chunk(
        &self,
        url: &str,
        start: u64,
        end: u64,
        validators: &Validators,
        headers: HeaderMap,
    ) -> Result<ChunkOutcome, EngineError> {
        fetch::fetch_chunk(&self.following, url, start, end, validators, headers).await
    }

    pub async fn reachable(&self, url: &str, headers: HeaderMap, timeout: Duration) -> (bool, String) {
        reachable::reachable(&self.following, url, headers, timeout).await
    }

    pub async fn fetch_stream(
        &self,
        url: &str,
        resume_from: Option<u64>,
        validators: &Validators,
        headers: HeaderMap,
    ) -> Result<StreamOutcome, EngineError> {
        fetch::fetch_stream(&self.following, url, resume_from, validators, headers).await
    }

    pub fn http_client(&self) -> &Client {
        &self.following
    }
}
