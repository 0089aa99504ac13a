use std::time::Duration;

use modfetch_policy::EngineError;
use reqwest::{redirect, Client};

pub fn build_client(
    user_agent: &str,
    max_redirects: usize,
    timeout: Duration,
) -> Result<Client, EngineError> {
    // `redirect::Policy::limited` already strips Authorization/Cookie/WWW-Authenticate
    // headers on any redirect whose target host differs from the original request's
    // host — this is the mechanism the same-host auth-scoping contract relies on.
    Client::builder()
        .user_agent(user_agent)
        .redirect(redirect::Policy::limited(max_redirects))
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Fatal { reason: format!("failed to build HTTP client: {e}") })
}

/// A client that never follows redirects, for the manual one-hop resolution
/// fallback used when a probe needs to see the raw `Location` header.
pub fn build_no_redirect_client(user_agent: &str, timeout: Duration) -> Result<Client, EngineError> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Fatal { reason: format!("failed to build HTTP client: {e}") })
}
