use std::future::Future;

use modfetch_policy::{BackoffPolicy, EngineError, RetryDecision};
use modfetch_state::{DownloadStatus, Store};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Drives `attempt_fn` through the shared retry/backoff strategy until it
/// succeeds, the policy gives up, or `cancel` fires. `attempt_fn` receives
/// the zero-based attempt number so it can annotate logs/state. Every retry
/// advances the download record's retry counter; a rate-limit response also
/// parks the record in `hold` until the next attempt recovers.
#[allow(clippy::too_many_arguments)]
pub async fn with_retry<T, F, Fut>(
    backoff: &BackoffPolicy,
    cancel: &CancellationToken,
    store: &Store,
    url: &str,
    dest: &str,
    mut attempt_fn: F,
) -> Result<T, EngineError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0u32;
    loop {
        let result = tokio::select! {
            r = attempt_fn(attempt) => r,
            _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
        };

        match result {
            Ok(v) => {
                mark_recovered(store, url, dest);
                return Ok(v);
            }
            Err(e) => {
                let (decision, delay) = backoff.decide(attempt, &e);
                if decision == RetryDecision::GiveUp {
                    return Err(e);
                }
                record_retry(store, url, dest, &e);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after error: {e}");
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
                }
            }
        }
    }
}

/// Advances the download record's retry counter and, for a rate-limit
/// response, parks the record in `hold` with a `last_error` naming the
/// server's `retry-after`. Best-effort: a state-store failure here must not
/// override the transport error already in flight.
pub(crate) fn record_retry(store: &Store, url: &str, dest: &str, error: &EngineError) {
    let _ = store.increment_retry(url, dest);
    if let EngineError::RateLimited { retry_after } = error {
        if let Ok(Some(mut record)) = store.get_download(url, dest) {
            record.status = DownloadStatus::Hold;
            record.last_error = Some(format!("rate limited, retry-after={}", retry_after.map(|d| d.as_secs()).unwrap_or(0)));
            let _ = store.upsert_download(&record);
        }
    }
}

/// Restores a `hold`ed download record to `running` once an attempt
/// succeeds. A no-op if the record was never held.
pub(crate) fn mark_recovered(store: &Store, url: &str, dest: &str) {
    if let Ok(Some(mut record)) = store.get_download(url, dest) {
        if record.status == DownloadStatus::Hold {
            record.status = DownloadStatus::Running;
            let _ = store.upsert_download(&record);
        }
    }
}
