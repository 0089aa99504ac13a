use std::sync::Arc;

use futures_util::StreamExt;
use modfetch_fs::PositionalFile;
use modfetch_planner::ChunkBounds;
use modfetch_policy::{BackoffPolicy, EngineError, RetryDecision};
use modfetch_state::{ChunkRecord, ChunkStatus, Store};
use modfetch_transport::{ChunkOutcome, Transport, Validators};
use modfetch_verify::{hash_range, to_hex, Hasher, Sha256Hasher};
use reqwest::header::HeaderMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::convert::{fs_err, state_err};
use crate::retry::{mark_recovered, record_retry};

/// Re-hashes every chunk the state store believes is already complete
/// against the bytes actually on disk, demoting any mismatch to `Dirty` so
/// it gets refetched. Catches out-of-band corruption between runs.
pub async fn resume_verification(store: &Store, url: &str, dest: &str, staging: &PositionalFile) -> Result<(), EngineError> {
    let chunks = store.list_chunks(url, dest).map_err(state_err)?;
    for chunk in chunks {
        if chunk.status != ChunkStatus::Complete {
            continue;
        }
        let Some(expected) = chunk.hash.clone() else { continue };
        let path = staging.path().to_path_buf();
        let actual = tokio::task::spawn_blocking(move || hash_range(&path, chunk.start, chunk.end))
            .await
            .expect("resume verification task panicked")
            .map_err(crate::convert::io_err)?;
        if actual != expected {
            warn!(index = chunk.index, "chunk failed resume verification, marking dirty");
            let mut dirty = chunk;
            dirty.status = ChunkStatus::Dirty;
            store.upsert_chunk(url, dest, &dirty).map_err(state_err)?;
        }
    }
    Ok(())
}

/// Outcome of fetching one chunk's response: either a body stream to write,
/// or a signal that the server ignored the `Range` header entirely — which
/// means the whole download must fall back to single-stream.
enum ChunkFetchOutcome {
    Body(reqwest::Response),
    RangeIgnored,
}

#[allow(clippy::too_many_arguments)]
async fn fetch_chunk_with_retry(
    transport: &Transport,
    store: &Store,
    backoff: &BackoffPolicy,
    host_sem: &Arc<Semaphore>,
    cancel: &CancellationToken,
    url: &str,
    dest: &str,
    bounds: ChunkBounds,
    validators: &Validators,
    headers: HeaderMap,
) -> Result<ChunkFetchOutcome, EngineError> {
    let mut attempt = 0u32;
    loop {
        let permit = tokio::select! {
            p = host_sem.clone().acquire_owned() => p.expect("host semaphore never closed"),
            _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
        };

        let call = transport.fetch_chunk(url, bounds.start, bounds.end, validators, headers.clone());
        let outcome = tokio::select! {
            r = call => r,
            _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
        };
        drop(permit);

        match outcome {
            Ok(ChunkOutcome::Partial(resp)) => {
                mark_recovered(store, url, dest);
                return Ok(ChunkFetchOutcome::Body(resp));
            }
            Ok(ChunkOutcome::FullBody(_)) => {
                mark_recovered(store, url, dest);
                return Ok(ChunkFetchOutcome::RangeIgnored);
            }
            Err(e) => {
                let (decision, delay) = backoff.decide(attempt, &e);
                if decision == RetryDecision::GiveUp {
                    return Err(e);
                }
                record_retry(store, url, dest, &e);
                attempt += 1;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
                }
            }
        }
    }
}

/// Fetches one chunk end to end: mark running, fetch with retry, write the
/// body positionally while hashing it, mark complete. Returns `Ok(true)` if
/// the server signaled it ignored `Range` (caller should abandon the chunked
/// plan and fall back to single-stream).
#[allow(clippy::too_many_arguments)]
pub async fn run_chunk(
    transport: &Transport,
    store: &Store,
    backoff: &BackoffPolicy,
    host_sem: Arc<Semaphore>,
    cancel: &CancellationToken,
    url: &str,
    dest: &str,
    staging: &PositionalFile,
    bounds: ChunkBounds,
    validators: &Validators,
    headers: HeaderMap,
) -> Result<bool, EngineError> {
    store
        .upsert_chunk(url, dest, &ChunkRecord { index: bounds.index, start: bounds.start, end: bounds.end, status: ChunkStatus::Running, hash: None })
        .map_err(state_err)?;

    let outcome = fetch_chunk_with_retry(transport, store, backoff, &host_sem, cancel, url, dest, bounds, validators, headers).await?;

    let resp = match outcome {
        ChunkFetchOutcome::Body(resp) => resp,
        ChunkFetchOutcome::RangeIgnored => return Ok(true),
    };

    let mut hasher = Sha256Hasher::new();
    let mut offset = bounds.start;
    let mut stream = resp.bytes_stream();
    loop {
        let next = tokio::select! {
            n = stream.next() => n,
            _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
        };
        match next {
            Some(Ok(bytes)) => {
                hasher.update(&bytes);
                staging.write_at(offset, &bytes).map_err(fs_err)?;
                offset += bytes.len() as u64;
            }
            Some(Err(e)) => return Err(EngineError::Transient { cause: e.to_string() }),
            None => break,
        }
    }

    let digest_hex = to_hex(&hasher.finalize());
    debug!(index = bounds.index, hash = %digest_hex, "chunk complete");
    store
        .upsert_chunk(url, dest, &ChunkRecord { index: bounds.index, start: bounds.start, end: bounds.end, status: ChunkStatus::Complete, hash: Some(digest_hex) })
        .map_err(state_err)?;
    Ok(false)
}
