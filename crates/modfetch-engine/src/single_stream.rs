use futures_util::StreamExt;
use modfetch_fs::PositionalFile;
use modfetch_policy::{BackoffPolicy, EngineError};
use modfetch_state::Store;
use modfetch_transport::{StreamOutcome, Transport, Validators};
use modfetch_verify::hash_file;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::convert::{fs_err, io_err};
use crate::retry::with_retry;

/// Linear single-stream download, used when the server doesn't support
/// ranges. Resumes from the staging file's current length when one already
/// exists and the server previously confirmed range support; a 200 despite
/// the resume header means the server doesn't honor it, so the writer
/// truncates and restarts from zero.
#[allow(clippy::too_many_arguments)]
pub async fn run_single_stream(
    transport: &Transport,
    backoff: &BackoffPolicy,
    cancel: &CancellationToken,
    store: &Store,
    store_url: &str,
    dest: &str,
    fetch_url: &str,
    staging_path: &std::path::Path,
    validators: &Validators,
    headers: HeaderMap,
    server_supports_range: bool,
) -> Result<String, EngineError> {
    let existing_len = std::fs::metadata(staging_path).map(|m| m.len()).unwrap_or(0);
    let resume_from = if server_supports_range && existing_len > 0 { Some(existing_len) } else { None };

    let outcome = with_retry(backoff, cancel, store, store_url, dest, |_attempt| {
        let headers = headers.clone();
        async move { transport.fetch_stream(fetch_url, resume_from, validators, headers).await }
    })
    .await?;

    match outcome {
        StreamOutcome::RangeNotSatisfiable => {
            debug!("resume offset already at server's reported size, treating as complete");
        }
        StreamOutcome::Full(resp) => {
            let staging = PositionalFile::create_sized(staging_path, 0).map_err(fs_err)?;
            stream_into(resp, &staging, 0, cancel).await?;
        }
        StreamOutcome::Resumed(resp) => {
            let staging = PositionalFile::open_existing(staging_path).map_err(fs_err)?;
            stream_into(resp, &staging, existing_len, cancel).await?;
        }
    }

    hash_file(staging_path).map_err(io_err)
}

async fn stream_into(resp: reqwest::Response, staging: &PositionalFile, mut offset: u64, cancel: &CancellationToken) -> Result<(), EngineError> {
    let mut stream = resp.bytes_stream();
    loop {
        let next = tokio::select! {
            n = stream.next() => n,
            _ = cancel.cancelled() => return Err(EngineError::Transient { cause: "cancelled".to_string() }),
        };
        match next {
            Some(Ok(bytes)) => {
                staging.write_at(offset, &bytes).map_err(fs_err)?;
                offset += bytes.len() as u64;
            }
            Some(Err(e)) => return Err(EngineError::Transient { cause: e.to_string() }),
            None => break,
        }
    }
    staging.sync_all().map_err(fs_err)?;
    Ok(())
}
