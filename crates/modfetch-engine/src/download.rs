use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use modfetch_finalizer::{is_safetensors, publish, PublishOptions};
use modfetch_fs::PositionalFile;
use modfetch_planner::{derive_filename, plan_chunks, staging_path, ChunkBounds};
use modfetch_policy::EngineError;
use modfetch_state::{ChunkRecord, ChunkStatus, DownloadRecord, DownloadStatus, Store};
use modfetch_transport::{ProbeResult, Transport};
use modfetch_verify::{hash_file, hash_range};
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunked::{resume_verification, run_chunk};
use crate::config::EngineConfig;
use crate::convert::{finalizer_err, fs_err, io_err, state_err};
use crate::hosts::HostSemaphores;
use crate::single_stream::run_single_stream;

/// A single download call's inputs. `dest` and `expected_sha256` are
/// optional: an absent destination is derived from `Content-Disposition`/the
/// URL by the Planner; an absent expected hash skips the integrity check
/// against a caller-supplied value (the repair pass still runs against the
/// per-chunk hashes recorded during transfer).
pub struct DownloadRequest {
    pub url: String,
    pub dest: Option<PathBuf>,
    pub expected_sha256: Option<String>,
    pub headers: HeaderMap,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), dest: None, expected_sha256: None, headers: HeaderMap::new() }
    }

    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn expected_sha256(mut self, hash: impl Into<String>) -> Self {
        self.expected_sha256 = Some(hash.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub dest: PathBuf,
    pub sha256_hex: String,
    pub bytes: u64,
}

/// Wires the Transport, Planner, State store, Policy, and Finalizer
/// components into one `download` call.
pub struct Engine {
    transport: Transport,
    store: Store,
    config: EngineConfig,
    host_sems: HostSemaphores,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Store) -> Result<Self, EngineError> {
        let transport = Transport::new(&config.user_agent, config.max_redirects, config.timeout())?;
        let host_sems = HostSemaphores::new(config.per_host_requests);
        Ok(Self { transport, store, config, host_sems })
    }

    pub async fn download(&self, request: DownloadRequest, cancel: CancellationToken) -> Result<DownloadOutcome, EngineError> {
        let probe = self.transport.probe(&request.url, request.headers.clone()).await?;
        let dest = self.resolve_dest(&request, &probe);
        let dest_key = dest.to_string_lossy().into_owned();
        let host = host_of(&probe.final_url);

        let staging_path_buf = staging_path(&request.url, &dest, self.config.stage_partials, self.config.partials_root.as_deref());

        if self.config.always_no_resume {
            self.store.delete_chunks(&request.url, &dest_key).map_err(state_err)?;
            match std::fs::remove_file(&staging_path_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(e)),
            }
        }

        migrate_existing_destination(&dest, &staging_path_buf).map_err(io_err)?;

        let mut record = self
            .store
            .get_download(&request.url, &dest_key)
            .map_err(state_err)?
            .unwrap_or_else(|| DownloadRecord::new(request.url.clone(), dest_key.clone()));
        record.expected_hash = request.expected_sha256.clone();
        record.content_length = probe.size;
        record.etag = probe.validators.etag.clone();
        record.last_modified = probe.validators.last_modified.clone();
        record.status = DownloadStatus::Running;
        self.store.upsert_download(&record).map_err(state_err)?;

        let transfer_result = self.transfer(&request, &dest_key, &staging_path_buf, &probe, &host, &cancel).await;

        let whole_hash = match transfer_result {
            Ok(hash) => hash,
            Err(e) => return self.fail(&mut record, DownloadStatus::Error, e),
        };

        if let Some(expected) = &request.expected_sha256 {
            if !expected.eq_ignore_ascii_case(&whole_hash) {
                warn!(url = %request.url, "whole-file hash mismatch, starting one-shot repair pass");
                if let Err(e) = self.repair_once(&request, &dest_key, &staging_path_buf, &probe, &host, &cancel, expected).await {
                    return self.fail(&mut record, DownloadStatus::ChecksumMismatch, e);
                }
            }
        }

        let options = PublishOptions { safetensors: is_safetensors(&dest), deep_validate: self.config.safetensors_deep_verify_after_download };
        let published = match publish(&staging_path_buf, &dest, options).map_err(finalizer_err) {
            Ok(p) => p,
            Err(e) => return self.fail(&mut record, DownloadStatus::VerifyFailed, e),
        };

        self.store.delete_chunks(&request.url, &dest_key).map_err(state_err)?;
        record.status = DownloadStatus::Complete;
        record.actual_hash = Some(published.sha256_hex.clone());
        record.last_error = None;
        self.store.upsert_download(&record).map_err(state_err)?;

        let bytes = std::fs::metadata(&published.dest).map_err(io_err)?.len();
        info!(dest = %published.dest.display(), sha256 = %published.sha256_hex, "download complete");
        Ok(DownloadOutcome { dest: published.dest, sha256_hex: published.sha256_hex, bytes })
    }

    fn fail(&self, record: &mut DownloadRecord, status: DownloadStatus, error: EngineError) -> Result<DownloadOutcome, EngineError> {
        record.status = status;
        record.last_error = Some(error.to_string());
        let _ = self.store.upsert_download(record);
        Err(error)
    }

    fn resolve_dest(&self, request: &DownloadRequest, probe: &ProbeResult) -> PathBuf {
        match &request.dest {
            Some(d) => d.clone(),
            None => {
                let filename = derive_filename(probe.content_disposition.as_deref(), &probe.final_url);
                self.config.download_root.join(filename)
            }
        }
    }

    /// Executes the transfer (chunked, falling back to single-stream, or the
    /// immediate empty-object case) and returns the whole-file hex digest.
    async fn transfer(
        &self,
        request: &DownloadRequest,
        dest_key: &str,
        staging_path_buf: &Path,
        probe: &ProbeResult,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        match probe.size {
            Some(0) => {
                PositionalFile::create_sized(staging_path_buf, 0).map_err(fs_err)?;
                hash_file(staging_path_buf).map_err(io_err)
            }
            Some(size) if size > 0 && probe.accept_ranges => {
                self.run_chunked(request, dest_key, staging_path_buf, probe, host, cancel, size).await
            }
            _ => {
                run_single_stream(
                    &self.transport,
                    &self.config.backoff,
                    cancel,
                    &self.store,
                    &request.url,
                    dest_key,
                    &probe.final_url,
                    staging_path_buf,
                    &probe.validators,
                    request.headers.clone(),
                    probe.accept_ranges,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_chunked(
        &self,
        request: &DownloadRequest,
        dest_key: &str,
        staging_path_buf: &Path,
        probe: &ProbeResult,
        host: &str,
        cancel: &CancellationToken,
        total_size: u64,
    ) -> Result<String, EngineError> {
        let staging = PositionalFile::create_sized(staging_path_buf, total_size).map_err(fs_err)?;
        resume_verification(&self.store, &request.url, dest_key, &staging).await?;

        let planned = plan_chunks(total_size, self.config.chunk_size_bytes());
        let existing: HashMap<u32, ChunkRecord> =
            self.store.list_chunks(&request.url, dest_key).map_err(state_err)?.into_iter().map(|c| (c.index, c)).collect();

        for bounds in &planned {
            if !existing.contains_key(&bounds.index) {
                self.store
                    .upsert_chunk(&request.url, dest_key, &ChunkRecord { index: bounds.index, start: bounds.start, end: bounds.end, status: ChunkStatus::Pending, hash: None })
                    .map_err(state_err)?;
            }
        }

        let pending: Vec<ChunkBounds> = self
            .store
            .list_chunks(&request.url, dest_key)
            .map_err(state_err)?
            .into_iter()
            .filter(|c| c.status != ChunkStatus::Complete)
            .map(|c| ChunkBounds { index: c.index, start: c.start, end: c.end })
            .collect();

        let host_sem = self.host_sems.for_host(host);
        let width = self.config.worker_pool_width();
        let validators = probe.validators.clone();

        let results: Vec<Result<bool, EngineError>> = futures_util::stream::iter(pending.into_iter().map(|bounds| {
            let host_sem = host_sem.clone();
            let headers = request.headers.clone();
            let validators = &validators;
            let staging = &staging;
            async move { run_chunk(&self.transport, &self.store, &self.config.backoff, host_sem, cancel, &request.url, dest_key, staging, bounds, validators, headers).await }
        }))
        .buffer_unordered(width)
        .collect()
        .await;

        let mut range_ignored = false;
        for r in results {
            match r {
                Ok(true) => range_ignored = true,
                Ok(false) => {}
                Err(e) => return Err(e),
            }
        }

        if range_ignored {
            warn!(url = %request.url, "server ignored Range mid-transfer, falling back to single-stream");
            self.store.delete_chunks(&request.url, dest_key).map_err(state_err)?;
            return run_single_stream(
                &self.transport,
                &self.config.backoff,
                cancel,
                &self.store,
                &request.url,
                dest_key,
                &probe.final_url,
                staging_path_buf,
                &probe.validators,
                request.headers.clone(),
                false,
            )
            .await;
        }

        staging.sync_all().map_err(fs_err)?;
        let path = staging_path_buf.to_path_buf();
        tokio::task::spawn_blocking(move || hash_file(&path)).await.expect("hash task panicked").map_err(io_err)
    }

    /// Runs at most once: re-hashes every chunk on disk against its stored
    /// hash, refetches the ones that drifted, and recomputes the whole-file
    /// hash. Only meaningful for a chunked transfer — a single-stream
    /// mismatch has no per-chunk hashes to repair against.
    #[allow(clippy::too_many_arguments)]
    async fn repair_once(
        &self,
        request: &DownloadRequest,
        dest_key: &str,
        staging_path_buf: &Path,
        probe: &ProbeResult,
        host: &str,
        cancel: &CancellationToken,
        expected_hex: &str,
    ) -> Result<String, EngineError> {
        let chunks = self.store.list_chunks(&request.url, dest_key).map_err(state_err)?;
        if chunks.is_empty() {
            let actual = hash_file(staging_path_buf).map_err(io_err)?;
            return Err(EngineError::IntegrityMismatch { expected: expected_hex.to_string(), actual });
        }

        let staging = PositionalFile::open_existing(staging_path_buf).map_err(fs_err)?;
        for chunk in &chunks {
            let Some(expected_chunk_hash) = chunk.hash.clone() else { continue };
            let path = staging_path_buf.to_path_buf();
            let (start, end) = (chunk.start, chunk.end);
            let actual = tokio::task::spawn_blocking(move || hash_range(&path, start, end)).await.expect("hash task panicked").map_err(io_err)?;
            if actual != expected_chunk_hash {
                let mut dirty = chunk.clone();
                dirty.status = ChunkStatus::Dirty;
                self.store.upsert_chunk(&request.url, dest_key, &dirty).map_err(state_err)?;
            }
        }

        let dirty_bounds: Vec<ChunkBounds> = self
            .store
            .list_chunks(&request.url, dest_key)
            .map_err(state_err)?
            .into_iter()
            .filter(|c| c.status != ChunkStatus::Complete)
            .map(|c| ChunkBounds { index: c.index, start: c.start, end: c.end })
            .collect();

        let host_sem = self.host_sems.for_host(host);
        for bounds in dirty_bounds {
            let range_ignored = run_chunk(
                &self.transport,
                &self.store,
                &self.config.backoff,
                host_sem.clone(),
                cancel,
                &request.url,
                dest_key,
                &staging,
                bounds,
                &probe.validators,
                request.headers.clone(),
            )
            .await?;
            if range_ignored {
                return Err(EngineError::Transient { cause: "server ignored range during repair pass".to_string() });
            }
        }

        staging.sync_all().map_err(fs_err)?;
        let path = staging_path_buf.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || hash_file(&path)).await.expect("hash task panicked").map_err(io_err)?;
        if actual.eq_ignore_ascii_case(expected_hex) {
            Ok(actual)
        } else {
            Err(EngineError::IntegrityMismatch { expected: expected_hex.to_string(), actual })
        }
    }
}

fn migrate_existing_destination(dest: &Path, staging: &Path) -> std::io::Result<()> {
    if dest.exists() && !staging.exists() {
        std::fs::rename(dest, staging)?;
    }
    Ok(())
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default()
}
