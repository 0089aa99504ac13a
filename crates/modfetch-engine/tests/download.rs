use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use modfetch_engine::{DownloadRequest, Engine, EngineConfig};
use modfetch_policy::BackoffPolicy;
use modfetch_state::Store;
use modfetch_verify::{to_hex, Sha256Hasher};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy { max_attempts: 4, min_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), retry_after_cap: Duration::from_secs(1) }
}

fn engine(dir: &std::path::Path) -> (Engine, PathBuf) {
    let store = Store::open(dir.join("state.sled")).unwrap();
    let config = EngineConfig { backoff: fast_backoff(), download_root: dir.to_path_buf(), timeout_seconds: 5, ..Default::default() };
    (Engine::new(config, store).unwrap(), dir.join("dest.bin"))
}

fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256Hasher::digest(data))
}

#[tokio::test]
async fn happy_chunked_download_verifies_and_publishes() {
    let server = MockServer::start().await;
    let body = b"hello world".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/f"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string().as_str()).insert_header("accept-ranges", "bytes"))
        .mount(&server)
        .await;
    Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(206).set_body_bytes(body.clone())).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (engine, dest) = engine(dir.path());
    let request = DownloadRequest::new(format!("{}/f", server.uri())).dest(&dest).expected_sha256(sha256_hex(&body));

    let outcome = engine.download(request, CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(outcome.sha256_hex, sha256_hex(&body));
    assert!(!dest.with_extension("bin.part").exists());
}

#[tokio::test]
async fn transient_chunk_error_is_retried_until_success() {
    let server = MockServer::start().await;
    let body = b"retry me please".to_vec();
    let attempt = AtomicU32::new(0);
    Mock::given(method("HEAD"))
        .and(path("/f"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string().as_str()).insert_header("accept-ranges", "bytes"))
        .mount(&server)
        .await;
    let retry_body = body.clone();
    Mock::given(method("GET"))
        .and(path("/f"))
        .respond_with(move |_: &wiremock::Request| {
            if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(206).set_body_bytes(retry_body.clone())
            }
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (engine, dest) = engine(dir.path());
    let request = DownloadRequest::new(format!("{}/f", server.uri())).dest(&dest);

    let outcome = engine.download(request, CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(outcome.sha256_hex, sha256_hex(&body));
}

#[tokio::test]
async fn missing_range_support_falls_back_to_single_stream() {
    let server = MockServer::start().await;
    let body = b"no ranges here".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/f"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string().as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone())).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (engine, dest) = engine(dir.path());
    let request = DownloadRequest::new(format!("{}/f", server.uri())).dest(&dest);

    let outcome = engine.download(request, CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(outcome.sha256_hex, sha256_hex(&body));
}

#[tokio::test]
async fn checksum_mismatch_without_chunk_history_is_terminal() {
    let server = MockServer::start().await;
    let body = b"this is not what you expected".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/f"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string().as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone())).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (engine, dest) = engine(dir.path());
    let request = DownloadRequest::new(format!("{}/f", server.uri())).dest(&dest).expected_sha256("0".repeat(64));

    let err = engine.download(request, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, modfetch_policy::EngineError::IntegrityMismatch { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn server_ignoring_range_falls_back_mid_transfer() {
    let server = MockServer::start().await;
    let body = b"served whole regardless of range".to_vec();
    Mock::given(method("HEAD"))
        .and(path("/f"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", body.len().to_string().as_str()).insert_header("accept-ranges", "bytes"))
        .mount(&server)
        .await;
    // Every GET — ranged or not — gets the full 200 body, simulating a CDN
    // that advertises range support but doesn't actually honor it.
    Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone())).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (engine, dest) = engine(dir.path());
    let request = DownloadRequest::new(format!("{}/f", server.uri())).dest(&dest);

    let outcome = engine.download(request, CancellationToken::new()).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(outcome.sha256_hex, sha256_hex(&body));
}
