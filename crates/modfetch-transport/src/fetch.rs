use modfetch_policy::EngineError;
use reqwest::header::{HeaderMap, HeaderValue, IF_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};

use crate::validators::Validators;

/// Outcome of a single ranged-GET attempt. The caller (the chunked writer)
/// decides how to react — in particular, `FullBody` on a chunked request
/// means the server ignored `Range` and the download must fall back to
/// single-stream.
pub enum ChunkOutcome {
    Partial(Response),
    FullBody(Response),
}

/// Outcome of a single-stream GET, used by the non-chunked fallback path.
pub enum StreamOutcome {
    /// Full body from byte 0 — start (or restart) writing from scratch.
    Full(Response),
    /// 206 honoring a `Range: bytes=<n>-` resume request.
    Resumed(Response),
    /// 416: the resume offset is at or past the server's current size,
    /// which the spec treats as "already fully present locally".
    RangeNotSatisfiable,
}

/// Issues a single GET for the whole resource, or — when `resume_from` is
/// set — a `Range: bytes=<n>-` request to continue a partially-written file.
pub async fn fetch_stream(
    client: &Client,
    url: &str,
    resume_from: Option<u64>,
    validators: &Validators,
    mut headers: HeaderMap,
) -> Result<StreamOutcome, EngineError> {
    if let Some(offset) = resume_from {
        headers.insert(
            RANGE,
            HeaderValue::from_str(&format!("bytes={offset}-")).expect("well-formed range header"),
        );
        if let Some(v) = validators.if_range_value() {
            if let Ok(value) = HeaderValue::from_str(v) {
                headers.insert(IF_RANGE, value);
            }
        }
    }

    let resp = client.get(url).headers(headers).send().await.map_err(to_engine_error)?;
    match resp.status() {
        StatusCode::OK => Ok(StreamOutcome::Full(resp)),
        StatusCode::PARTIAL_CONTENT if resume_from.is_some() => Ok(StreamOutcome::Resumed(resp)),
        StatusCode::RANGE_NOT_SATISFIABLE if resume_from.is_some() => Ok(StreamOutcome::RangeNotSatisfiable),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| modfetch_policy::parse_retry_after(v, std::time::SystemTime::now()));
            Err(EngineError::RateLimited { retry_after })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EngineError::AuthRejected {
            host: resp.url().host_str().unwrap_or_default().to_string(),
            status: resp.status().as_u16(),
        }),
        status if status.is_server_error() => Err(EngineError::Transient { cause: format!("server error {status}") }),
        status => Err(EngineError::Transient { cause: format!("unexpected status {status}") }),
    }
}

fn to_engine_error(e: reqwest::Error) -> EngineError {
    EngineError::Transient { cause: e.to_string() }
}

/// Issues a single `Range` GET for `[start, end]` inclusive, with `If-Range`
/// set from `validators` when available.
pub async fn fetch_chunk(
    client: &Client,
    url: &str,
    start: u64,
    end: u64,
    validators: &Validators,
    mut headers: HeaderMap,
) -> Result<ChunkOutcome, EngineError> {
    headers.insert(
        RANGE,
        HeaderValue::from_str(&format!("bytes={start}-{end}")).expect("well-formed range header"),
    );
    if let Some(v) = validators.if_range_value() {
        if let Ok(value) = HeaderValue::from_str(v) {
            headers.insert(IF_RANGE, value);
        }
    }

    let resp = client.get(url).headers(headers).send().await.map_err(to_engine_error)?;
    classify_response(resp, start, end).await
}

async fn classify_response(resp: Response, start: u64, end: u64) -> Result<ChunkOutcome, EngineError> {
    match resp.status() {
        StatusCode::PARTIAL_CONTENT => Ok(ChunkOutcome::Partial(resp)),
        StatusCode::OK if start == 0 => Ok(ChunkOutcome::FullBody(resp)),
        StatusCode::OK => Err(EngineError::Transient {
            cause: format!("server ignored range bytes={start}-{end} and returned a full 200 body"),
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| modfetch_policy::parse_retry_after(v, std::time::SystemTime::now()));
            Err(EngineError::RateLimited { retry_after })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EngineError::AuthRejected {
            host: resp.url().host_str().unwrap_or_default().to_string(),
            status: resp.status().as_u16(),
        }),
        status if status.is_server_error() => Err(EngineError::Transient { cause: format!("server error {status}") }),
        status => Err(EngineError::Transient { cause: format!("unexpected status {status}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn partial_content_is_classified_as_partial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f"))
            .and(header("range", "bytes=0-9"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0u8; 10]))
            .mount(&server)
            .await;

        let client = Client::new();
        let outcome = fetch_chunk(&client, &format!("{}/f", server.uri()), 0, 9, &Validators::default(), HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::Partial(_)));
    }

    #[tokio::test]
    async fn full_200_on_first_chunk_is_accepted_as_full_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20])).mount(&server).await;

        let client = Client::new();
        let outcome = fetch_chunk(&client, &format!("{}/f", server.uri()), 0, 19, &Validators::default(), HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ChunkOutcome::FullBody(_)));
    }

    #[tokio::test]
    async fn full_200_on_a_non_first_chunk_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20])).mount(&server).await;

        let client = Client::new();
        let err = fetch_chunk(&client, &format!("{}/f", server.uri()), 10, 19, &Validators::default(), HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Transient { .. }));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = fetch_chunk(&client, &format!("{}/f", server.uri()), 0, 9, &Validators::default(), HeaderMap::new())
            .await
            .unwrap_err();
        match err {
            EngineError::RateLimited { retry_after } => assert_eq!(retry_after, Some(std::time::Duration::from_secs(5))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_without_resume_accepts_full_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 20])).mount(&server).await;

        let client = Client::new();
        let outcome = fetch_stream(&client, &format!("{}/f", server.uri()), None, &Validators::default(), HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(outcome, StreamOutcome::Full(_)));
    }

    #[tokio::test]
    async fn stream_resume_accepts_206() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f"))
            .and(header("range", "bytes=10-"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0u8; 10]))
            .mount(&server)
            .await;

        let client = Client::new();
        let outcome = fetch_stream(&client, &format!("{}/f", server.uri()), Some(10), &Validators::default(), HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(outcome, StreamOutcome::Resumed(_)));
    }

    #[tokio::test]
    async fn stream_resume_past_eof_is_range_not_satisfiable() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/f")).respond_with(ResponseTemplate::new(416)).mount(&server).await;

        let client = Client::new();
        let outcome = fetch_stream(&client, &format!("{}/f", server.uri()), Some(999), &Validators::default(), HeaderMap::new())
            .await
            .unwrap();
        assert!(matches!(outcome, StreamOutcome::RangeNotSatisfiable));
    }
}
