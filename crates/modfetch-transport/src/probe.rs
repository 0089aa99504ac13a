use modfetch_policy::EngineError;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, ETAG, LAST_MODIFIED, LOCATION, RANGE};
use reqwest::{Client, StatusCode};

use crate::validators::Validators;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub final_url: String,
    pub content_disposition: Option<String>,
    pub size: Option<u64>,
    pub accept_ranges: bool,
    pub validators: Validators,
}

fn to_engine_error(e: reqwest::Error) -> EngineError {
    EngineError::Transient { cause: e.to_string() }
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    // "bytes 0-0/12345"
    value.rsplit('/').next()?.parse().ok()
}

fn validators_from_headers(headers: &HeaderMap) -> Validators {
    Validators {
        etag: headers.get(ETAG).and_then(|v| v.to_str().ok()).map(str::to_string),
        last_modified: headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok()).map(str::to_string),
    }
}

/// Probes `url` for size and range support: HEAD first, falling back to a
/// `bytes=0-0` range GET, falling back to a manual one-hop redirect
/// resolution when neither reveals a usable size.
pub async fn probe(
    following: &Client,
    non_following: &Client,
    url: &str,
    headers: HeaderMap,
) -> Result<ProbeResult, EngineError> {
    if let Some(result) = probe_once(following, url, headers.clone()).await? {
        return Ok(result);
    }

    // Manual one-hop redirect resolution: some signed-CDN fronts block HEAD
    // outright and only reveal the real object URL via a 3xx on GET.
    let resp = non_following
        .get(url)
        .headers(headers.clone())
        .send()
        .await
        .map_err(to_engine_error)?;
    if resp.status().is_redirection() {
        if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
            let resolved = resolve_relative(url, location);
            if let Some(result) = probe_once(following, &resolved, headers).await? {
                return Ok(result);
            }
            return Ok(ProbeResult {
                final_url: resolved,
                content_disposition: None,
                size: None,
                accept_ranges: false,
                validators: Validators::default(),
            });
        }
    }

    Ok(ProbeResult {
        final_url: url.to_string(),
        content_disposition: None,
        size: None,
        accept_ranges: false,
        validators: Validators::default(),
    })
}

async fn probe_once(
    client: &Client,
    url: &str,
    headers: HeaderMap,
) -> Result<Option<ProbeResult>, EngineError> {
    let head_resp = client.head(url).headers(headers.clone()).send().await.map_err(to_engine_error)?;
    let final_url = head_resp.url().to_string();

    if head_resp.status().is_success() {
        let accept_ranges = head_resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);
        let size = head_resp.headers().get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok());

        if size.is_some() && accept_ranges {
            return Ok(Some(ProbeResult {
                final_url,
                content_disposition: header_string(head_resp.headers(), CONTENT_DISPOSITION),
                size,
                accept_ranges,
                validators: validators_from_headers(head_resp.headers()),
            }));
        }

        // HEAD succeeded but didn't confirm range support; fall through to the
        // 0-0 range GET, which is the canonical way to learn both at once.
        let cd = header_string(head_resp.headers(), CONTENT_DISPOSITION);
        if let Some(result) = probe_with_range(client, &final_url, headers, cd).await? {
            return Ok(Some(result));
        }
        if let Some(size) = size {
            return Ok(Some(ProbeResult {
                final_url,
                content_disposition: None,
                size: Some(size),
                accept_ranges: false,
                validators: validators_from_headers(head_resp.headers()),
            }));
        }
        return Ok(None);
    }

    probe_with_range(client, url, headers, None).await
}

async fn probe_with_range(
    client: &Client,
    url: &str,
    mut headers: HeaderMap,
    head_content_disposition: Option<String>,
) -> Result<Option<ProbeResult>, EngineError> {
    headers.insert(RANGE, "bytes=0-0".parse().expect("static header value"));
    let resp = client.get(url).headers(headers).send().await.map_err(to_engine_error)?;
    let final_url = resp.url().to_string();

    if resp.status() == StatusCode::PARTIAL_CONTENT {
        let total = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let cd = header_string(resp.headers(), CONTENT_DISPOSITION).or(head_content_disposition);
        return Ok(Some(ProbeResult {
            final_url,
            content_disposition: cd,
            size: total,
            accept_ranges: total.is_some(),
            validators: validators_from_headers(resp.headers()),
        }));
    }

    Ok(None)
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn resolve_relative(base: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    match reqwest::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(joined) => joined.to_string(),
        Err(_) => location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_total_from_content_range() {
        assert_eq!(parse_content_range_total("bytes 0-0/12345"), Some(12345));
    }

    #[test]
    fn resolve_relative_handles_absolute_and_relative() {
        assert_eq!(resolve_relative("https://a.example/x", "https://b.example/y"), "https://b.example/y");
        assert_eq!(resolve_relative("https://a.example/x/y", "z"), "https://a.example/x/z");
    }
}
