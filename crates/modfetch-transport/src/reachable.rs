use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;

/// A quick bounded-timeout HEAD used to produce a friendly pre-flight error.
/// Any HTTP response — even an error status — counts as "reachable"; only a
/// transport-layer failure (DNS, connect, TLS) means the host is unreachable.
pub async fn reachable(client: &Client, url: &str, headers: HeaderMap, timeout: Duration) -> (bool, String) {
    match tokio::time::timeout(timeout, client.head(url).headers(headers).send()).await {
        Ok(Ok(resp)) => (true, resp.status().to_string()),
        Ok(Err(e)) => (false, e.to_string()),
        Err(_) => (false, "timed out".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn any_http_response_counts_as_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let client = Client::new();
        let (ok, status) = reachable(&client, &server.uri(), HeaderMap::new(), Duration::from_secs(2)).await;
        assert!(ok);
        assert!(status.contains("404"));
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let client = Client::new();
        let (ok, _) = reachable(&client, "http://127.0.0.1:1", HeaderMap::new(), Duration::from_millis(500)).await;
        assert!(!ok);
    }
}
