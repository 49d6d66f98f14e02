use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ProxyResult;
use crate::http::{Request, Response};

/// Anything that can answer a GET request.
///
/// Implemented by the raw HTTP client and by [`crate::CacheProxy`], so callers
/// can be pointed at either without knowing which one they talk to.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request.
    ///
    /// Non-2xx statuses are returned as responses; only transport failures
    /// are errors.
    async fn fetch(&self, request: &Request) -> ProxyResult<Response>;
}

/// `reqwest`-backed network access.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration, user_agent: &str) -> ProxyResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    #[tracing::instrument(skip(self, request), fields(url = %request.url), level = "debug")]
    async fn fetch(&self, request: &Request) -> ProxyResult<Response> {
        let response = self.client.get(&request.url).send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        tracing::debug!("HTTP {} ({} bytes)", status, body.len());

        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::ProxyError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_buffers_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html></html>", "text/html")
                    .insert_header("x-served-by", "origin"),
            )
            .mount(&server)
            .await;

        let network = HttpNetwork::new(Duration::from_secs(5), "test").unwrap();
        let response = network
            .fetch(&Request::get(format!("{}/index.html", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert_eq!(response.header("x-served-by"), Some("origin"));
        assert_eq!(&response.body[..], b"<html></html>");
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let network = HttpNetwork::new(Duration::from_secs(5), "test").unwrap();
        let response = network.fetch(&Request::get(server.uri())).await.unwrap();
        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let network = HttpNetwork::new(Duration::from_secs(2), "test").unwrap();
        let result = network.fetch(&Request::get("http://127.0.0.1:9/")).await;
        assert!(matches!(result, Err(ProxyError::Network(_))));
    }
}
