//! Owned request/response values passed through the proxy.
//!
//! Bodies are `Bytes`, so cloning a response to store it in the cache does
//! not copy the payload.

use bytes::Bytes;
use serde::de::DeserializeOwned;

/// An outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns the serde error for malformed or mismatched bodies.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(Response::new("u", 200, "").is_success());
        assert!(Response::new("u", 204, "").is_success());
        assert!(!Response::new("u", 304, "").is_success());
        assert!(!Response::new("u", 500, "").is_success());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = Response::new("u", 200, "").with_header("Content-Type", "application/json");
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_json_body() {
        let response = Response::new("u", 200, r#"{"query":{"count":1}}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["query"]["count"], 1);
    }
}
