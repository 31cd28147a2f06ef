//! HTTP client wrapper for WeTransfer API requests.

use std::time::Duration;

use reqwest::Client;

use crate::error::{Result, WtError};

/// Timeout for JSON API calls.
const API_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for raw chunk uploads. Parts are up to several megabytes, so
/// give them much more room than the JSON calls.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for making requests to WeTransfer servers.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a new HTTP client with a proxy.
    pub fn with_proxy(proxy: &str) -> Result<Self> {
        let proxy = reqwest::Proxy::all(proxy)?;
        let client = Client::builder().proxy(proxy).build()?;
        Ok(Self { client })
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<String> {
        let mut request = self.client.get(url).timeout(API_TIMEOUT);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        self.execute(request).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post(&self, url: &str, headers: &[(&str, String)], body: String) -> Result<String> {
        let mut request = self
            .client
            .post(url)
            .timeout(API_TIMEOUT)
            .header("Content-Type", "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        self.execute(request).await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put(&self, url: &str, headers: &[(&str, String)], body: String) -> Result<String> {
        let mut request = self
            .client
            .put(url)
            .timeout(API_TIMEOUT)
            .header("Content-Type", "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        self.execute(request).await
    }

    /// PUT raw bytes to a presigned upload URL.
    ///
    /// Upload URLs carry their own credentials, so no API headers are sent.
    pub async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<()> {
        let request = self
            .client
            .put(url)
            .timeout(UPLOAD_TIMEOUT)
            .header("Content-Type", "application/octet-stream")
            .body(body);
        self.execute(request).await?;
        Ok(())
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(status_error(status, text))
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a non-2xx status to the error taxonomy: 401/403 are authorization
/// failures, other 4xx mean we sent something the service rejects, 5xx are
/// transient service-side failures.
pub(crate) fn status_error(status: u16, body: String) -> WtError {
    match status {
        401 | 403 => WtError::Authorization(format!("status {status}: {body}")),
        500.. => WtError::Service {
            status,
            message: body,
        },
        _ => WtError::Protocol(format!("unexpected status {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let _client = HttpClient::new();
        let _default = HttpClient::default();
    }

    #[test]
    fn proxy_invalid() {
        let res = HttpClient::with_proxy(":::::::");
        assert!(res.is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(401, String::new()),
            WtError::Authorization(_)
        ));
        assert!(matches!(
            status_error(403, String::new()),
            WtError::Authorization(_)
        ));
        assert!(matches!(
            status_error(404, String::new()),
            WtError::Protocol(_)
        ));
        assert!(matches!(
            status_error(422, String::new()),
            WtError::Protocol(_)
        ));
        assert!(matches!(
            status_error(500, String::new()),
            WtError::Service { status: 500, .. }
        ));
        assert!(matches!(
            status_error(503, String::new()),
            WtError::Service { status: 503, .. }
        ));
    }

    #[test]
    fn retryability_follows_status_class() {
        assert!(status_error(502, String::new()).is_retryable());
        assert!(!status_error(400, String::new()).is_retryable());
        assert!(!status_error(401, String::new()).is_retryable());
    }
}
