//! WeTransfer API client with request/response handling.

use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::api::service::RemoteService;
use crate::api::types::{
    AuthorizeResponse, CreateTransferRequest, CreateTransferResponse, FinalizeResponse,
    ItemRequest, ItemResponse, UploadUrlResponse,
};
use crate::error::Result;
use crate::http::HttpClient;

/// Default API server.
pub const DEFAULT_SERVER: &str = "dev.wetransfer.com";

/// Configuration for [`ApiClient`].
///
/// Threaded explicitly into construction so independent transfers can run
/// against different keys or servers without sharing ambient state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key, sent as `x-api-key` on every call.
    pub api_key: String,
    /// API server host.
    pub server: String,
    /// User-Agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration for the default server.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            server: DEFAULT_SERVER.to_string(),
            user_agent: format!("wetransfer-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Use a different API server.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }
}

/// Live client for the WeTransfer public API.
///
/// Holds the API key, the bearer token obtained from `authorize`, and the
/// underlying HTTP client. All methods issue a single request; retry
/// policy is applied by the orchestration layer.
#[derive(Debug)]
pub struct ApiClient {
    http: HttpClient,
    config: ClientConfig,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: HttpClient::new(),
            config,
            token: RwLock::new(None),
        }
    }

    /// Create a new API client with a proxy.
    pub fn with_proxy(config: ClientConfig, proxy: &str) -> Result<Self> {
        Ok(Self {
            http: HttpClient::with_proxy(proxy)?,
            config,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.config.server, path)
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("User-Agent", self.config.user_agent.clone()),
            ("x-api-key", self.config.api_key.clone()),
        ];
        let token = self.token.read().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = token.as_ref() {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
        headers
    }

    fn store_token(&self, token: String) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        let body = serde_json::to_string(body)?;
        let url = self.url(path);
        debug!(%url, "POST");
        let text = self.http.post(&url, &self.headers(), body).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RemoteService for ApiClient {
    async fn authorize(&self) -> Result<String> {
        let response: AuthorizeResponse = self.post_json("/v1/authorize", &serde_json::json!({})).await?;
        self.store_token(response.token.clone());
        Ok(response.token)
    }

    async fn create_transfer(
        &self,
        name: &str,
        message: Option<&str>,
    ) -> Result<CreateTransferResponse> {
        let request = CreateTransferRequest {
            name: name.to_string(),
            message: message.map(str::to_string),
        };
        self.post_json("/v1/transfers", &request).await
    }

    async fn register_items(
        &self,
        transfer_id: &str,
        items: &[ItemRequest],
    ) -> Result<Vec<ItemResponse>> {
        let body = serde_json::json!({ "items": items });
        self.post_json(&format!("/v1/transfers/{transfer_id}/items"), &body)
            .await
    }

    async fn upload_url(&self, file_id: &str, part_number: u64, upload_id: &str) -> Result<String> {
        let url = self.url(&format!(
            "/v1/files/{file_id}/uploads/{part_number}/{upload_id}"
        ));
        debug!(%url, "GET");
        let text = self.http.get(&url, &self.headers()).await?;
        let response: UploadUrlResponse = serde_json::from_str(&text)?;
        Ok(response.upload_url)
    }

    async fn upload_part(&self, url: &str, body: Vec<u8>) -> Result<()> {
        debug!(%url, bytes = body.len(), "PUT part");
        self.http.put_bytes(url, body).await
    }

    async fn complete_file(&self, file_id: &str) -> Result<()> {
        let url = self.url(&format!("/v1/files/{file_id}/uploads/complete"));
        debug!(%url, "POST");
        self.http
            .post(&url, &self.headers(), String::from("{}"))
            .await?;
        Ok(())
    }

    async fn finalize_transfer(&self, transfer_id: &str) -> Result<String> {
        let url = self.url(&format!("/v1/transfers/{transfer_id}/finalize"));
        debug!(%url, "PUT");
        let text = self.http.put(&url, &self.headers(), String::from("{}")).await?;
        let response: FinalizeResponse = serde_json::from_str(&text)?;
        Ok(response.shortened_url)
    }
}

impl ApiClient {
    /// Whether an authorize call has stored a bearer token.
    pub fn is_authorized(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Forget the stored bearer token.
    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
