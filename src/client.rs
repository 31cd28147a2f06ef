//! Top-level client: authorization and transfer creation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::api::client::{ApiClient, ClientConfig};
use crate::api::service::RemoteService;
use crate::error::{Result, WtError};
use crate::transfer::handle::RetryPolicy;
use crate::transfer::orchestrator::TransferOrchestrator;

/// Entry point for the library: authorizes against the API and hands out
/// [`TransferOrchestrator`]s that share its credentials.
///
/// The underlying service client is shared, so multiple transfers can run
/// independently off one `WtClient`.
pub struct WtClient {
    service: Arc<dyn RemoteService>,
    retry: RetryPolicy,
    authorized: AtomicBool,
}

impl WtClient {
    /// Create a client for the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_service(Arc::new(ApiClient::new(config)), RetryPolicy::default())
    }

    /// Create a client with an explicit service implementation and retry
    /// policy. This is the seam tests use to substitute a fake service.
    pub fn with_service(service: Arc<dyn RemoteService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            authorized: AtomicBool::new(false),
        }
    }

    /// Exchange the API key for a bearer token.
    ///
    /// Must be called, and succeed, before any transfer is created.
    pub async fn authorize(&self) -> Result<()> {
        self.service.authorize().await?;
        self.authorized.store(true, Ordering::SeqCst);
        info!("authorized");
        Ok(())
    }

    /// Create an orchestrator for a new transfer.
    ///
    /// No network traffic happens here; the transfer is created remotely on
    /// the orchestrator's first `add_items` call.
    pub fn create_transfer(
        &self,
        name: impl Into<String>,
        message: Option<String>,
    ) -> Result<TransferOrchestrator> {
        if !self.authorized.load(Ordering::SeqCst) {
            return Err(WtError::Authorization(
                "authorize() must succeed before creating transfers".into(),
            ));
        }
        Ok(TransferOrchestrator::new(
            self.service.clone(),
            name,
            message,
            self.retry.clone(),
        ))
    }
}
