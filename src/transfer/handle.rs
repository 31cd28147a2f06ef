//! Remote session for one transfer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::service::RemoteService;
use crate::error::{Result, WtError};
use crate::transfer::item::{ItemStatus, UploadItem};

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per operation, first try included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each failure.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Retry `op` on transient errors according to `policy`.
///
/// Fatal errors (authorization, protocol, validation) surface on the first
/// occurrence; only [`WtError::is_retryable`] failures are reissued.
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                attempt += 1;
                warn!(operation, attempt, error = %e, "transient failure, backing off");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Single authoritative mediator between local state and the remote service
/// for one transfer.
///
/// Every remote call scoped to the transfer goes through here: creation,
/// item registration, per-part upload URLs, per-file completion, and
/// finalization. The handle owns the transfer id; it performs bounded
/// retries for calls that are safe to reissue and leaves per-chunk retry
/// (which must fetch a fresh single-use URL each attempt) to the
/// orchestrator.
pub struct RemoteTransferHandle {
    service: Arc<dyn RemoteService>,
    retry: RetryPolicy,
    transfer_id: Option<String>,
}

impl RemoteTransferHandle {
    pub fn new(service: Arc<dyn RemoteService>, retry: RetryPolicy) -> Self {
        Self {
            service,
            retry,
            transfer_id: None,
        }
    }

    /// Remote transfer identifier, once `create` has succeeded.
    pub fn transfer_id(&self) -> Option<&str> {
        self.transfer_id.as_deref()
    }

    /// Create the transfer on the service. Must be called exactly once,
    /// before any item registration.
    pub async fn create(&mut self, name: &str, message: Option<&str>) -> Result<()> {
        if self.transfer_id.is_some() {
            return Err(WtError::Protocol("transfer already created".into()));
        }
        let service = &self.service;
        let response = retry_transient(&self.retry, "create transfer", || {
            service.create_transfer(name, message)
        })
        .await?;
        info!(transfer_id = %response.id, name, "created transfer");
        self.transfer_id = Some(response.id);
        Ok(())
    }

    /// Register a batch of queued items, in order.
    ///
    /// On success every item carries its service-assigned id; files
    /// additionally carry their verified chunk plan and multipart upload id.
    pub async fn register_items(&self, items: &mut [UploadItem]) -> Result<()> {
        let transfer_id = self.require_transfer_id()?;
        if items.is_empty() {
            return Ok(());
        }

        let requests: Vec<_> = items.iter().map(UploadItem::serialize).collect();
        let service = &self.service;
        let responses = retry_transient(&self.retry, "register items", || {
            service.register_items(transfer_id, &requests)
        })
        .await?;

        if responses.len() != items.len() {
            return Err(WtError::Protocol(format!(
                "registered {} items but the service returned {}",
                items.len(),
                responses.len()
            )));
        }

        for (item, response) in items.iter_mut().zip(&responses) {
            item.apply_registration(response)?;
        }
        info!(transfer_id, count = items.len(), "registered items");
        Ok(())
    }

    /// Fetch a presigned URL for one part. Single attempt: the caller
    /// retries the URL-plus-upload pair as a unit, since URLs are
    /// single-use.
    pub async fn request_upload_url(&self, item: &UploadItem, part_number: u64) -> Result<String> {
        self.require_transfer_id()?;
        let file_id = item.remote_id().ok_or_else(|| {
            WtError::Protocol(format!("item '{}' is not registered", item.name))
        })?;
        let upload_id = item.multipart_upload_id().ok_or_else(|| {
            WtError::Protocol(format!("item '{}' has no multipart upload id", item.name))
        })?;
        let url = self.service.upload_url(file_id, part_number, upload_id).await?;
        debug!(file_id, part_number, "fetched upload url");
        Ok(url)
    }

    /// Close a file's upload once all of its chunks are acknowledged.
    pub async fn complete_item(&self, item: &mut UploadItem) -> Result<()> {
        self.require_transfer_id()?;
        let file_id = item
            .remote_id()
            .ok_or_else(|| {
                WtError::Protocol(format!("item '{}' is not registered", item.name))
            })?
            .to_string();
        if !item.chunks_acknowledged() {
            return Err(WtError::Protocol(format!(
                "cannot complete '{}': not all chunks are acknowledged",
                item.name
            )));
        }

        let service = &self.service;
        retry_transient(&self.retry, "complete item", || {
            service.complete_file(&file_id)
        })
        .await?;
        item.status = ItemStatus::Completed;
        info!(%file_id, item = %item.name, "completed upload");
        Ok(())
    }

    /// Seal the transfer and return its public short URL. The caller is
    /// responsible for only invoking this once every item is completed.
    pub async fn finalize(&self) -> Result<String> {
        let transfer_id = self.require_transfer_id()?;
        let service = &self.service;
        let short_url = retry_transient(&self.retry, "finalize transfer", || {
            service.finalize_transfer(transfer_id)
        })
        .await?;
        info!(transfer_id, %short_url, "transfer finalized");
        Ok(short_url)
    }

    pub(crate) fn service(&self) -> &Arc<dyn RemoteService> {
        &self.service
    }

    fn require_transfer_id(&self) -> Result<&str> {
        self.transfer_id
            .as_deref()
            .ok_or_else(|| WtError::Protocol("transfer has not been created yet".into()))
    }
}
