//! Abstraction over the remote transfer service.

use async_trait::async_trait;

use crate::api::types::{CreateTransferResponse, ItemRequest, ItemResponse};
use crate::error::Result;

/// The set of remote operations the upload orchestration depends on.
///
/// [`crate::api::ApiClient`] is the live implementation; tests substitute
/// recording fakes so orchestration logic can be exercised without a
/// network. Methods map one-to-one onto API endpoints and perform a single
/// attempt each; retry policy lives with the caller, which knows which
/// operations are safe to reissue.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Exchange the API key for a bearer token. Must succeed before any
    /// other call.
    async fn authorize(&self) -> Result<String>;

    /// Create an empty transfer.
    async fn create_transfer(
        &self,
        name: &str,
        message: Option<&str>,
    ) -> Result<CreateTransferResponse>;

    /// Register a batch of items with a transfer. The response carries one
    /// entry per sent item, in the same order.
    async fn register_items(
        &self,
        transfer_id: &str,
        items: &[ItemRequest],
    ) -> Result<Vec<ItemResponse>>;

    /// Fetch a presigned upload URL for one part of a file. URLs are
    /// short-lived and single-use; request one immediately before each
    /// upload attempt.
    async fn upload_url(&self, file_id: &str, part_number: u64, upload_id: &str) -> Result<String>;

    /// PUT one part's bytes to a presigned upload URL.
    async fn upload_part(&self, url: &str, body: Vec<u8>) -> Result<()>;

    /// Signal that every part of a file has been uploaded.
    async fn complete_file(&self, file_id: &str) -> Result<()>;

    /// Seal the transfer and obtain its public short URL.
    async fn finalize_transfer(&self, transfer_id: &str) -> Result<String>;
}
