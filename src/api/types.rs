//! Wire types for the WeTransfer public API.
//!
//! Shapes follow the v1 endpoints: transfers are created with a name,
//! items are registered in a batch, and file items come back annotated
//! with the multipart contract (part count plus upload id) that governs
//! chunking.

use serde::{Deserialize, Serialize};

/// `POST /v1/authorize` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeResponse {
    pub token: String,
}

/// `POST /v1/transfers` request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransferRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /v1/transfers` response.
///
/// Some deployments already return a `shortened_url` here; it is ignored
/// until the transfer is finalized, which is when the URL becomes binding.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransferResponse {
    pub id: String,
    #[serde(default)]
    pub shortened_url: Option<String>,
}

/// One entry in the `POST /v1/transfers/{id}/items` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemRequest {
    File(FileItemRequest),
    Link(LinkItemRequest),
}

/// Registration payload for a file item.
#[derive(Debug, Clone, Serialize)]
pub struct FileItemRequest {
    pub filename: String,
    pub filesize: u64,
    pub content_identifier: String,
    pub local_identifier: String,
}

/// Registration payload for a link item.
#[derive(Debug, Clone, Serialize)]
pub struct LinkItemRequest {
    pub content_identifier: String,
    pub local_identifier: String,
    pub url: String,
    pub meta: LinkMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub title: String,
}

/// Per-item response entry from the add-items call.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    pub id: String,
    pub content_identifier: String,
    /// Present for file items only. Links carry no multipart contract.
    #[serde(default)]
    pub meta: Option<ItemMeta>,
}

/// Multipart contract the service declares for a registered file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemMeta {
    pub multipart_parts: u64,
    pub multipart_upload_id: String,
    /// Maximum bytes per part. Absent on older deployments, which use the
    /// documented 6 MiB default.
    #[serde(default)]
    pub chunk_size: Option<u64>,
}

/// `GET /v1/files/{id}/uploads/{part}/{upload_id}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadUrlResponse {
    pub upload_url: String,
}

/// `PUT /v1/transfers/{id}/finalize` response.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeResponse {
    pub shortened_url: String,
}
