//! # wetransfer
//!
//! Rust client library for the WeTransfer public API.
//!
//! ## Features
//!
//! - **Transfers**: create a named transfer, queue files and web links,
//!   and obtain the public short URL once the transfer is finalized.
//! - **Multipart uploads**:
//!   - Chunk plans computed from the part size the service declares at
//!     registration and verified against its declared part count.
//!   - Sequential per-part upload with presigned, single-use URLs.
//!   - Bounded retry with exponential backoff for transient failures;
//!     every retry fetches a fresh upload URL.
//!   - Progress tracking with custom callbacks.
//! - **Links**: registered as metadata only, nothing is uploaded for them.
//!
//! Authorization is explicit: call [`WtClient::authorize`] once before
//! creating transfers; the bearer token is held by the shared API client.
//!
//! ## Example
//!
//! ```no_run
//! use wetransfer::{ClientConfig, UploadItem, WtClient};
//!
//! # async fn example() -> wetransfer::Result<()> {
//! let client = WtClient::new(ClientConfig::new("my-api-key"));
//! client.authorize().await?;
//!
//! let mut transfer = client.create_transfer("Holiday photos", None)?;
//! transfer
//!     .add_items(vec![
//!         UploadItem::from_file("photos/beach.jpg")?,
//!         UploadItem::from_link("https://example.com/album", "The album"),
//!     ])
//!     .await?;
//!
//! let short_url = transfer.wait_until_finalized().await?;
//! println!("shared at {short_url}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chunk;
pub mod client;
pub mod error;
pub mod http;
pub mod progress;
pub mod transfer;

pub use api::{ApiClient, ClientConfig, RemoteService, DEFAULT_SERVER};
pub use chunk::{Chunk, ChunkStatus, DEFAULT_PART_SIZE};
pub use client::WtClient;
pub use error::{Result, WtError};
pub use progress::{ProgressCallback, TransferProgress};
pub use transfer::{
    ItemStatus, RemoteTransferHandle, RetryPolicy, TransferOrchestrator, TransferState,
    UploadItem,
};
