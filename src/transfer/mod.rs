//! Transfer orchestration: items, the remote session, and the upload
//! state machine.

pub mod handle;
pub mod item;
pub mod orchestrator;

pub use handle::{RemoteTransferHandle, RetryPolicy};
pub use item::{BytesSource, FileSource, ItemStatus, LocalFile, UploadItem};
pub use orchestrator::{TransferOrchestrator, TransferState};
