//! Transfer orchestration: the upload state machine.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::api::service::RemoteService;
use crate::chunk::ChunkStatus;
use crate::error::{Result, WtError};
use crate::progress::{ProgressCallback, TransferProgress};
use crate::transfer::handle::{RemoteTransferHandle, RetryPolicy};
use crate::transfer::item::{ItemKind, ItemStatus, LocalFile, UploadItem};

/// Lifecycle of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Accepting items; nothing exists remotely yet.
    Building,
    /// The service assigned a transfer id.
    Created,
    /// Items are being registered.
    Registering,
    /// The chunk upload loop is running.
    Uploading,
    /// Per-item completion calls are being issued.
    Completing,
    /// The transfer is sealed and its short URL is available.
    Finalized,
    /// Terminal: an unrecoverable error occurred. Item and chunk statuses
    /// record how far the upload got.
    Failed,
}

/// Top-level coordinator for one transfer.
///
/// Accepts items, registers them with the service, drives the per-chunk
/// upload loop in ascending part order, closes each file's upload, and
/// finalizes the transfer. Chunk uploads are sequential: the service
/// reassembles parts by number, so ordering is part of the contract.
///
/// Per-chunk failures are retried with a fresh upload URL each attempt
/// (URLs are single-use); once the bounded retry budget is exhausted the
/// whole transfer fails.
pub struct TransferOrchestrator {
    handle: RemoteTransferHandle,
    name: String,
    message: Option<String>,
    state: TransferState,
    items: Vec<UploadItem>,
    short_url: Option<String>,
    retry: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl TransferOrchestrator {
    /// Create an orchestrator for a new transfer. No network traffic
    /// happens until the first [`add_items`](Self::add_items) call.
    pub fn new(
        service: Arc<dyn RemoteService>,
        name: impl Into<String>,
        message: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            handle: RemoteTransferHandle::new(service, retry.clone()),
            name: name.into(),
            message,
            state: TransferState::Building,
            items: Vec::new(),
            short_url: None,
            retry,
            progress: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// The queued items with their current statuses. After a failure this
    /// is how callers inspect partial progress.
    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    /// Remote transfer identifier. Available only once finalized.
    pub fn transfer_id(&self) -> Result<&str> {
        if self.state != TransferState::Finalized {
            return Err(WtError::NotReady);
        }
        self.handle.transfer_id().ok_or(WtError::NotReady)
    }

    /// Public short URL of the transfer. Available only once finalized.
    pub fn short_url(&self) -> Result<String> {
        if self.state != TransferState::Finalized {
            return Err(WtError::NotReady);
        }
        self.short_url.clone().ok_or(WtError::NotReady)
    }

    /// Install a callback invoked after every uploaded chunk.
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Queue items and register them with the service.
    ///
    /// The first call creates the transfer remotely. Registration plans
    /// each file's chunks from the part size the service declares and
    /// verifies the plan against the declared part count.
    pub async fn add_items(&mut self, items: Vec<UploadItem>) -> Result<()> {
        match self.state {
            TransferState::Building | TransferState::Created | TransferState::Registering => {}
            state => {
                return Err(WtError::Protocol(format!(
                    "cannot add items in state {state:?}"
                )));
            }
        }

        match self.register_batch(items).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = TransferState::Failed;
                error!(transfer = %self.name, error = %e, "failed to add items");
                Err(e)
            }
        }
    }

    async fn register_batch(&mut self, items: Vec<UploadItem>) -> Result<()> {
        if self.handle.transfer_id().is_none() {
            self.handle
                .create(&self.name, self.message.as_deref())
                .await?;
            self.state = TransferState::Created;
        }
        self.state = TransferState::Registering;

        let first_new = self.items.len();
        self.items.extend(items);
        self.handle.register_items(&mut self.items[first_new..]).await
    }

    /// Upload every chunk, close every item, finalize the transfer, and
    /// return its public short URL.
    pub async fn wait_until_finalized(&mut self) -> Result<String> {
        match self.state {
            TransferState::Finalized => return self.short_url(),
            TransferState::Registering => {}
            state => {
                return Err(WtError::Protocol(format!(
                    "cannot upload from state {state:?}"
                )));
            }
        }

        if let Err(e) = self.upload_all().await {
            self.state = TransferState::Failed;
            error!(transfer = %self.name, error = %e, "upload failed");
            return Err(e);
        }
        if let Err(e) = self.complete_all().await {
            self.state = TransferState::Failed;
            error!(transfer = %self.name, error = %e, "completing items failed");
            return Err(e);
        }
        self.finalize().await
    }

    /// Seal the transfer. Fails with a protocol error, without issuing any
    /// remote call, while any item is still incomplete.
    pub async fn finalize(&mut self) -> Result<String> {
        if let Some(item) = self
            .items
            .iter()
            .find(|item| item.status != ItemStatus::Completed)
        {
            return Err(WtError::Protocol(format!(
                "cannot finalize: item '{}' is not completed",
                item.name
            )));
        }

        match self.handle.finalize().await {
            Ok(short_url) => {
                self.short_url = Some(short_url.clone());
                self.state = TransferState::Finalized;
                Ok(short_url)
            }
            Err(e) => {
                self.state = TransferState::Failed;
                Err(e)
            }
        }
    }

    /// Sequential per-file, per-chunk upload loop in ascending part order.
    async fn upload_all(&mut self) -> Result<()> {
        self.state = TransferState::Uploading;

        for item in self.items.iter_mut() {
            let (path, size) = match &item.kind {
                ItemKind::Link { .. } => continue,
                ItemKind::File { path, size, .. } => (path.clone(), *size),
            };
            if item.status == ItemStatus::Completed {
                continue;
            }

            item.status = ItemStatus::Uploading;
            let source = LocalFile::new(path, size);
            let filename = item.name.clone();
            let chunk_count = item.chunks().len();
            let mut done = 0u64;

            for index in 0..chunk_count {
                let (part_number, length, status) = {
                    let chunk = &item.chunks()[index];
                    (chunk.part_number, chunk.length, chunk.status)
                };
                if status == ChunkStatus::Acknowledged {
                    done += length;
                    continue;
                }

                // Each attempt fetches a fresh URL: upload URLs are
                // single-use and short-lived.
                let mut attempt = 0;
                let mut delay = self.retry.initial_delay;
                loop {
                    let result = match self.handle.request_upload_url(item, part_number).await {
                        Ok(url) => {
                            item.set_chunk_status(index, ChunkStatus::UrlAcquired);
                            item.upload_chunk(
                                index,
                                &url,
                                &source,
                                self.handle.service().as_ref(),
                            )
                            .await
                        }
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(()) => {
                            item.set_chunk_status(index, ChunkStatus::Acknowledged);
                            break;
                        }
                        Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                            attempt += 1;
                            warn!(
                                item = %filename,
                                part = part_number,
                                attempt,
                                error = %e,
                                "part upload failed, retrying"
                            );
                            sleep(delay).await;
                            delay = (delay * 2).min(self.retry.max_delay);
                        }
                        Err(e) => return Err(e),
                    }
                }

                done += length;
                if let Some(callback) = self.progress.as_mut() {
                    callback(&TransferProgress::new(done, size, &filename));
                }
            }
        }
        Ok(())
    }

    async fn complete_all(&mut self) -> Result<()> {
        self.state = TransferState::Completing;
        for item in self.items.iter_mut() {
            if item.status == ItemStatus::Completed {
                continue;
            }
            if item.is_file() {
                self.handle.complete_item(item).await?;
            } else {
                // Links have no upload to close; registration is all the
                // service needs.
                item.status = ItemStatus::Completed;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{CreateTransferResponse, ItemMeta, ItemRequest, ItemResponse};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn temp_file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    /// Fake service that records every call in order.
    ///
    /// Upload URLs embed the part number so `upload_part` calls can be
    /// matched back to parts in the log.
    struct MockService {
        calls: Mutex<Vec<String>>,
        /// Part size the service declares at registration.
        chunk_size: u64,
        /// Override the truthful part count to provoke a mismatch.
        parts_override: Option<u64>,
        /// Fail the next `upload_part` for this part number, once.
        fail_part_once: Mutex<Option<u64>>,
        /// Reject `create_transfer` with a 401.
        reject_create: bool,
    }

    impl MockService {
        fn new(chunk_size: u64) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                chunk_size,
                parts_override: None,
                fail_part_once: Mutex::new(None),
                reject_create: false,
            }
        }

        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteService for MockService {
        async fn authorize(&self) -> Result<String> {
            self.log("authorize".into());
            Ok("token".into())
        }

        async fn create_transfer(
            &self,
            name: &str,
            _message: Option<&str>,
        ) -> Result<CreateTransferResponse> {
            self.log(format!("create:{name}"));
            if self.reject_create {
                return Err(WtError::Authorization("bad key".into()));
            }
            Ok(CreateTransferResponse {
                id: "t-1".into(),
                shortened_url: None,
            })
        }

        async fn register_items(
            &self,
            transfer_id: &str,
            items: &[ItemRequest],
        ) -> Result<Vec<ItemResponse>> {
            self.log(format!("register:{transfer_id}:{}", items.len()));
            Ok(items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    ItemRequest::File(file) => {
                        let parts = self
                            .parts_override
                            .unwrap_or_else(|| file.filesize.div_ceil(self.chunk_size).max(1));
                        ItemResponse {
                            id: format!("f-{index}"),
                            content_identifier: "file".into(),
                            meta: Some(ItemMeta {
                                multipart_parts: parts,
                                multipart_upload_id: format!("up-{index}"),
                                chunk_size: Some(self.chunk_size),
                            }),
                        }
                    }
                    ItemRequest::Link(_) => ItemResponse {
                        id: format!("l-{index}"),
                        content_identifier: "web_content".into(),
                        meta: None,
                    },
                })
                .collect())
        }

        async fn upload_url(
            &self,
            file_id: &str,
            part_number: u64,
            upload_id: &str,
        ) -> Result<String> {
            self.log(format!("upload_url:{file_id}:{part_number}"));
            Ok(format!("https://uploads.example.com/{upload_id}/{part_number}"))
        }

        async fn upload_part(&self, url: &str, body: Vec<u8>) -> Result<()> {
            let part: u64 = url.rsplit('/').next().unwrap().parse().unwrap();
            self.log(format!("upload_part:{part}:{}", body.len()));
            let mut fail = self.fail_part_once.lock().unwrap();
            if *fail == Some(part) {
                fail.take();
                return Err(WtError::Service {
                    status: 500,
                    message: "backend hiccup".into(),
                });
            }
            Ok(())
        }

        async fn complete_file(&self, file_id: &str) -> Result<()> {
            self.log(format!("complete:{file_id}"));
            Ok(())
        }

        async fn finalize_transfer(&self, transfer_id: &str) -> Result<String> {
            self.log(format!("finalize:{transfer_id}"));
            Ok("https://we.tl/s-abc123".into())
        }
    }

    fn orchestrator(service: &Arc<MockService>) -> TransferOrchestrator {
        TransferOrchestrator::new(
            service.clone() as Arc<dyn RemoteService>,
            "My transfer",
            None,
            fast_retry(),
        )
    }

    #[tokio::test]
    async fn three_chunk_file_uploads_in_order() {
        let service = Arc::new(MockService::new(4));
        let file = temp_file_with(b"0123456789"); // 10 bytes, 3 parts of 4+4+2
        let mut transfer = orchestrator(&service);

        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();
        assert_eq!(transfer.state(), TransferState::Registering);

        let short_url = transfer.wait_until_finalized().await.unwrap();
        assert_eq!(short_url, "https://we.tl/s-abc123");
        assert_eq!(transfer.state(), TransferState::Finalized);
        assert_eq!(transfer.transfer_id().unwrap(), "t-1");
        assert_eq!(transfer.short_url().unwrap(), short_url);

        let item = &transfer.items()[0];
        assert_eq!(item.status, ItemStatus::Completed);
        assert!(
            item.chunks()
                .iter()
                .all(|c| c.status == ChunkStatus::Acknowledged)
        );

        assert_eq!(
            service.calls(),
            vec![
                "create:My transfer",
                "register:t-1:1",
                "upload_url:f-0:1",
                "upload_part:1:4",
                "upload_url:f-0:2",
                "upload_part:2:4",
                "upload_url:f-0:3",
                "upload_part:3:2",
                "complete:f-0",
                "finalize:t-1",
            ]
        );
    }

    #[tokio::test]
    async fn part_count_mismatch_fails_before_any_upload() {
        let mut service = MockService::new(4);
        service.parts_override = Some(5);
        let service = Arc::new(service);
        let file = temp_file_with(b"0123456789");
        let mut transfer = orchestrator(&service);

        let err = transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, WtError::Protocol(_)));
        assert_eq!(transfer.state(), TransferState::Failed);
        assert!(
            !service
                .calls()
                .iter()
                .any(|call| call.starts_with("upload_url"))
        );
    }

    #[tokio::test]
    async fn transient_part_failure_is_retried_once() {
        let service = Arc::new(MockService::new(4));
        *service.fail_part_once.lock().unwrap() = Some(2);
        let file = temp_file_with(b"0123456789");
        let mut transfer = orchestrator(&service);

        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();
        let short_url = transfer.wait_until_finalized().await.unwrap();
        assert_eq!(short_url, "https://we.tl/s-abc123");
        assert_eq!(transfer.state(), TransferState::Finalized);

        // Part 2 was attempted twice, with a fresh URL each time; the rest
        // of the sequence is identical to the no-failure run.
        let calls = service.calls();
        let url_requests: Vec<_> = calls
            .iter()
            .filter(|c| c.starts_with("upload_url"))
            .collect();
        assert_eq!(url_requests.len(), 4);
        assert_eq!(
            calls.iter().filter(|c| *c == "upload_part:2:4").count(),
            2
        );
        assert_eq!(calls.last().unwrap(), "finalize:t-1");
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_the_transfer() {
        // Wraps the recording mock so every upload_part attempt fails.
        struct AlwaysFailParts(MockService);

        #[async_trait]
        impl RemoteService for AlwaysFailParts {
            async fn authorize(&self) -> Result<String> {
                self.0.authorize().await
            }
            async fn create_transfer(
                &self,
                name: &str,
                message: Option<&str>,
            ) -> Result<CreateTransferResponse> {
                self.0.create_transfer(name, message).await
            }
            async fn register_items(
                &self,
                transfer_id: &str,
                items: &[ItemRequest],
            ) -> Result<Vec<ItemResponse>> {
                self.0.register_items(transfer_id, items).await
            }
            async fn upload_url(
                &self,
                file_id: &str,
                part_number: u64,
                upload_id: &str,
            ) -> Result<String> {
                self.0.upload_url(file_id, part_number, upload_id).await
            }
            async fn upload_part(&self, _url: &str, _body: Vec<u8>) -> Result<()> {
                Err(WtError::Service {
                    status: 500,
                    message: "down".into(),
                })
            }
            async fn complete_file(&self, file_id: &str) -> Result<()> {
                self.0.complete_file(file_id).await
            }
            async fn finalize_transfer(&self, transfer_id: &str) -> Result<String> {
                self.0.finalize_transfer(transfer_id).await
            }
        }

        let failing = Arc::new(AlwaysFailParts(MockService::new(4)));
        let file = temp_file_with(b"0123456789");
        let mut transfer = TransferOrchestrator::new(
            failing.clone() as Arc<dyn RemoteService>,
            "My transfer",
            None,
            fast_retry(),
        );
        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();

        let err = transfer.wait_until_finalized().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transfer.state(), TransferState::Failed);

        // Three attempts on part 1, then the transfer failed: part 2 was
        // never reached, which the chunk statuses record.
        let calls = failing.0.calls();
        assert_eq!(
            calls
                .iter()
                .filter(|c| c.starts_with("upload_url:f-0:1"))
                .count(),
            3
        );
        let item = &transfer.items()[0];
        assert_eq!(item.status, ItemStatus::Uploading);
        assert_eq!(item.chunks()[0].status, ChunkStatus::UrlAcquired);
        assert_eq!(item.chunks()[1].status, ChunkStatus::Planned);
    }

    #[tokio::test]
    async fn premature_finalize_is_rejected_locally() {
        let service = Arc::new(MockService::new(4));
        let file = temp_file_with(b"0123456789");
        let mut transfer = orchestrator(&service);
        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();

        let err = transfer.finalize().await.unwrap_err();
        assert!(matches!(err, WtError::Protocol(_)));
        assert_eq!(transfer.state(), TransferState::Registering);
        assert!(
            !service
                .calls()
                .iter()
                .any(|call| call.starts_with("finalize"))
        );
    }

    #[tokio::test]
    async fn link_only_transfer_skips_uploading() {
        let service = Arc::new(MockService::new(4));
        let mut transfer = orchestrator(&service);
        transfer
            .add_items(vec![UploadItem::from_link(
                "https://example.com",
                "Example",
            )])
            .await
            .unwrap();

        let short_url = transfer.wait_until_finalized().await.unwrap();
        assert_eq!(short_url, "https://we.tl/s-abc123");
        assert_eq!(transfer.items()[0].status, ItemStatus::Completed);
        assert_eq!(
            service.calls(),
            vec!["create:My transfer", "register:t-1:1", "finalize:t-1"]
        );
    }

    #[tokio::test]
    async fn empty_file_still_uploads_one_part() {
        let service = Arc::new(MockService::new(4));
        let file = temp_file_with(b"");
        let mut transfer = orchestrator(&service);
        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();
        transfer.wait_until_finalized().await.unwrap();

        let calls = service.calls();
        assert!(calls.contains(&"upload_part:1:0".to_string()));
        assert!(calls.contains(&"complete:f-0".to_string()));
    }

    #[tokio::test]
    async fn identifiers_are_not_ready_before_finalize() {
        let service = Arc::new(MockService::new(4));
        let file = temp_file_with(b"0123456789");
        let mut transfer = orchestrator(&service);
        assert!(matches!(transfer.short_url(), Err(WtError::NotReady)));
        assert!(matches!(transfer.transfer_id(), Err(WtError::NotReady)));

        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();
        assert!(matches!(transfer.short_url(), Err(WtError::NotReady)));
        assert!(matches!(transfer.transfer_id(), Err(WtError::NotReady)));
    }

    #[tokio::test]
    async fn rejected_create_fails_the_transfer() {
        let mut service = MockService::new(4);
        service.reject_create = true;
        let service = Arc::new(service);
        let mut transfer = orchestrator(&service);

        let err = transfer
            .add_items(vec![UploadItem::from_link("https://example.com", "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, WtError::Authorization(_)));
        assert_eq!(transfer.state(), TransferState::Failed);
        // Authorization failures are fatal: exactly one create attempt.
        assert_eq!(
            service
                .calls()
                .iter()
                .filter(|c| c.starts_with("create"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn items_cannot_be_added_after_finalize() {
        let service = Arc::new(MockService::new(4));
        let mut transfer = orchestrator(&service);
        transfer
            .add_items(vec![UploadItem::from_link("https://example.com", "x")])
            .await
            .unwrap();
        transfer.wait_until_finalized().await.unwrap();

        let err = transfer
            .add_items(vec![UploadItem::from_link("https://example.org", "y")])
            .await
            .unwrap_err();
        assert!(matches!(err, WtError::Protocol(_)));
        assert_eq!(transfer.state(), TransferState::Finalized);
    }

    #[tokio::test]
    async fn progress_reports_cumulative_bytes() {
        let service = Arc::new(MockService::new(4));
        let file = temp_file_with(b"0123456789");
        let mut transfer = orchestrator(&service);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        transfer.on_progress(Box::new(move |progress| {
            sink.lock()
                .unwrap()
                .push((progress.done, progress.total));
        }));

        transfer
            .add_items(vec![UploadItem::from_file(file.path()).unwrap()])
            .await
            .unwrap();
        transfer.wait_until_finalized().await.unwrap();

        assert_eq!(*reports.lock().unwrap(), vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[tokio::test]
    async fn multiple_files_and_links_all_complete() {
        let service = Arc::new(MockService::new(4));
        let file_a = temp_file_with(b"0123456789"); // 3 parts
        let file_b = temp_file_with(b"abc"); // 1 part
        let mut transfer = orchestrator(&service);

        transfer
            .add_items(vec![
                UploadItem::from_file(file_a.path()).unwrap(),
                UploadItem::from_link("https://example.com", "Example"),
                UploadItem::from_file(file_b.path()).unwrap(),
            ])
            .await
            .unwrap();
        transfer.wait_until_finalized().await.unwrap();

        assert!(
            transfer
                .items()
                .iter()
                .all(|item| item.status == ItemStatus::Completed)
        );
        let calls = service.calls();
        assert_eq!(
            calls.iter().filter(|c| c.starts_with("complete")).count(),
            2
        );
        assert!(calls.contains(&"upload_part:1:3".to_string()));
        // Files keep their own part numbering: file b restarts at part 1.
        assert!(calls.contains(&"upload_url:f-2:1".to_string()));
    }
}
