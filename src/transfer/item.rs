//! Transfer items: files and links queued for a transfer.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::api::service::RemoteService;
use crate::api::types::{
    FileItemRequest, ItemRequest, ItemResponse, LinkItemRequest, LinkMeta,
};
use crate::chunk::{self, Chunk, ChunkStatus, DEFAULT_PART_SIZE};
use crate::error::{Result, WtError};

/// Content identifier the API uses for file items.
pub(crate) const CONTENT_FILE: &str = "file";
/// Content identifier the API uses for link items.
pub(crate) const CONTENT_LINK: &str = "web_content";
/// The API truncates local identifiers to their last 34 characters.
const LOCAL_IDENTIFIER_LEN: usize = 34;

/// Lifecycle of one queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Queued locally, not yet known to the service.
    Pending,
    /// The service assigned an item id (and, for files, a multipart contract).
    Registered,
    /// Chunk uploads are in flight. Links skip this state.
    Uploading,
    /// All content is on the service and the item's upload is closed.
    Completed,
}

/// Variant-specific item data. Links carry no chunks and no local content.
#[derive(Debug, Clone)]
pub(crate) enum ItemKind {
    File {
        path: PathBuf,
        size: u64,
        chunks: Vec<Chunk>,
        multipart_upload_id: Option<String>,
    },
    Link {
        url: String,
        title: String,
    },
}

/// One file or link queued for a transfer.
///
/// A file's size is read from the filesystem once, at construction time,
/// and is authoritative thereafter. A file that changes size after being
/// queued produces undefined chunk content; this is an accepted limitation,
/// not silently corrected.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Display name: the file name, or the link title.
    pub name: String,
    /// Current lifecycle state.
    pub status: ItemStatus,
    pub(crate) remote_id: Option<String>,
    pub(crate) kind: ItemKind,
}

impl UploadItem {
    /// Queue a local file.
    ///
    /// Fails with [`WtError::FileNotFound`] if the path does not resolve to
    /// a readable regular file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let original = path.as_ref();
        let path = original
            .canonicalize()
            .map_err(|_| WtError::FileNotFound(original.to_path_buf()))?;
        let metadata =
            std::fs::metadata(&path).map_err(|_| WtError::FileNotFound(path.clone()))?;
        if !metadata.is_file() {
            return Err(WtError::FileNotFound(path));
        }
        let name = path
            .file_name()
            .ok_or_else(|| WtError::FileNotFound(path.clone()))?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            name,
            status: ItemStatus::Pending,
            remote_id: None,
            kind: ItemKind::File {
                path,
                size: metadata.len(),
                chunks: Vec::new(),
                multipart_upload_id: None,
            },
        })
    }

    /// Queue a web link. Links are registered as metadata only; nothing is
    /// chunked or uploaded for them.
    pub fn from_link(url: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            name: title.clone(),
            status: ItemStatus::Pending,
            remote_id: None,
            kind: ItemKind::Link {
                url: url.into(),
                title,
            },
        }
    }

    /// Size in bytes; 0 for links.
    pub fn size(&self) -> u64 {
        match &self.kind {
            ItemKind::File { size, .. } => *size,
            ItemKind::Link { .. } => 0,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File { .. })
    }

    /// Item identifier assigned by the service at registration.
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    /// Planned chunks; empty for links and for files not yet registered.
    pub fn chunks(&self) -> &[Chunk] {
        match &self.kind {
            ItemKind::File { chunks, .. } => chunks,
            ItemKind::Link { .. } => &[],
        }
    }

    pub(crate) fn multipart_upload_id(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File {
                multipart_upload_id,
                ..
            } => multipart_upload_id.as_deref(),
            ItemKind::Link { .. } => None,
        }
    }

    pub(crate) fn set_chunk_status(&mut self, index: usize, status: ChunkStatus) {
        if let ItemKind::File { chunks, .. } = &mut self.kind {
            if let Some(chunk) = chunks.get_mut(index) {
                chunk.status = status;
            }
        }
    }

    /// Whether every chunk has been acknowledged by the service.
    pub fn chunks_acknowledged(&self) -> bool {
        match &self.kind {
            ItemKind::File { chunks, .. } => {
                !chunks.is_empty()
                    && chunks.iter().all(|c| c.status == ChunkStatus::Acknowledged)
            }
            ItemKind::Link { .. } => true,
        }
    }

    /// Build the registration payload for this item.
    pub(crate) fn serialize(&self) -> ItemRequest {
        match &self.kind {
            ItemKind::File { path, size, .. } => ItemRequest::File(FileItemRequest {
                filename: self.name.clone(),
                filesize: *size,
                content_identifier: CONTENT_FILE.to_string(),
                local_identifier: tail(&path.to_string_lossy(), LOCAL_IDENTIFIER_LEN),
            }),
            ItemKind::Link { url, title } => {
                let hex: String = url.bytes().map(|b| format!("{b:02x}")).collect();
                ItemRequest::Link(LinkItemRequest {
                    content_identifier: CONTENT_LINK.to_string(),
                    local_identifier: tail(&hex, LOCAL_IDENTIFIER_LEN),
                    url: url.clone(),
                    meta: LinkMeta {
                        title: title.clone(),
                    },
                })
            }
        }
    }

    /// Record the service's registration response: item id, and for files
    /// the multipart contract, against which the local chunk plan is
    /// verified. A count mismatch means service and client disagree on
    /// chunking and is fatal.
    pub(crate) fn apply_registration(&mut self, response: &ItemResponse) -> Result<()> {
        if let ItemKind::File {
            size,
            chunks,
            multipart_upload_id,
            ..
        } = &mut self.kind
        {
            let meta = response.meta.as_ref().ok_or_else(|| {
                WtError::Protocol(format!(
                    "file item '{}' registered without multipart metadata",
                    self.name
                ))
            })?;
            let part_size = meta.chunk_size.unwrap_or(DEFAULT_PART_SIZE);
            let planned = chunk::plan(*size, part_size)?;
            if planned.len() as u64 != meta.multipart_parts {
                return Err(WtError::Protocol(format!(
                    "chunk count mismatch for '{}': planned {} parts, service expects {}",
                    self.name,
                    planned.len(),
                    meta.multipart_parts
                )));
            }
            *chunks = planned;
            *multipart_upload_id = Some(meta.multipart_upload_id.clone());
        }
        self.remote_id = Some(response.id.clone());
        self.status = ItemStatus::Registered;
        Ok(())
    }

    /// Stream exactly one chunk's bytes from `source` to `url`.
    ///
    /// On success the chunk advances to [`ChunkStatus::Uploaded`]; on any
    /// failure its status is left unchanged so the caller can retry with a
    /// fresh URL.
    pub(crate) async fn upload_chunk(
        &mut self,
        index: usize,
        url: &str,
        source: &dyn FileSource,
        service: &dyn RemoteService,
    ) -> Result<()> {
        let (part_number, start, length) = {
            let chunk = self.chunks().get(index).ok_or_else(|| {
                WtError::Protocol(format!("no chunk at index {index} for '{}'", self.name))
            })?;
            (chunk.part_number, chunk.start, chunk.length)
        };

        let bytes = source.read_range(start, length).await?;
        service
            .upload_part(url, bytes)
            .await
            .map_err(|e| WtError::Upload {
                part_number,
                message: e.to_string(),
            })?;

        debug!(item = %self.name, part = part_number, bytes = length, "uploaded part");
        self.set_chunk_status(index, ChunkStatus::Uploaded);
        Ok(())
    }
}

/// Range-addressable byte source for a file's content.
///
/// The orchestrator never reads files directly; it asks a source for exactly
/// the byte range of the chunk being uploaded.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Total content length in bytes.
    fn size(&self) -> u64;

    /// Read exactly `length` bytes starting at `start`.
    async fn read_range(&self, start: u64, length: u64) -> Result<Vec<u8>>;
}

/// [`FileSource`] backed by a file on disk. The file is opened per read, so
/// retries never fight over a shared seek position.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    size: u64,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

#[async_trait]
impl FileSource for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut buffer = vec![0u8; length as usize];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }
}

/// In-memory [`FileSource`], useful for tests and for content that never
/// touches disk.
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Vec<u8>,
}

impl BytesSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl FileSource for BytesSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        let end = start
            .checked_add(length)
            .ok_or_else(|| WtError::InvalidSize(format!("range {start}+{length} overflows")))?;
        self.data
            .get(start as usize..end as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                WtError::InvalidSize(format!(
                    "range {start}..{end} outside content of {} bytes",
                    self.data.len()
                ))
            })
    }
}

/// Last `n` characters of `s` (the whole string if shorter).
fn tail(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
