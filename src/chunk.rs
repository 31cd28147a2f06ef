//! Chunk planning for multipart uploads.
//!
//! The service splits every file into fixed-size parts and declares, at
//! registration time, how many parts it expects. [`plan`] computes the
//! matching local byte ranges; the orchestrator verifies the two counts
//! agree before any bytes move.

use crate::error::{Result, WtError};

/// Default maximum part size (6 MiB), used when the service does not
/// declare one at registration time.
pub const DEFAULT_PART_SIZE: u64 = 6_291_456;

/// Upload state of one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Byte range computed, nothing sent yet.
    Planned,
    /// A presigned upload URL has been fetched for this part.
    UrlAcquired,
    /// The part's bytes were streamed to the upload URL.
    Uploaded,
    /// The service confirmed receipt of the part.
    Acknowledged,
}

/// One contiguous byte range `[start, start + length)` of a file,
/// uploaded independently. Part numbers are 1-based and order-significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub part_number: u64,
    pub start: u64,
    pub length: u64,
    pub status: ChunkStatus,
}

/// Compute the chunk list for a file of `total_size` bytes with at most
/// `max_part_size` bytes per part.
///
/// The returned ranges partition `[0, total_size)` exactly, ordered by
/// ascending part number starting at 1. An empty file still yields one
/// zero-length chunk, because the service expects at least one part per
/// registered file.
pub fn plan(total_size: u64, max_part_size: u64) -> Result<Vec<Chunk>> {
    if total_size == 0 {
        return Ok(vec![Chunk {
            part_number: 1,
            start: 0,
            length: 0,
            status: ChunkStatus::Planned,
        }]);
    }
    if max_part_size == 0 {
        return Err(WtError::InvalidSize(format!(
            "max part size must be positive to split {total_size} bytes"
        )));
    }

    let mut chunks = Vec::with_capacity(total_size.div_ceil(max_part_size) as usize);
    let mut start = 0;
    let mut part_number = 1;
    while start < total_size {
        let length = max_part_size.min(total_size - start);
        chunks.push(Chunk {
            part_number,
            start,
            length,
            status: ChunkStatus::Planned,
        });
        start += length;
        part_number += 1;
    }
    Ok(chunks)
}
