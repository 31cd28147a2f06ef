//! Progress reporting for uploads.

/// Progress information for one file's upload.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Bytes uploaded so far
    pub done: u64,
    /// Total bytes to upload
    pub total: u64,
    /// Name of the file being uploaded
    pub filename: String,
}

impl TransferProgress {
    /// Create a new progress report.
    pub fn new(done: u64, total: u64, filename: impl Into<String>) -> Self {
        Self {
            done,
            total,
            filename: filename.into(),
        }
    }

    /// Get progress as a percentage (0.0 to 100.0).
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }

    /// Check if the upload is complete.
    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Type alias for progress callback function.
///
/// The callback is invoked after every uploaded chunk.
pub type ProgressCallback = Box<dyn FnMut(&TransferProgress) + Send>;

/// Create a simple progress callback that prints a bar to stdout.
pub fn make_progress_bar() -> ProgressCallback {
    Box::new(|progress: &TransferProgress| {
        let percent = progress.percent();
        let bar_width = 40;
        let filled = (percent / 100.0 * bar_width as f64) as usize;
        let empty = bar_width - filled;

        print!(
            "\r[{}{}] {:.1}% {} - {}/{} bytes",
            "=".repeat(filled),
            " ".repeat(empty),
            percent,
            progress.filename,
            progress.done,
            progress.total
        );

        if progress.is_complete() {
            println!();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_and_completion() {
        let progress = TransferProgress::new(50, 200, "file.bin");
        assert_eq!(progress.percent(), 25.0);
        assert!(!progress.is_complete());

        let progress = TransferProgress::new(200, 200, "file.bin");
        assert_eq!(progress.percent(), 100.0);
        assert!(progress.is_complete());
    }

    #[test]
    fn empty_total_reports_zero_percent() {
        let progress = TransferProgress::new(0, 0, "empty.bin");
        assert_eq!(progress.percent(), 0.0);
        assert!(progress.is_complete());
    }
}
