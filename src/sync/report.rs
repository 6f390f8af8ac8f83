//! Summary of the work done by one sync run

use crate::logging::Logger;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub images_requested: usize,
    /// Images already at the destination before the run
    pub images_present: usize,
    pub images_published: usize,
    /// Distinct blobs referenced by images that needed syncing
    pub blobs_total: usize,
    pub blobs_present: usize,
    pub blobs_uploaded: usize,
    pub bytes_uploaded: u64,
    pub mounts_attempted: usize,
    pub mounts_failed: usize,
    pub elapsed: Duration,
}

impl SyncReport {
    /// True when the destination already had everything
    pub fn is_noop(&self) -> bool {
        self.images_published == 0 && self.blobs_uploaded == 0
    }

    pub fn log(&self, output: &Logger) {
        output.summary_kv(
            "Sync Summary",
            &[
                (
                    "Images",
                    format!(
                        "{} requested, {} already present, {} published",
                        self.images_requested, self.images_present, self.images_published
                    ),
                ),
                (
                    "Blobs",
                    format!(
                        "{} distinct, {} already present, {} uploaded ({})",
                        self.blobs_total,
                        self.blobs_present,
                        self.blobs_uploaded,
                        output.format_size(self.bytes_uploaded)
                    ),
                ),
                (
                    "Mounts",
                    format!(
                        "{} attempted, {} failed",
                        self.mounts_attempted, self.mounts_failed
                    ),
                ),
                ("Elapsed", output.format_duration(self.elapsed)),
            ],
        );
    }
}
