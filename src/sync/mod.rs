//! Image replication between two registries
//!
//! [`ImageSync`] runs the sync as a sequence of stages. Within a stage every
//! item is attempted through a [`WorkPool`](crate::concurrency::WorkPool); at
//! the stage boundary the first failure aborts the whole run with the stage
//! and the offending artifact attached.

pub mod image_sync;
pub mod report;

pub use image_sync::ImageSync;
pub use report::SyncReport;

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Replicates a set of `name:tag` artifacts to a destination
#[async_trait]
pub trait ArtifactSync: Send + Sync {
    async fn sync(&self, artifacts: &[String], cancel: &CancellationToken) -> Result<SyncReport>;
}
