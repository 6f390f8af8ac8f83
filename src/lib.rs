//! Registry Sync Library
//!
//! Replicates `name:tag` images from a source Docker Registry V2 to a
//! destination registry. Blobs are staged once in a shared destination
//! repository, mounted into each image's repository, and manifests are
//! published with their original bytes so digests stay identical.

pub mod cli;
pub mod common;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod sync;

pub use config::{RegistryConfig, SyncConfig};
pub use error::{RegistryError, Result, Stage};
pub use logging::Logger;
pub use registry::{RegistryClient, RegistryClientBuilder};
pub use sync::{ArtifactSync, ImageSync, SyncReport};
