//! Registry module for Docker registry interactions
//!
//! This module provides the client for the Docker Registry HTTP API v2: ping,
//! manifest existence/download/upload, blob existence/download/upload and
//! cross-repository blob mounts. Every operation takes a cancellation token.

pub mod client;
pub mod endpoint;
pub mod operations;

pub use client::{RegistryClient, RegistryClientBuilder};
pub use operations::{BlobStream, MountOutcome};
