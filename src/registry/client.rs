//! Registry V2 client for one registry endpoint
//!
//! [`RegistryClient`] is cheap to clone and safe to share between tasks; it
//! holds no per-request state.

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::image::manifest::Manifest;
use crate::logging::Logger;
use crate::registry::endpoint::Endpoint;
use crate::registry::operations::{BlobOperations, BlobStream, ManifestOperations, MountOutcome};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct RegistryClientBuilder {
    config: RegistryConfig,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            output: Logger::new(false),
        }
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        self.config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout))
            .danger_accept_invalid_certs(self.config.skip_tls)
            .build()
            .map_err(|e| {
                RegistryError::Connectivity(format!("Failed to create HTTP client: {}", e))
            })?;

        let endpoint = Endpoint::new(client, &self.config.address)?;

        Ok(RegistryClient {
            manifests: ManifestOperations::new(endpoint.clone(), self.output.clone()),
            blobs: BlobOperations::new(endpoint.clone(), self.output.clone()),
            endpoint,
            output: self.output,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    endpoint: Endpoint,
    manifests: ManifestOperations,
    blobs: BlobOperations,
    output: Logger,
}

impl RegistryClient {
    /// Client with default settings for `address`
    pub fn new(address: impl Into<String>) -> Result<Self> {
        Self::builder(RegistryConfig::new(address)).build()
    }

    pub fn builder(config: RegistryConfig) -> RegistryClientBuilder {
        RegistryClientBuilder::new(config)
    }

    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    /// Check that the registry speaks API v2; anything but 200 is a connectivity failure
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        let url = self.endpoint.url("/v2/");
        self.output.verbose(&format!("Pinging registry at {}", url));

        let request = self.endpoint.client().get(&url);
        let response = self.endpoint.send(request, cancel, "ping").await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(RegistryError::Connectivity(format!(
                "Ping of {} failed with status code: {}",
                url, status
            ))),
        }
    }

    pub async fn manifest_exists(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.manifests
            .manifest_exists(repository, reference, cancel)
            .await
    }

    pub async fn get_manifest(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Manifest> {
        self.manifests
            .get_manifest(repository, reference, cancel)
            .await
    }

    pub async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.manifests
            .put_manifest(repository, reference, manifest, cancel)
            .await
    }

    pub async fn blob_exists(
        &self,
        repository: &str,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.blobs.blob_exists(repository, digest, cancel).await
    }

    pub async fn download_blob(
        &self,
        repository: &str,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<BlobStream> {
        self.blobs.download_blob(repository, digest, cancel).await
    }

    pub async fn upload_blob(
        &self,
        repository: &str,
        digest: &str,
        blob: BlobStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.blobs
            .upload_blob(repository, digest, blob, cancel)
            .await
    }

    pub async fn mount_blob(
        &self,
        repository: &str,
        digest: &str,
        from_repository: &str,
        cancel: &CancellationToken,
    ) -> Result<MountOutcome> {
        self.blobs
            .mount_blob(repository, digest, from_repository, cancel)
            .await
    }
}
