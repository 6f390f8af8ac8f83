//! Manifest operations for registry client
//!
//! Implements Docker Registry v2 manifest operations:
//! - Manifest existence (HEAD /v2/{name}/manifests/{reference})
//! - Manifest download (GET /v2/{name}/manifests/{reference})
//! - Manifest upload (PUT /v2/{name}/manifests/{reference})

use crate::error::{RegistryError, Result};
use crate::image::manifest::{MANIFEST_V2_MEDIA_TYPE, Manifest};
use crate::logging::Logger;
use crate::registry::endpoint::Endpoint;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ManifestOperations {
    endpoint: Endpoint,
    output: Logger,
}

impl ManifestOperations {
    pub fn new(endpoint: Endpoint, output: Logger) -> Self {
        Self { endpoint, output }
    }

    fn manifest_url(&self, repository: &str, reference: &str) -> String {
        self.endpoint
            .url(&format!("/v2/{}/manifests/{}", repository, reference))
    }

    /// HEAD the manifest; any non-200 status means absent
    pub async fn manifest_exists(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let url = self.manifest_url(repository, reference);
        self.output
            .detail(&format!("Checking manifest existence: {}", url));

        let request = self
            .endpoint
            .client()
            .head(&url)
            .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE);
        let response = self
            .endpoint
            .send(request, cancel, "manifest existence check")
            .await?;

        Ok(response.status() == StatusCode::OK)
    }

    /// Download and parse a schema 2 manifest
    pub async fn get_manifest(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Manifest> {
        let url = self.manifest_url(repository, reference);
        self.output.verbose(&format!("Fetching manifest from {}", url));

        let request = self
            .endpoint
            .client()
            .get(&url)
            .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE);
        let response = self.endpoint.send(request, cancel, "manifest pull").await?;

        if response.status() != StatusCode::OK {
            return Err(self
                .endpoint
                .reject(response, cancel, &format!("GET manifest {}:{}", repository, reference))
                .await);
        }

        let data = self
            .endpoint
            .read_body(response, cancel, "manifest pull")
            .await?;
        Manifest::from_slice(&data).map_err(|e| {
            RegistryError::Parse(format!(
                "Invalid manifest for {}:{}: {}",
                repository, reference, e
            ))
        })
    }

    /// Publish a manifest; only 201 Created counts as success
    pub async fn put_manifest(
        &self,
        repository: &str,
        reference: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = self.manifest_url(repository, reference);
        self.output.verbose(&format!("Putting manifest to {}", url));

        let request = self
            .endpoint
            .client()
            .put(&url)
            .header(CONTENT_TYPE, manifest.media_type.as_str())
            .body(manifest.to_canonical_json()?);
        let response = self.endpoint.send(request, cancel, "manifest upload").await?;

        if response.status() != StatusCode::CREATED {
            return Err(self
                .endpoint
                .reject(response, cancel, &format!("PUT manifest {}:{}", repository, reference))
                .await);
        }

        self.output.detail(&format!(
            "Manifest uploaded successfully for {}:{}",
            repository, reference
        ));
        Ok(())
    }
}
