//! Blob operations for registry client
//!
//! Implements Docker Registry v2 blob operations:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Blob download (GET /v2/{name}/blobs/{digest}) as a stream
//! - Monolithic two-phase upload (POST /v2/{name}/blobs/uploads/, then PUT ?digest=)
//! - Cross-repository mount (POST /v2/{name}/blobs/uploads/ with mount/from form body)

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::endpoint::Endpoint;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Blob content on its way from one registry to another.
///
/// The body is streamed, never buffered in full; dropping it closes the
/// underlying connection.
pub struct BlobStream {
    body: Body,
    length: Option<u64>,
}

impl BlobStream {
    fn from_response(response: Response) -> Self {
        let length = response.content_length();
        Self {
            body: Body::wrap_stream(response.bytes_stream()),
            length,
        }
    }

    /// In-memory blob content
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        Self {
            length: Some(data.len() as u64),
            body: Body::from(data),
        }
    }

    pub fn content_length(&self) -> Option<u64> {
        self.length
    }
}

/// Result of a cross-repository mount; a rejection is not an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    Rejected { status: u16, body: String },
}

impl MountOutcome {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountOutcome::Mounted)
    }
}

#[derive(Debug, Clone)]
pub struct BlobOperations {
    endpoint: Endpoint,
    output: Logger,
}

impl BlobOperations {
    pub fn new(endpoint: Endpoint, output: Logger) -> Self {
        Self { endpoint, output }
    }

    fn blob_url(&self, repository: &str, digest: &str) -> String {
        self.endpoint
            .url(&format!("/v2/{}/blobs/{}", repository, digest))
    }

    fn uploads_url(&self, repository: &str) -> String {
        self.endpoint
            .url(&format!("/v2/{}/blobs/uploads/", repository))
    }

    /// Check if blob exists using Docker Registry v2 HEAD request
    pub async fn blob_exists(
        &self,
        repository: &str,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let url = self.blob_url(repository, digest);
        self.output.detail(&format!("Checking blob existence: {}", url));

        let request = self.endpoint.client().head(&url);
        let response = self
            .endpoint
            .send(request, cancel, "blob existence check")
            .await?;

        Ok(response.status() == StatusCode::OK)
    }

    /// Open a streaming download of a blob
    pub async fn download_blob(
        &self,
        repository: &str,
        digest: &str,
        cancel: &CancellationToken,
    ) -> Result<BlobStream> {
        let url = self.blob_url(repository, digest);
        self.output.verbose(&format!("Downloading blob from {}", url));

        let request = self.endpoint.client().get(&url);
        let response = self.endpoint.send(request, cancel, "blob download").await?;

        if response.status() != StatusCode::OK {
            return Err(self
                .endpoint
                .reject(response, cancel, &format!("GET blob {}@{}", repository, digest))
                .await);
        }

        Ok(BlobStream::from_response(response))
    }

    /// Upload a blob in one PUT after opening an upload session
    pub async fn upload_blob(
        &self,
        repository: &str,
        digest: &str,
        blob: BlobStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut session = self.initiate_upload(repository, cancel).await?;
        session.query_pairs_mut().append_pair("digest", digest);
        self.output
            .verbose(&format!("Uploading blob to {}", session.as_str()));

        let mut request = self
            .endpoint
            .client()
            .put(session.as_str())
            .header(CONTENT_TYPE, "application/octet-stream");
        if let Some(length) = blob.content_length() {
            request = request.header(CONTENT_LENGTH, length);
        }
        let request = request.body(blob.body);

        let response = self.endpoint.send(request, cancel, "blob upload").await?;

        if response.status() != StatusCode::CREATED {
            return Err(self
                .endpoint
                .reject(response, cancel, &format!("PUT blob {}@{}", repository, digest))
                .await);
        }
        Ok(())
    }

    /// Link a blob that already exists in `from_repository` into `repository`
    pub async fn mount_blob(
        &self,
        repository: &str,
        digest: &str,
        from_repository: &str,
        cancel: &CancellationToken,
    ) -> Result<MountOutcome> {
        let url = self.uploads_url(repository);
        self.output.verbose(&format!(
            "Mounting blob {} from {} into {}",
            digest, from_repository, repository
        ));

        let request = self
            .endpoint
            .client()
            .post(&url)
            .form(&[("mount", digest), ("from", from_repository)]);
        let response = self.endpoint.send(request, cancel, "blob mount").await?;

        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(MountOutcome::Mounted);
        }

        let body = match self.endpoint.read_body(response, cancel, "blob mount").await {
            Ok(body) => String::from_utf8_lossy(&body).trim().to_string(),
            Err(RegistryError::Cancelled) => return Err(RegistryError::Cancelled),
            Err(_) => String::new(),
        };
        self.output.warning(&format!(
            "Failed to mount blob {} into {}: HTTP {}",
            digest, repository, status
        ));
        Ok(MountOutcome::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Start an upload session and return its absolute URL
    async fn initiate_upload(&self, repository: &str, cancel: &CancellationToken) -> Result<Url> {
        let url = self.uploads_url(repository);
        self.output
            .detail(&format!("Starting blob upload session at: {}", url));

        let request = self
            .endpoint
            .client()
            .post(&url)
            .header(CONTENT_LENGTH, 0);
        let response = self
            .endpoint
            .send(request, cancel, "upload initiation")
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(self
                .endpoint
                .reject(response, cancel, &format!("POST upload session {}", repository))
                .await);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| {
                RegistryError::Upload(format!(
                    "No Location header in upload response from {}",
                    url
                ))
            })?
            .to_str()
            .map_err(|e| RegistryError::Upload(format!("Invalid Location header: {}", e)))?;

        if location.is_empty() {
            return Err(RegistryError::Upload(format!(
                "Empty Location header in upload response from {}",
                url
            )));
        }

        self.endpoint.resolve(location)
    }
}
