//! HTTP plumbing shared by the registry operation groups

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

/// One registry base URL and the HTTP client used to reach it
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: Client,
    address: String,
    base: Url,
}

impl Endpoint {
    /// `address` must already be validated; a trailing slash is dropped
    pub fn new(client: Client, address: &str) -> Result<Self> {
        let address = address.trim_end_matches('/').to_string();
        let base = Url::parse(&format!("{}/", address))?;
        Ok(Self {
            client,
            address,
            base,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Absolute URL for an API path such as `/v2/`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Resolve a Location header value against the base URL (RFC 3986 reference resolution)
    pub fn resolve(&self, location: &str) -> Result<Url> {
        self.base.join(location).map_err(|e| {
            RegistryError::Upload(format!("Invalid upload location '{}': {}", location, e))
        })
    }

    /// Send a request, giving up as soon as `cancel` fires
    pub async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
        context: &str,
    ) -> Result<Response> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RegistryError::Cancelled),
            response = request.send() => {
                response.map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))
            }
        }
    }

    /// Read a full response body, giving up as soon as `cancel` fires
    pub async fn read_body(
        &self,
        response: Response,
        cancel: &CancellationToken,
        context: &str,
    ) -> Result<Bytes> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RegistryError::Cancelled),
            body = response.bytes() => {
                body.map_err(|e| NetworkErrorHandler::handle_network_error(&e, context))
            }
        }
    }

    /// Consume an unexpected response into a protocol error; the body read also watches `cancel`
    pub async fn reject(
        &self,
        response: Response,
        cancel: &CancellationToken,
        operation: &str,
    ) -> RegistryError {
        let status = response.status().as_u16();
        match self.read_body(response, cancel, operation).await {
            Ok(body) => HttpErrorHandler::protocol_error(operation, status, &body),
            Err(RegistryError::Cancelled) => RegistryError::Cancelled,
            Err(_) => HttpErrorHandler::protocol_error(
                operation,
                status,
                b"Failed to read error response",
            ),
        }
    }
}
