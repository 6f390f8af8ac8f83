//! Standardized conversion of transport failures and HTTP responses into errors

use crate::error::RegistryError;

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> RegistryError {
        if error.is_timeout() {
            RegistryError::Connectivity(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            RegistryError::Connectivity(format!("Connection error during {}: {}", context, error))
        } else if error.to_string().contains("certificate") {
            RegistryError::Connectivity(format!(
                "TLS certificate error during {}: {}",
                context, error
            ))
        } else {
            RegistryError::Connectivity(format!("{} network error: {}", context, error))
        }
    }
}

/// HTTP response error handling
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Protocol error carrying the status and (lossily decoded) body of an unexpected response
    pub fn protocol_error(operation: &str, status: u16, body: &[u8]) -> RegistryError {
        let body = String::from_utf8_lossy(body);
        RegistryError::protocol(operation, status, body.trim())
    }
}
