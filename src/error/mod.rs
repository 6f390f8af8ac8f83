//! Error types for registry and sync operations

pub mod handlers;

use std::fmt;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parse,
    ProbeImages,
    FetchManifests,
    ProbeBlobs,
    PushBlobs,
    MountBlobs,
    PublishManifests,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse references",
            Stage::ProbeImages => "probe images",
            Stage::FetchManifests => "fetch manifests",
            Stage::ProbeBlobs => "probe blobs",
            Stage::PushBlobs => "push blobs",
            Stage::MountBlobs => "mount blobs",
            Stage::PublishManifests => "publish manifests",
            Stage::Verify => "verify images",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Artifact reference is not of the form `name:tag`
    #[error("Invalid artifact reference '{reference}': {reason}")]
    ReferenceFormat { reference: String, reason: String },

    /// Registry unreachable or transport failure
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Registry answered with an unexpected status
    #[error("Protocol error: {operation} returned HTTP {status}: {body}")]
    Protocol {
        operation: String,
        status: u16,
        body: String,
    },

    /// Destination content does not match what was pushed
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Upload session could not be established
    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// A pool task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),

    #[error("Failed to {stage} for {subject}: {source}")]
    Stage {
        stage: Stage,
        subject: String,
        #[source]
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    /// Wrap an error with the pipeline stage and artifact it belongs to
    pub fn in_stage(self, stage: Stage, subject: impl Into<String>) -> Self {
        RegistryError::Stage {
            stage,
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    pub fn protocol(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        RegistryError::Protocol {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// True when the error, possibly wrapped in stage context, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            RegistryError::Cancelled => true,
            RegistryError::Stage { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Innermost error beneath any stage context
    pub fn root_cause(&self) -> &RegistryError {
        match self {
            RegistryError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            RegistryError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}
