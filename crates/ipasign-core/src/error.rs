//! Error types for the ipasign core library.

use thiserror::Error;

/// Core error type for the signing service.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required files or password.")]
    MissingInput,

    #[error("Duplicate field: {0}")]
    DuplicateField(&'static str),

    #[error("Failed to prepare signing workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exceeded timeout of {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("Failed to import .p12 certificate: {0}")]
    CertificateImport(String),

    #[error("Error signing IPA: {0}")]
    ArchiveSign(String),

    #[error("Error downloading signed IPA.")]
    Download(#[source] std::io::Error),
}

impl SigningError {
    /// Whether the error was caused by the client's request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SigningError::MissingInput | SigningError::DuplicateField(_))
    }
}

/// Result type alias for signing operations.
pub type Result<T> = std::result::Result<T, SigningError>;
