//! TDX Studio Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Pre-submission Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Required capability unavailable: {0}")]
    CapabilityUnavailable(String),

    // =========================================================================
    // Remote Service Errors
    // =========================================================================
    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),

    #[error("No image data found in the service response")]
    NoImageInResponse,

    #[error("Video generated, but the response carries no download link")]
    AssetLinkMissing,

    #[error("Failed to download the generated asset: {0}")]
    AssetDownloadFailed(String),

    #[error("API key is invalid or expired. Select a new key and retry.")]
    InvalidOrExpiredCredential,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Convert to a user-friendly message for display surfaces
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
