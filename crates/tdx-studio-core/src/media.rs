//! Image Payloads
//!
//! Encoded image payloads for transport to the generation service. An
//! uploaded image lives in memory for the duration of one request and is
//! replaced wholesale on the next upload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{CoreError, CoreResult};

/// A user-selected image held in memory for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    /// Raw image bytes
    pub data: Vec<u8>,
    /// MIME type; must be an `image/*` type
    pub mime_type: String,
}

impl UploadedImage {
    /// Creates an image payload from in-memory bytes
    pub fn from_bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Reads a user-selected file into an encoded payload.
    ///
    /// The MIME type is sniffed from the file extension before the file is
    /// read, so a non-image selection is rejected without touching any state.
    pub async fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .map(str::to_string)
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "Cannot determine the file type of '{}'",
                    path.display()
                ))
            })?;

        if !mime_type.starts_with("image/") {
            return Err(CoreError::ValidationError(format!(
                "'{}' is not an image file ({}). Upload a PNG, JPG, or similar.",
                path.display(),
                mime_type
            )));
        }

        let image = Self {
            data: tokio::fs::read(path).await?,
            mime_type,
        };
        image.validate()?;

        Ok(image)
    }

    /// Validates the payload before submission
    pub fn validate(&self) -> CoreResult<()> {
        if !self.mime_type.starts_with("image/") {
            return Err(CoreError::ValidationError(format!(
                "Unsupported media type '{}'; an image/* type is required",
                self.mime_type
            )));
        }

        if self.data.is_empty() {
            return Err(CoreError::ValidationError(
                "Image payload is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the base64 transport encoding of the image bytes
    pub fn encoded(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Renders the payload as a locally addressable `data:` resource
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.encoded())
    }
}

// ============================================================================
// Tests
// ============================================================================
