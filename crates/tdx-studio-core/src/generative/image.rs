//! Image Editing Parameters and Results

use serde::{Deserialize, Serialize};

use crate::media::UploadedImage;

/// Longest accepted editing instruction, in characters
pub const MAX_INSTRUCTION_LEN: usize = 4096;

/// Parameters for an AI image edit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEditParams {
    /// The image to edit
    pub image: UploadedImage,
    /// Natural-language editing instruction
    pub instruction: String,
}

impl ImageEditParams {
    /// Creates edit parameters for the given image and instruction
    pub fn new(image: UploadedImage, instruction: impl Into<String>) -> Self {
        Self {
            image,
            instruction: instruction.into(),
        }
    }

    /// Validates parameters before submission
    pub fn validate(&self) -> Result<(), String> {
        if self.instruction.trim().is_empty() {
            return Err("Editing instruction cannot be empty".to_string());
        }

        if self.instruction.len() > MAX_INSTRUCTION_LEN {
            return Err(format!(
                "Editing instruction is too long ({} chars, max {})",
                self.instruction.len(),
                MAX_INSTRUCTION_LEN
            ));
        }

        self.image.validate().map_err(|e| e.to_string())?;

        Ok(())
    }
}

/// Result of a completed image edit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEditResult {
    /// Unique result ID
    pub id: String,
    /// Raw bytes of the edited image
    pub image_data: Vec<u8>,
    /// MIME type reported by the service
    pub mime_type: String,
    /// Model that produced the edit
    pub model_used: String,
    /// Wall-clock time spent on the edit
    pub generation_time_ms: u64,
}

impl ImageEditResult {
    /// Renders the result as a locally addressable `data:` resource
    pub fn to_data_url(&self) -> String {
        UploadedImage::from_bytes(self.image_data.clone(), self.mime_type.clone()).to_data_url()
    }
}

// ============================================================================
// Tests
// ============================================================================
