//! Video Generation Parameters, Job Handles, and Results

use serde::{Deserialize, Serialize};

use crate::media::UploadedImage;

/// Longest accepted video prompt, in characters
pub const MAX_PROMPT_LEN: usize = 8192;

/// Output frame orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9, the default
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Wire representation sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(format!(
                "Unsupported aspect ratio '{other}' (expected 16:9 or 9:16)"
            )),
        }
    }
}

/// Parameters for a video generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerationParams {
    /// Natural-language description of the video
    pub prompt: String,
    /// Output orientation
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Optional first-frame image to animate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_image: Option<UploadedImage>,
    /// Output resolution label
    pub resolution: String,
    /// Number of samples to request
    pub sample_count: u32,
}

impl VideoGenerationParams {
    /// Creates parameters with the service defaults
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            seed_image: None,
            resolution: "720p".to_string(),
            sample_count: 1,
        }
    }

    /// Sets the output orientation
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Animates from the given first frame
    pub fn with_seed_image(mut self, image: UploadedImage) -> Self {
        self.seed_image = Some(image);
        self
    }

    /// Validates parameters before submission
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("Video prompt cannot be empty".to_string());
        }

        if self.prompt.len() > MAX_PROMPT_LEN {
            return Err(format!(
                "Video prompt is too long ({} chars, max {})",
                self.prompt.len(),
                MAX_PROMPT_LEN
            ));
        }

        if self.sample_count == 0 {
            return Err("Sample count must be at least 1".to_string());
        }

        if let Some(image) = &self.seed_image {
            image.validate().map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

/// Handle to a submitted video job, used for polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJobHandle {
    /// Service-side operation name
    pub operation_name: String,
    /// Unix timestamp of submission
    pub submitted_at: i64,
}

/// Outcome of one poll of a video job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum VideoJobStatus {
    /// Still rendering
    Pending,
    /// Finished; the asset link may be absent on malformed responses
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        asset_uri: Option<String>,
    },
}

impl VideoJobStatus {
    /// Whether the job has finished
    pub fn is_done(&self) -> bool {
        matches!(self, VideoJobStatus::Done { .. })
    }
}

/// Result of a completed video generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerationResult {
    /// Unique result ID
    pub id: String,
    /// Raw bytes of the generated video
    pub video_data: Vec<u8>,
    /// MIME type of the asset
    pub mime_type: String,
    /// Download URI the asset came from
    pub asset_uri: String,
    /// Engine generation stamp, for stale-result detection
    pub generation: u64,
    /// Wall-clock time from submit to download
    pub generation_time_ms: u64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_aspect_ratio_wire_format() {
        assert_eq!(AspectRatio::Landscape.as_str(), "16:9");
        assert_eq!(AspectRatio::Portrait.as_str(), "9:16");
        assert_eq!(AspectRatio::default(), AspectRatio::Landscape);

        assert_eq!(
            serde_json::to_string(&AspectRatio::Portrait).unwrap(),
            "\"9:16\""
        );
    }

    #[test]
    fn test_aspect_ratio_from_str() {
        assert_eq!(AspectRatio::from_str("16:9").unwrap(), AspectRatio::Landscape);
        assert_eq!(AspectRatio::from_str("9:16").unwrap(), AspectRatio::Portrait);
        assert!(AspectRatio::from_str("4:3").is_err());
    }

    #[test]
    fn test_params_defaults() {
        let params = VideoGenerationParams::new("a cat surfing");
        assert_eq!(params.aspect_ratio, AspectRatio::Landscape);
        assert_eq!(params.resolution, "720p");
        assert_eq!(params.sample_count, 1);
        assert!(params.seed_image.is_none());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_prompt() {
        let params = VideoGenerationParams::new("  ");
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_seed_image() {
        let params = VideoGenerationParams::new("a cat surfing")
            .with_seed_image(UploadedImage::from_bytes(vec![], "image/png"));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_status_is_done() {
        assert!(!VideoJobStatus::Pending.is_done());
        assert!(VideoJobStatus::Done { asset_uri: None }.is_done());
        assert!(VideoJobStatus::Done {
            asset_uri: Some("https://example.com/v.mp4".to_string())
        }
        .is_done());
    }

    #[test]
    fn test_status_serde_tagging() {
        let done = VideoJobStatus::Done {
            asset_uri: Some("https://example.com/v.mp4".to_string()),
        };
        let json = serde_json::to_string(&done).unwrap();
        assert!(json.contains("\"state\":\"done\""));

        let parsed: VideoJobStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, done);
    }
}
