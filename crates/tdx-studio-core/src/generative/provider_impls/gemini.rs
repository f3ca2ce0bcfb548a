//! Gemini / Veo Generation Provider
//!
//! Adapter for the Google Generative Language REST API. Image edits go
//! through `generateContent` on an image-capable Gemini model; video jobs go
//! through Veo's `predictLongRunning` endpoint and are polled as long-running
//! operations. Finished video assets are downloaded with the API key appended
//! as a query parameter, the way the file-serving endpoint expects it.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::credentials::CredentialSession;
use crate::generative::image::ImageEditParams;
use crate::generative::providers::{GenerativeProvider, ProviderCapability};
use crate::generative::video::{VideoGenerationParams, VideoJobHandle, VideoJobStatus};
use crate::{CoreError, CoreResult};

// =============================================================================
// Constants
// =============================================================================

/// Default base URL for the Generative Language API
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default image editing model
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Default video generation model
const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Maximum allowed download size (500 MB) to prevent unbounded memory usage.
const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    data: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictVideoRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImageInstance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageInstance {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    aspect_ratio: String,
    resolution: String,
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResult>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// =============================================================================
// GeminiProvider
// =============================================================================

/// Gemini image editing + Veo video generation provider
pub struct GeminiProvider {
    /// HTTP client with configured timeout
    client: reqwest::Client,
    /// Credential session; the key is read fresh on every call
    session: Arc<CredentialSession>,
    /// Base URL for the API
    base_url: String,
    /// Image editing model ID
    image_model: String,
    /// Video generation model ID
    video_model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider bound to a credential session
    pub fn new(session: Arc<CredentialSession>) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session,
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set custom image editing model
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Set custom video generation model
    pub fn with_video_model(mut self, model: impl Into<String>) -> Self {
        self.video_model = model.into();
        self
    }

    /// Build the image edit URL
    fn edit_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.image_model)
    }

    /// Build the video submit URL
    fn submit_url(&self) -> String {
        format!(
            "{}/models/{}:predictLongRunning",
            self.base_url, self.video_model
        )
    }

    /// Build the poll URL for an operation name like `operations/abc123`
    fn poll_url(&self, operation_name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            operation_name.trim_start_matches('/')
        )
    }

    /// Append the API key to an asset URI as the `key` query parameter
    fn asset_url(uri: &str, api_key: &str) -> CoreResult<reqwest::Url> {
        let mut parsed = reqwest::Url::parse(uri).map_err(|e| {
            CoreError::AssetDownloadFailed(format!("Invalid asset URI '{}': {}", uri, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CoreError::AssetDownloadFailed(format!(
                    "Unsupported asset URI scheme '{}'. Only http/https are allowed.",
                    scheme
                )))
            }
        }

        parsed.query_pairs_mut().append_pair("key", api_key);
        Ok(parsed)
    }

    /// Parse an error response body into a core error.
    ///
    /// Routes through the credential session so a rejected key invalidates
    /// the session instead of surfacing as a generic remote failure.
    fn parse_api_error(&self, status: StatusCode, body: &str) -> CoreError {
        let message = match serde_json::from_str::<ApiErrorResponse>(body) {
            Ok(ApiErrorResponse { error: Some(detail) }) => format!(
                "Gemini API error ({}): {} (status: {})",
                status,
                detail.message.unwrap_or_default(),
                detail.status.unwrap_or_default(),
            ),
            _ => {
                let truncated: String = body.chars().take(500).collect();
                format!("Gemini API error ({}): {}", status, truncated)
            }
        };

        self.session.classify_remote_error(message)
    }

    /// POST a JSON body and parse the JSON response
    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> CoreResult<T> {
        let api_key = self.session.api_key()?;

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(format!("Network error: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(self.parse_api_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| CoreError::RemoteCallFailed(format!("Failed to parse response: {}", e)))
    }

    /// GET a URL and parse the JSON response
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> CoreResult<T> {
        let api_key = self.session.api_key()?;

        let resp = self
            .client
            .get(url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(format!("Network error: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(self.parse_api_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| CoreError::RemoteCallFailed(format!("Failed to parse response: {}", e)))
    }

    /// Scan a generateContent response for the first inline image part
    fn first_inline_image(response: GenerateContentResponse) -> Option<InlineData> {
        response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn capabilities(&self) -> Vec<ProviderCapability> {
        vec![
            ProviderCapability::ImageEditing,
            ProviderCapability::VideoGeneration,
        ]
    }

    fn is_available(&self) -> bool {
        self.session.is_selected()
    }

    async fn edit_image(&self, params: &ImageEditParams) -> CoreResult<(Vec<u8>, String)> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            data: params.image.encoded(),
                            mime_type: params.image.mime_type.clone(),
                        }),
                    },
                    Part {
                        text: Some(params.instruction.clone()),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
        };

        debug!(model = %self.image_model, "sending image edit request");
        let response: GenerateContentResponse = self.post_json(&self.edit_url(), &request).await?;

        let inline = Self::first_inline_image(response).ok_or(CoreError::NoImageInResponse)?;

        let bytes = BASE64.decode(&inline.data).map_err(|e| {
            CoreError::RemoteCallFailed(format!("Invalid base64 image in response: {}", e))
        })?;

        info!(model = %self.image_model, bytes = bytes.len(), "image edit returned");
        Ok((bytes, inline.mime_type))
    }

    async fn submit_video(&self, params: &VideoGenerationParams) -> CoreResult<VideoJobHandle> {
        let request = PredictVideoRequest {
            instances: vec![VideoInstance {
                prompt: params.prompt.clone(),
                image: params.seed_image.as_ref().map(|img| ImageInstance {
                    bytes_base64_encoded: img.encoded(),
                    mime_type: img.mime_type.clone(),
                }),
            }],
            parameters: VideoParameters {
                aspect_ratio: params.aspect_ratio.as_str().to_string(),
                resolution: params.resolution.clone(),
                sample_count: params.sample_count,
            },
        };

        debug!(model = %self.video_model, "submitting video job");
        let operation: OperationResponse = self.post_json(&self.submit_url(), &request).await?;

        info!(operation = %operation.name, "video job accepted");
        Ok(VideoJobHandle {
            operation_name: operation.name,
            submitted_at: chrono::Utc::now().timestamp(),
        })
    }

    async fn poll_video(&self, handle: &VideoJobHandle) -> CoreResult<VideoJobStatus> {
        let operation: OperationResponse =
            self.get_json(&self.poll_url(&handle.operation_name)).await?;

        debug!(
            operation = %handle.operation_name,
            done = operation.done,
            "polled video job"
        );

        if let Some(error) = operation.error {
            let message = error
                .message
                .unwrap_or_else(|| "Video generation failed".to_string());
            return Err(self.session.classify_remote_error(message));
        }

        if !operation.done {
            return Ok(VideoJobStatus::Pending);
        }

        let asset_uri = operation
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);

        Ok(VideoJobStatus::Done { asset_uri })
    }

    async fn fetch_asset(&self, uri: &str) -> CoreResult<Vec<u8>> {
        let api_key = self.session.api_key()?;
        let url = Self::asset_url(uri, &api_key)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::AssetDownloadFailed(format!("Network error: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CoreError::AssetDownloadFailed(format!(
                "Download failed with status: {}",
                status
            )));
        }

        if let Some(content_len) = resp.content_length() {
            if content_len > MAX_DOWNLOAD_BYTES {
                return Err(CoreError::AssetDownloadFailed(format!(
                    "Asset is too large ({} bytes > {} bytes limit)",
                    content_len, MAX_DOWNLOAD_BYTES
                )));
            }
        }

        let mut bytes: Vec<u8> = Vec::new();
        let mut resp = resp;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| CoreError::AssetDownloadFailed(format!("Failed to read chunk: {}", e)))?
        {
            if (bytes.len() + chunk.len()) as u64 > MAX_DOWNLOAD_BYTES {
                return Err(CoreError::AssetDownloadFailed(format!(
                    "Asset exceeded max size limit ({} bytes)",
                    MAX_DOWNLOAD_BYTES
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        info!(bytes = bytes.len(), "downloaded generated asset");
        Ok(bytes)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{StaticCredentialStore, ENTITY_NOT_FOUND_MARKER};
    use crate::media::UploadedImage;

    fn provider_with_key(key: &str) -> GeminiProvider {
        let store: Arc<dyn crate::credentials::CredentialStore> =
            Arc::new(StaticCredentialStore::new(key));
        let session = Arc::new(CredentialSession::init(Some(store)).unwrap());
        GeminiProvider::new(session).unwrap()
    }

    fn provider_without_key() -> GeminiProvider {
        let store: Arc<dyn crate::credentials::CredentialStore> =
            Arc::new(StaticCredentialStore::empty());
        let session = Arc::new(CredentialSession::init(Some(store)).unwrap());
        GeminiProvider::new(session).unwrap()
    }

    #[test]
    fn test_provider_name_and_capabilities() {
        let provider = provider_with_key("test-key");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.supports(ProviderCapability::ImageEditing));
        assert!(provider.supports(ProviderCapability::VideoGeneration));
    }

    #[test]
    fn test_provider_availability_tracks_session() {
        assert!(provider_with_key("test-key").is_available());
        assert!(!provider_without_key().is_available());
    }

    #[test]
    fn test_url_building() {
        let provider = provider_with_key("key");
        assert_eq!(
            provider.edit_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(
            provider.submit_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/veo-3.1-fast-generate-preview:predictLongRunning"
        );
        assert_eq!(
            provider.poll_url("operations/abc123"),
            "https://generativelanguage.googleapis.com/v1beta/operations/abc123"
        );
        assert_eq!(
            provider.poll_url("/operations/abc123"),
            "https://generativelanguage.googleapis.com/v1beta/operations/abc123"
        );
    }

    #[test]
    fn test_custom_base_url_and_models() {
        let provider = provider_with_key("key")
            .with_base_url("https://custom.api.com/v1")
            .with_image_model("image-x")
            .with_video_model("video-y");
        assert_eq!(
            provider.edit_url(),
            "https://custom.api.com/v1/models/image-x:generateContent"
        );
        assert_eq!(
            provider.submit_url(),
            "https://custom.api.com/v1/models/video-y:predictLongRunning"
        );
    }

    #[test]
    fn test_asset_url_appends_key_parameter() {
        let url = GeminiProvider::asset_url(
            "https://example.com/files/v.mp4?alt=media",
            "AIza-secret",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/files/v.mp4?alt=media&key=AIza-secret"
        );

        assert!(GeminiProvider::asset_url("file:///tmp/v.mp4", "k").is_err());
        assert!(GeminiProvider::asset_url("not a url", "k").is_err());
    }

    #[test]
    fn test_edit_request_serialization() {
        let image = UploadedImage::from_bytes(b"abc".to_vec(), "image/png");
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            data: image.encoded(),
                            mime_type: image.mime_type.clone(),
                        }),
                    },
                    Part {
                        text: Some("add a hat".to_string()),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"inlineData\":{\"data\":\"YWJj\",\"mimeType\":\"image/png\"}"));
        assert!(json.contains("\"text\":\"add a hat\""));
        assert!(json.contains("\"responseModalities\":[\"IMAGE\"]"));
        // Absent fields are skipped entirely
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_video_request_serialization() {
        let request = PredictVideoRequest {
            instances: vec![VideoInstance {
                prompt: "a cat surfing".to_string(),
                image: Some(ImageInstance {
                    bytes_base64_encoded: "YWJj".to_string(),
                    mime_type: "image/png".to_string(),
                }),
            }],
            parameters: VideoParameters {
                aspect_ratio: "9:16".to_string(),
                resolution: "720p".to_string(),
                sample_count: 1,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"prompt\":\"a cat surfing\""));
        assert!(json.contains("\"bytesBase64Encoded\":\"YWJj\""));
        assert!(json.contains("\"aspectRatio\":\"9:16\""));
        assert!(json.contains("\"resolution\":\"720p\""));
        assert!(json.contains("\"sampleCount\":1"));
    }

    #[test]
    fn test_first_inline_image_scans_parts() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your edit"},
                        {"inlineData": {"data": "YWJj", "mimeType": "image/png"}}
                    ]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();

        let inline = GeminiProvider::first_inline_image(response).unwrap();
        assert_eq!(inline.data, "YWJj");
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_first_inline_image_none_when_text_only() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert!(GeminiProvider::first_inline_image(response).is_none());
    }

    #[test]
    fn test_operation_deserialization_pending_and_done() {
        let pending = r#"{"name":"operations/abc"}"#;
        let op: OperationResponse = serde_json::from_str(pending).unwrap();
        assert_eq!(op.name, "operations/abc");
        assert!(!op.done);

        let done = r#"{
            "name": "operations/abc",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        {"video": {"uri": "https://example.com/files/v.mp4"}}
                    ]
                }
            }
        }"#;
        let op: OperationResponse = serde_json::from_str(done).unwrap();
        assert!(op.done);
        let uri = op
            .response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().next())
            .and_then(|s| s.video)
            .and_then(|v| v.uri);
        assert_eq!(uri.as_deref(), Some("https://example.com/files/v.mp4"));
    }

    #[test]
    fn test_operation_done_without_samples_has_no_uri() {
        let done = r#"{"name":"operations/abc","done":true,"response":{}}"#;
        let op: OperationResponse = serde_json::from_str(done).unwrap();
        assert!(op.done);
        assert!(op
            .response
            .and_then(|r| r.generate_video_response)
            .is_none());
    }

    #[test]
    fn test_parse_api_error_structured() {
        let provider = provider_with_key("key");
        let body = r#"{"error":{"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;

        let err = provider.parse_api_error(StatusCode::TOO_MANY_REQUESTS, body);
        match err {
            CoreError::RemoteCallFailed(msg) => {
                assert!(msg.contains("Quota exceeded"));
                assert!(msg.contains("RESOURCE_EXHAUSTED"));
            }
            other => panic!("Expected RemoteCallFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_api_error_unstructured() {
        let provider = provider_with_key("key");
        let err = provider.parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Server Error");
        match err {
            CoreError::RemoteCallFailed(msg) => assert!(msg.contains("Server Error")),
            other => panic!("Expected RemoteCallFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_api_error_entity_not_found_invalidates_session() {
        let provider = provider_with_key("key");
        assert!(provider.is_available());

        let body = format!(
            r#"{{"error":{{"message":"{}: operations/abc","status":"NOT_FOUND"}}}}"#,
            ENTITY_NOT_FOUND_MARKER
        );
        let err = provider.parse_api_error(StatusCode::NOT_FOUND, &body);

        assert!(matches!(err, CoreError::InvalidOrExpiredCredential));
        assert!(!provider.is_available());
    }
}
