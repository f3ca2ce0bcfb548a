//! Generative Provider Abstraction
//!
//! Providers expose the remote service behind a uniform async trait. Each
//! operation has a default body that reports the capability as unavailable,
//! so a provider only implements what it actually supports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::generative::image::ImageEditParams;
use crate::generative::video::{VideoGenerationParams, VideoJobHandle, VideoJobStatus};
use crate::{CoreError, CoreResult};

/// Operations a provider can support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCapability {
    /// Instruction-driven image editing
    ImageEditing,
    /// Text/image-to-video job generation
    VideoGeneration,
}

impl std::fmt::Display for ProviderCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderCapability::ImageEditing => write!(f, "image_editing"),
            ProviderCapability::VideoGeneration => write!(f, "video_generation"),
        }
    }
}

/// A remote generative service
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Provider name, for logging and result metadata
    fn name(&self) -> &str;

    /// Capabilities this provider supports
    fn capabilities(&self) -> Vec<ProviderCapability>;

    /// Whether the given capability is supported
    fn supports(&self, capability: ProviderCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Whether the provider is ready to take requests (credential present)
    fn is_available(&self) -> bool;

    /// Edits an image per the instruction, returning the edited bytes
    async fn edit_image(&self, _params: &ImageEditParams) -> CoreResult<(Vec<u8>, String)> {
        Err(CoreError::CapabilityUnavailable(format!(
            "{} does not support image editing",
            self.name()
        )))
    }

    /// Submits a video generation job
    async fn submit_video(&self, _params: &VideoGenerationParams) -> CoreResult<VideoJobHandle> {
        Err(CoreError::CapabilityUnavailable(format!(
            "{} does not support video generation",
            self.name()
        )))
    }

    /// Polls a submitted job once
    async fn poll_video(&self, _handle: &VideoJobHandle) -> CoreResult<VideoJobStatus> {
        Err(CoreError::CapabilityUnavailable(format!(
            "{} does not support video generation",
            self.name()
        )))
    }

    /// Downloads a finished asset by URI
    async fn fetch_asset(&self, _uri: &str) -> CoreResult<Vec<u8>> {
        Err(CoreError::CapabilityUnavailable(format!(
            "{} does not support asset download",
            self.name()
        )))
    }
}

/// In-memory provider for tests and offline development
pub struct MockGenerativeProvider {
    available: bool,
    capabilities: Vec<ProviderCapability>,
    /// Statuses returned by successive polls; empty means immediately done
    statuses: Mutex<VecDeque<VideoJobStatus>>,
    asset_bytes: Vec<u8>,
    fail_fetch: bool,
    pub edit_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub last_edit_instruction: Mutex<Option<String>>,
    pub last_fetch_uri: Mutex<Option<String>>,
}

impl Default for MockGenerativeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerativeProvider {
    pub fn new() -> Self {
        Self {
            available: true,
            capabilities: vec![
                ProviderCapability::ImageEditing,
                ProviderCapability::VideoGeneration,
            ],
            statuses: Mutex::new(VecDeque::new()),
            asset_bytes: b"mock-video-bytes".to_vec(),
            fail_fetch: false,
            edit_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            last_edit_instruction: Mutex::new(None),
            last_fetch_uri: Mutex::new(None),
        }
    }

    /// Queues the statuses successive polls will report
    pub fn with_status_sequence(self, statuses: Vec<VideoJobStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// Sets the bytes returned by asset downloads
    pub fn with_asset(mut self, bytes: Vec<u8>) -> Self {
        self.asset_bytes = bytes;
        self
    }

    /// Makes asset downloads fail
    pub fn with_fetch_error(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Overrides availability
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Overrides the capability set
    pub fn with_capabilities(mut self, capabilities: Vec<ProviderCapability>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[async_trait]
impl GenerativeProvider for MockGenerativeProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> Vec<ProviderCapability> {
        self.capabilities.clone()
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn edit_image(&self, params: &ImageEditParams) -> CoreResult<(Vec<u8>, String)> {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_edit_instruction.lock().unwrap() = Some(params.instruction.clone());
        Ok((b"mock-edited-image".to_vec(), "image/png".to_string()))
    }

    async fn submit_video(&self, _params: &VideoGenerationParams) -> CoreResult<VideoJobHandle> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoJobHandle {
            operation_name: "operations/mock-job-1".to_string(),
            submitted_at: chrono::Utc::now().timestamp(),
        })
    }

    async fn poll_video(&self, _handle: &VideoJobHandle) -> CoreResult<VideoJobStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or(VideoJobStatus::Done {
            asset_uri: Some("https://mock.local/video.mp4".to_string()),
        }))
    }

    async fn fetch_asset(&self, uri: &str) -> CoreResult<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch_uri.lock().unwrap() = Some(uri.to_string());
        if self.fail_fetch {
            return Err(CoreError::AssetDownloadFailed(format!(
                "HTTP 403 fetching {uri}"
            )));
        }
        Ok(self.asset_bytes.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
