//! Generative Engine
//!
//! Validates parameters, drives the submit/poll/download lifecycle against a
//! [`GenerativeProvider`], and stamps every video result with a generation
//! counter so front-ends can discard results from superseded requests.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::generative::image::{ImageEditParams, ImageEditResult};
use crate::generative::providers::{GenerativeProvider, ProviderCapability};
use crate::generative::video::{
    VideoGenerationParams, VideoGenerationResult, VideoJobHandle, VideoJobStatus,
};
use crate::{CoreError, CoreResult};

/// Interval between job polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Repeats `query` at a fixed `interval` until `is_done` accepts a result.
///
/// The first query runs immediately; the interval only separates attempts.
/// `observe` sees every intermediate result, done or not, so callers can
/// surface progress. Any query error stops the loop.
pub async fn poll_until<T, Q, Fut, D, O>(
    interval: Duration,
    mut query: Q,
    is_done: D,
    mut observe: O,
) -> CoreResult<T>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = CoreResult<T>>,
    D: Fn(&T) -> bool,
    O: FnMut(&T),
{
    loop {
        let value = query().await?;
        observe(&value);
        if is_done(&value) {
            return Ok(value);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Orchestrates generative operations against one provider
pub struct GenerativeEngine {
    provider: Arc<dyn GenerativeProvider>,
    poll_interval: Duration,
    /// Bumped on every video request; results carry the stamp they started with
    generation: AtomicU64,
}

impl GenerativeEngine {
    /// Creates an engine with the standard poll interval
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            generation: AtomicU64::new(0),
        }
    }

    /// Overrides the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stamp of the most recently started video request
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a result belongs to the most recently started request
    pub fn is_current(&self, result: &VideoGenerationResult) -> bool {
        result.generation == self.latest_generation()
    }

    fn require_capability(&self, capability: ProviderCapability) -> CoreResult<()> {
        if !self.provider.supports(capability) {
            return Err(CoreError::CapabilityUnavailable(format!(
                "{} does not support {capability}",
                self.provider.name()
            )));
        }
        if !self.provider.is_available() {
            return Err(CoreError::ValidationError(
                "Select an API key before submitting".to_string(),
            ));
        }
        Ok(())
    }

    /// Edits an image per the instruction
    pub async fn edit_image(&self, params: &ImageEditParams) -> CoreResult<ImageEditResult> {
        self.require_capability(ProviderCapability::ImageEditing)?;
        params.validate().map_err(CoreError::ValidationError)?;

        let started = Instant::now();
        debug!(provider = self.provider.name(), "submitting image edit");

        let (image_data, mime_type) = self.provider.edit_image(params).await?;

        let result = ImageEditResult {
            id: ulid::Ulid::new().to_string(),
            image_data,
            mime_type,
            model_used: self.provider.name().to_string(),
            generation_time_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            id = %result.id,
            elapsed_ms = result.generation_time_ms,
            "image edit completed"
        );

        Ok(result)
    }

    /// Generates a video, blocking until the asset is downloaded
    pub async fn generate_video(
        &self,
        params: &VideoGenerationParams,
    ) -> CoreResult<VideoGenerationResult> {
        self.generate_video_with_progress(params, |_| {}).await
    }

    /// Generates a video, reporting each poll outcome to `on_poll`
    pub async fn generate_video_with_progress<O>(
        &self,
        params: &VideoGenerationParams,
        on_poll: O,
    ) -> CoreResult<VideoGenerationResult>
    where
        O: FnMut(&VideoJobStatus),
    {
        self.require_capability(ProviderCapability::VideoGeneration)?;
        params.validate().map_err(CoreError::ValidationError)?;

        // A new request supersedes any still-polling predecessor. Both keep
        // running; the stamp lets callers drop the stale result on arrival.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let started = Instant::now();
        let handle = self.provider.submit_video(params).await?;
        info!(
            operation = %handle.operation_name,
            generation,
            "video job submitted"
        );

        let provider = Arc::clone(&self.provider);
        let status = poll_until(
            self.poll_interval,
            || {
                let provider = Arc::clone(&provider);
                let handle = handle.clone();
                async move { provider.poll_video(&handle).await }
            },
            VideoJobStatus::is_done,
            on_poll,
        )
        .await?;

        let asset_uri = match status {
            VideoJobStatus::Done { asset_uri: Some(uri) } => uri,
            VideoJobStatus::Done { asset_uri: None } => return Err(CoreError::AssetLinkMissing),
            VideoJobStatus::Pending => {
                return Err(CoreError::Internal(
                    "poll loop returned a pending status".to_string(),
                ))
            }
        };

        debug!(uri = %asset_uri, "downloading generated asset");
        let video_data = self.provider.fetch_asset(&asset_uri).await?;

        let result = VideoGenerationResult {
            id: ulid::Ulid::new().to_string(),
            video_data,
            mime_type: "video/mp4".to_string(),
            asset_uri,
            generation,
            generation_time_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            id = %result.id,
            bytes = result.video_data.len(),
            elapsed_ms = result.generation_time_ms,
            "video generation completed"
        );

        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::providers::MockGenerativeProvider;
    use crate::media::UploadedImage;
    use std::sync::atomic::AtomicUsize;

    const FAST_POLL: Duration = Duration::from_millis(1);

    fn engine_with(provider: MockGenerativeProvider) -> (GenerativeEngine, Arc<MockGenerativeProvider>) {
        let provider = Arc::new(provider);
        let engine =
            GenerativeEngine::new(provider.clone()).with_poll_interval(FAST_POLL);
        (engine, provider)
    }

    fn edit_params() -> ImageEditParams {
        ImageEditParams::new(
            UploadedImage::from_bytes(vec![0x89, b'P', b'N', b'G'], "image/png"),
            "add a hat",
        )
    }

    #[tokio::test]
    async fn test_poll_until_queries_until_done() {
        let calls = AtomicUsize::new(0);
        let mut seen = Vec::new();

        let value = poll_until(
            FAST_POLL,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok::<_, CoreError>(n) }
            },
            |n| *n >= 3,
            |n| seen.push(*n),
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_poll_until_propagates_query_errors() {
        let err = poll_until(
            FAST_POLL,
            || async { Err::<u32, _>(CoreError::RemoteCallFailed("boom".to_string())) },
            |_| true,
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CoreError::RemoteCallFailed(_)));
    }

    #[tokio::test]
    async fn test_edit_image_happy_path() {
        let (engine, provider) = engine_with(MockGenerativeProvider::new());

        let result = engine.edit_image(&edit_params()).await.unwrap();

        assert_eq!(result.image_data, b"mock-edited-image");
        assert_eq!(result.mime_type, "image/png");
        assert!(!result.id.is_empty());
        assert_eq!(provider.edit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider.last_edit_instruction.lock().unwrap().as_deref(),
            Some("add a hat")
        );
    }

    #[tokio::test]
    async fn test_edit_image_rejects_invalid_params_before_any_call() {
        let (engine, provider) = engine_with(MockGenerativeProvider::new());

        let params = ImageEditParams::new(
            UploadedImage::from_bytes(vec![1], "image/png"),
            "   ",
        );
        let err = engine.edit_image(&params).await.unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(provider.edit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_video_polls_through_pending_states() {
        let provider = MockGenerativeProvider::new().with_status_sequence(vec![
            VideoJobStatus::Pending,
            VideoJobStatus::Pending,
            VideoJobStatus::Done {
                asset_uri: Some("https://mock.local/v.mp4".to_string()),
            },
        ]);
        let (engine, provider) = engine_with(provider);

        let params = VideoGenerationParams::new("a cat surfing");
        let mut polls = 0;
        let result = engine
            .generate_video_with_progress(&params, |_| polls += 1)
            .await
            .unwrap();

        assert_eq!(polls, 3);
        assert_eq!(provider.submit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.poll_calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            provider.last_fetch_uri.lock().unwrap().as_deref(),
            Some("https://mock.local/v.mp4")
        );
        assert_eq!(result.video_data, b"mock-video-bytes");
        assert_eq!(result.mime_type, "video/mp4");
        assert_eq!(result.asset_uri, "https://mock.local/v.mp4");
    }

    #[tokio::test]
    async fn test_generate_video_appends_nothing_when_link_missing() {
        let provider = MockGenerativeProvider::new()
            .with_status_sequence(vec![VideoJobStatus::Done { asset_uri: None }]);
        let (engine, provider) = engine_with(provider);

        let err = engine
            .generate_video(&VideoGenerationParams::new("a cat surfing"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::AssetLinkMissing));
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_video_surfaces_download_failure() {
        let provider = MockGenerativeProvider::new().with_fetch_error();
        let (engine, _) = engine_with(provider);

        let err = engine
            .generate_video(&VideoGenerationParams::new("a cat surfing"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::AssetDownloadFailed(_)));
    }

    #[tokio::test]
    async fn test_generate_video_requires_capability() {
        let provider = MockGenerativeProvider::new()
            .with_capabilities(vec![ProviderCapability::ImageEditing]);
        let (engine, _) = engine_with(provider);

        let err = engine
            .generate_video(&VideoGenerationParams::new("a cat surfing"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::CapabilityUnavailable(_)));
    }

    #[tokio::test]
    async fn test_generate_video_requires_available_provider() {
        let provider = MockGenerativeProvider::new().with_available(false);
        let (engine, _) = engine_with(provider);

        let err = engine
            .generate_video(&VideoGenerationParams::new("a cat surfing"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older_result() {
        let (engine, _) = engine_with(MockGenerativeProvider::new());
        let params = VideoGenerationParams::new("a cat surfing");

        let first = engine.generate_video(&params).await.unwrap();
        assert!(engine.is_current(&first));

        let second = engine.generate_video(&params).await.unwrap();
        assert!(engine.is_current(&second));
        assert!(!engine.is_current(&first));
        assert!(second.generation > first.generation);
    }
}
