//! Generative AI Subsystem
//!
//! Image editing and video generation against a remote provider. The
//! [`GenerativeProvider`] trait abstracts the service; [`GenerativeEngine`]
//! validates parameters, drives the submit/poll/download lifecycle, and
//! stamps results so front-ends can discard stale ones.

pub mod engine;
pub mod image;
pub mod provider_impls;
pub mod providers;
pub mod video;

pub use engine::{poll_until, GenerativeEngine, DEFAULT_POLL_INTERVAL};
pub use image::{ImageEditParams, ImageEditResult};
pub use providers::{GenerativeProvider, MockGenerativeProvider, ProviderCapability};
pub use video::{
    AspectRatio, VideoGenerationParams, VideoGenerationResult, VideoJobHandle, VideoJobStatus,
};
