//! TDX Studio CLI
//!
//! Headless front-end for the TDX Studio core engine: edit images with an
//! instruction or generate videos from a prompt, writing results to disk.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tdx_studio_core::credentials::{CredentialSession, EnvCredentialStore};
use tdx_studio_core::generative::provider_impls::GeminiProvider;
use tdx_studio_core::generative::{
    AspectRatio, GenerativeEngine, ImageEditParams, VideoGenerationParams, VideoJobStatus,
};
use tdx_studio_core::media::UploadedImage;
use tdx_studio_core::notice::NoticeSlot;

/// Environment variable holding the API key
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Status lines rotated through while a video job renders
const LOADING_MESSAGES: &[&str] = &[
    "Warming up the render farm...",
    "Composing your scene...",
    "Teaching pixels to move...",
    "Rendering frames...",
    "Almost there, polishing the final cut...",
];

#[derive(Parser)]
#[command(name = "tdx-studio")]
#[command(about = "TDX Creative Studio - AI image editing and video generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit result metadata as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit an image with a natural-language instruction
    EditImage {
        /// Input image file (PNG, JPG, WebP, ...)
        #[arg(short, long)]
        image: PathBuf,

        /// Editing instruction, e.g. "make the sky purple"
        #[arg(short = 'n', long)]
        instruction: String,

        /// Output file path
        #[arg(short, long, default_value = "edited-image.png")]
        output: PathBuf,
    },

    /// Generate a video from a text prompt
    GenerateVideo {
        /// Video prompt
        #[arg(short, long)]
        prompt: String,

        /// Output aspect ratio (16:9 or 9:16)
        #[arg(long, default_value = "16:9")]
        aspect_ratio: AspectRatio,

        /// Optional first-frame image to animate
        #[arg(long)]
        seed_image: Option<PathBuf>,

        /// Output file path
        #[arg(short, long, default_value = "generated-video.mp4")]
        output: PathBuf,

        /// Seconds between job status polls
        #[arg(long, default_value_t = 10)]
        poll_interval_secs: u64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EditImageOutput {
    id: String,
    output: PathBuf,
    mime_type: String,
    bytes: usize,
    generation_time_ms: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoOutput {
    id: String,
    output: PathBuf,
    mime_type: String,
    bytes: usize,
    generation_time_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = Arc::new(
        CredentialSession::init(Some(Arc::new(EnvCredentialStore::new(API_KEY_ENV))))
            .context("failed to initialize the credential session")?,
    );
    let provider = Arc::new(
        GeminiProvider::new(Arc::clone(&session)).context("failed to create the provider")?,
    );

    match cli.command {
        Commands::EditImage {
            image,
            instruction,
            output,
        } => edit_image_command(provider, image, instruction, output, cli.json).await,
        Commands::GenerateVideo {
            prompt,
            aspect_ratio,
            seed_image,
            output,
            poll_interval_secs,
        } => {
            generate_video_command(
                provider,
                prompt,
                aspect_ratio,
                seed_image,
                output,
                poll_interval_secs,
                cli.json,
            )
            .await
        }
    }
}

async fn edit_image_command(
    provider: Arc<GeminiProvider>,
    image_path: PathBuf,
    instruction: String,
    output: PathBuf,
    json: bool,
) -> Result<()> {
    let engine = GenerativeEngine::new(provider);

    let image = UploadedImage::from_path(&image_path).await?;
    let params = ImageEditParams::new(image, instruction);

    info!("editing {}", image_path.display());
    let result = engine.edit_image(&params).await?;

    tokio::fs::write(&output, &result.image_data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    if json {
        let summary = EditImageOutput {
            id: result.id,
            output,
            mime_type: result.mime_type,
            bytes: result.image_data.len(),
            generation_time_ms: result.generation_time_ms,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Edited image written to {} ({} bytes, {} ms)",
            output.display(),
            result.image_data.len(),
            result.generation_time_ms
        );
    }

    Ok(())
}

async fn generate_video_command(
    provider: Arc<GeminiProvider>,
    prompt: String,
    aspect_ratio: AspectRatio,
    seed_image: Option<PathBuf>,
    output: PathBuf,
    poll_interval_secs: u64,
    json: bool,
) -> Result<()> {
    let engine = GenerativeEngine::new(provider)
        .with_poll_interval(Duration::from_secs(poll_interval_secs));

    let mut params = VideoGenerationParams::new(prompt).with_aspect_ratio(aspect_ratio);
    if let Some(path) = seed_image {
        params = params.with_seed_image(UploadedImage::from_path(&path).await?);
    }

    // Each pending poll replaces the status line; it expires after one interval.
    let mut status_line = NoticeSlot::default();
    let mut polls = 0usize;
    let result = engine
        .generate_video_with_progress(&params, |status: &VideoJobStatus| {
            if !status.is_done() {
                status_line.set_with_ttl(
                    LOADING_MESSAGES[polls % LOADING_MESSAGES.len()],
                    Duration::from_secs(poll_interval_secs),
                );
                polls += 1;
                if let Some(message) = status_line.message() {
                    eprintln!("{message}");
                }
            }
        })
        .await?;

    tokio::fs::write(&output, &result.video_data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    if json {
        let summary = GenerateVideoOutput {
            id: result.id,
            output,
            mime_type: result.mime_type,
            bytes: result.video_data.len(),
            generation_time_ms: result.generation_time_ms,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Generated video written to {} ({} bytes, {} ms)",
            output.display(),
            result.video_data.len(),
            result.generation_time_ms
        );
    }

    Ok(())
}
