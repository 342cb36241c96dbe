//! feedreel — Binary Entrypoint
//! Polls configured RSS feeds and turns new stories into short vertical
//! videos: narration, voiceover, slideshow render, upload, email digest.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedreel::ingest::rss::RssFeedProvider;
use feedreel::ingest::types::FeedProvider;
use feedreel::media::HttpImageFetcher;
use feedreel::narrate::OpenAiNarrator;
use feedreel::notify::email::{EmailMode, EmailNotifier};
use feedreel::render::FfmpegRenderer;
use feedreel::run::{run_pipeline, Collaborators, RunMode};
use feedreel::settings::{self, require, Settings, StyleConfig};
use feedreel::storage::S3CompatStore;
use feedreel::tts::ElevenLabsTts;

#[derive(Parser)]
#[command(name = "feedreel")]
#[command(author, version, about = "Generate short videos from RSS feed items")]
struct Cli {
    /// No rendering/upload/email side effects
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of new items to process in this run (0 means unlimited)
    #[arg(long, default_value_t = 0)]
    max_items: usize,

    /// Path to feeds config file (defaults to config/feeds.{toml,json})
    #[arg(long)]
    feeds: Option<PathBuf>,

    /// Path to style config file (defaults to config/style.{toml,json})
    #[arg(long)]
    style: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Wire up the live collaborators. Missing credentials are fatal here,
/// before any item is touched.
fn build_collaborators(settings: &Settings, style: &StyleConfig) -> Result<Collaborators> {
    let endpoint = require(&settings.store_endpoint, "STORE_ENDPOINT")?;
    let store = S3CompatStore::new(
        require(&settings.store_access_key_id, "STORE_ACCESS_KEY_ID")?,
        require(&settings.store_secret_access_key, "STORE_SECRET_ACCESS_KEY")?,
        settings.store_bucket.clone(),
        endpoint,
        settings.store_region.clone(),
    )?;

    let openai_key = require(&settings.openai_api_key, "OPENAI_API_KEY")?;
    let narrator = OpenAiNarrator::new(
        openai_key.clone(),
        settings.openai_primary_model.clone(),
        Duration::from_secs(settings.openai_primary_timeout_secs),
    )?;
    let narrator_fallback = OpenAiNarrator::new(
        openai_key,
        settings.openai_fallback_model.clone(),
        Duration::from_secs(settings.openai_fallback_timeout_secs),
    )?;

    let tts = ElevenLabsTts::new(
        require(&settings.elevenlabs_api_key, "ELEVENLABS_API_KEY")?,
        require(&settings.elevenlabs_voice_id, "ELEVENLABS_VOICE_ID")?,
        settings.elevenlabs_model.clone(),
        settings.elevenlabs_stability,
        settings.elevenlabs_similarity,
    )?;

    let notifier = EmailNotifier::new(
        &settings.smtp_host,
        settings.smtp_port,
        &require(&settings.smtp_user, "SMTP_USER")?,
        &require(&settings.smtp_pass, "SMTP_PASS")?,
        &require(&settings.email_to, "EMAIL_TO")?,
        EmailMode::parse(&settings.email_mode),
        settings.always_email,
    )?;

    Ok(Collaborators {
        store: Box::new(store),
        narrator: Box::new(narrator),
        narrator_fallback: Box::new(narrator_fallback),
        tts: Box::new(tts),
        images: Box::new(HttpImageFetcher::new(&settings.user_agent)?),
        renderer: Box::new(FfmpegRenderer::new(
            style.clone(),
            settings.ffmpeg_bin.clone(),
            settings.ffprobe_bin.clone(),
        )),
        notifier: Box::new(notifier),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local runs; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let feeds = settings::load_feeds_config(cli.feeds.as_deref())?;
    let style = settings::load_style_config(cli.style.as_deref())?;

    let providers: Vec<Box<dyn FeedProvider>> = feeds
        .into_iter()
        .map(|cfg| {
            RssFeedProvider::new(cfg, &settings.user_agent)
                .map(|p| Box::new(p) as Box<dyn FeedProvider>)
        })
        .collect::<Result<_>>()?;

    let collaborators;
    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        collaborators = build_collaborators(&settings, &style)?;
        RunMode::Live(&collaborators)
    };

    let summary = run_pipeline(&settings, &style, &providers, mode, cli.max_items).await?;
    tracing::info!(
        stats = %serde_json::to_string(&summary.stats)?,
        "run finished"
    );
    Ok(())
}
