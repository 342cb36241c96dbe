// src/run.rs
// Run orchestrator. Drives the deduplicated worklist through a per-item
// state machine, strictly sequentially: fetch sources, cap and dedup, then
// for each item check media / ledger / existing output before spending
// money on narration, TTS and rendering. A single item's failure never
// aborts the run; failures are contained at the item boundary and counted.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::captions::generate_srt;
use crate::ingest::types::{CandidateItem, FeedProvider};
use crate::keys::build_video_key;
use crate::ledger::Ledger;
use crate::media::ImageFetcher;
use crate::narrate::{generate_with_fallback, NarrationProvider};
use crate::notify::Notifier;
use crate::render::Renderer;
use crate::retry::RetryPolicy;
use crate::select::{dedup_stories, select_recent, sort_newest_first, SIMILARITY_THRESHOLD};
use crate::settings::{Settings, StyleConfig};
use crate::storage::{delete_older_than, ObjectStore, VIDEO_PREFIX};
use crate::timeparse::iso_utc;
use crate::tts::SpeechSynthesizer;

/// One produced artifact. Created only on full pipeline success for an
/// item; never mutated afterward.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VideoResult {
    pub item_id: String,
    pub source_name: String,
    pub title: String,
    pub published: String,
    pub source_link: String,
    pub video_key: String,
    pub presigned_url: String,
    pub model_used: String,
    pub created_at: chrono::DateTime<Utc>,
}

/// Counters for one run, emitted as the machine-readable summary.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunStats {
    pub sources: usize,
    pub entries_seen: usize,
    pub skipped_same_story: usize,
    pub skipped_no_image: usize,
    pub skipped_duplicate_in_run: usize,
    pub skipped_already_processed: usize,
    pub skipped_output_exists: usize,
    pub skipped_no_downloadable_image: usize,
    pub processed: usize,
    pub errors: usize,
    pub retention_deleted_videos: usize,
    pub retention_pruned_ledger: usize,
    pub emails_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoImage,
    DuplicateInRun,
    AlreadyProcessed,
    OutputExists,
    NoDownloadableImage,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoImage => "no_image",
            SkipReason::DuplicateInRun => "duplicate_in_run",
            SkipReason::AlreadyProcessed => "already_processed",
            SkipReason::OutputExists => "output_exists",
            SkipReason::NoDownloadableImage => "no_downloadable_image",
        }
    }
}

impl RunStats {
    fn count_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoImage => self.skipped_no_image += 1,
            SkipReason::DuplicateInRun => self.skipped_duplicate_in_run += 1,
            SkipReason::AlreadyProcessed => self.skipped_already_processed += 1,
            SkipReason::OutputExists => self.skipped_output_exists += 1,
            SkipReason::NoDownloadableImage => self.skipped_no_downloadable_image += 1,
        }
    }
}

/// Outcome of one item's trip through the state machine. The loop pattern-
/// matches on this instead of unwinding; structured error propagation stays
/// inside the item step.
#[derive(Debug)]
pub enum ItemOutcome {
    Produced(Box<VideoResult>),
    Skipped(SkipReason),
    Errored(anyhow::Error),
}

/// The unreliable external collaborators, behind trait seams.
pub struct Collaborators {
    pub store: Box<dyn ObjectStore>,
    pub narrator: Box<dyn NarrationProvider>,
    pub narrator_fallback: Box<dyn NarrationProvider>,
    pub tts: Box<dyn SpeechSynthesizer>,
    pub images: Box<dyn ImageFetcher>,
    pub renderer: Box<dyn Renderer>,
    pub notifier: Box<dyn Notifier>,
}

/// Dry runs perform no external side effects at all: no store reads or
/// writes, no narration, no rendering, no email.
pub enum RunMode<'a> {
    DryRun,
    Live(&'a Collaborators),
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub timestamp_utc: String,
    pub stats: RunStats,
    pub created_count: usize,
    pub created: Vec<VideoResult>,
}

/// Run the whole pipeline once. `max_items` bounds how many items are
/// processed (produced or would-be-produced), not how many are skipped;
/// zero means unlimited.
pub async fn run_pipeline(
    settings: &Settings,
    style: &StyleConfig,
    providers: &[Box<dyn FeedProvider>],
    mode: RunMode<'_>,
    max_items: usize,
) -> Result<RunSummary> {
    let dry_run = matches!(mode, RunMode::DryRun);
    let mut stats = RunStats {
        sources: providers.len(),
        ..Default::default()
    };
    let mut created: Vec<VideoResult> = Vec::new();

    let mut ledger = match &mode {
        RunMode::Live(collab) => Ledger::load(collab.store.as_ref()).await?,
        RunMode::DryRun => {
            tracing::info!("dry run enabled; no render/upload/email side effects will occur");
            Ledger::default()
        }
    };

    let retry = RetryPolicy::new(settings.max_retries, Duration::from_secs(1));

    // Gather candidates, one source at a time. A failing source is counted
    // and skipped, never fatal.
    let mut candidates: Vec<CandidateItem> = Vec::new();
    for provider in providers {
        match provider.fetch_latest().await {
            Ok(items) => {
                let recent = select_recent(items, settings.max_recent_per_source);
                tracing::info!(
                    source = provider.name(),
                    kept = recent.len(),
                    "limited source to most recent items this run"
                );
                candidates.extend(recent);
            }
            Err(err) => {
                stats.errors += 1;
                tracing::error!(source = provider.name(), error = ?err, "failed to fetch source");
            }
        }
    }
    stats.entries_seen = candidates.len();

    // Global story dedup: earliest report wins, then newest stories first.
    let decision = dedup_stories(candidates, SIMILARITY_THRESHOLD);
    stats.skipped_same_story = decision.skipped_to_keeper.len();
    for (skipped_id, keeper_id) in &decision.skipped_to_keeper {
        tracing::info!(
            item_id = %skipped_id,
            keeper = %keeper_id,
            reason = "same_story",
            "skipping near-duplicate story"
        );
    }
    let worklist = sort_newest_first(decision.kept);
    tracing::info!(
        count = worklist.len(),
        skipped_same_story = stats.skipped_same_story,
        "processing unique stories by newest publish date first"
    );

    let mut processed_count = 0usize;
    let mut seen_ids: HashSet<String> = HashSet::new();

    for item in &worklist {
        if max_items > 0 && processed_count >= max_items {
            tracing::info!(max_items, "reached run item budget, stopping early");
            break;
        }

        if !seen_ids.insert(item.item_id.clone()) {
            stats.count_skip(SkipReason::DuplicateInRun);
            log_skip(item, SkipReason::DuplicateInRun);
            continue;
        }
        if item.image_urls.is_empty() {
            stats.count_skip(SkipReason::NoImage);
            log_skip(item, SkipReason::NoImage);
            continue;
        }
        if ledger.is_processed(&item.item_id) {
            stats.count_skip(SkipReason::AlreadyProcessed);
            log_skip(item, SkipReason::AlreadyProcessed);
            continue;
        }

        let key = build_video_key(&item.title, &item.item_id, &item.published);

        let collab = match &mode {
            RunMode::DryRun => {
                processed_count += 1;
                stats.processed += 1;
                tracing::info!(
                    item_id = %item.item_id,
                    source = %item.source_name,
                    images = item.image_urls.len(),
                    key = %key,
                    title = %item.title,
                    "[dry run] would process"
                );
                continue;
            }
            RunMode::Live(collab) => collab,
        };

        match collab.store.exists(&key).await {
            Ok(true) => {
                stats.count_skip(SkipReason::OutputExists);
                ledger.mark_processed(&item.item_id, None);
                tracing::info!(item_id = %item.item_id, key = %key, reason = SkipReason::OutputExists.as_str(), "skipping item");
                continue;
            }
            Ok(false) => {}
            Err(err) => {
                stats.errors += 1;
                tracing::error!(item_id = %item.item_id, error = ?err, "failed checking existing output");
                continue;
            }
        }

        match process_item(item, &key, collab, settings, style, &retry).await {
            ItemOutcome::Produced(result) => {
                ledger.mark_processed(&item.item_id, Some(result.created_at));
                tracing::info!(item_id = %item.item_id, key = %result.video_key, "processed item");
                created.push(*result);
                processed_count += 1;
                stats.processed += 1;
            }
            ItemOutcome::Skipped(reason) => {
                stats.count_skip(reason);
                log_skip(item, reason);
            }
            ItemOutcome::Errored(err) => {
                stats.errors += 1;
                tracing::error!(
                    item_id = %item.item_id,
                    title = %item.title,
                    error = ?err,
                    "failed processing item"
                );
            }
        }
    }

    // End-of-run housekeeping: retention, ledger persistence, notification.
    if let RunMode::Live(collab) = &mode {
        stats.retention_deleted_videos = match delete_older_than(
            collab.store.as_ref(),
            VIDEO_PREFIX,
            settings.retention_days,
            Utc::now(),
        )
        .await
        {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(error = ?err, "retention delete failed");
                0
            }
        };
        stats.retention_pruned_ledger = ledger.prune_expired(settings.retention_days, Utc::now());
        ledger.save(collab.store.as_ref()).await?;
        stats.emails_sent = match collab.notifier.send(&created).await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(error = ?err, "notification send failed");
                0
            }
        };
    }

    let summary = RunSummary {
        dry_run,
        timestamp_utc: iso_utc(Utc::now()),
        created_count: created.len(),
        stats,
        created,
    };
    write_run_summary(&settings.run_summary_path, &summary)?;
    Ok(summary)
}

fn log_skip(item: &CandidateItem, reason: SkipReason) {
    tracing::info!(
        item_id = %item.item_id,
        reason = reason.as_str(),
        title = %item.title,
        "skipping item"
    );
}

/// One item's trip through media -> narration -> audio -> render -> upload.
/// All errors are folded into `ItemOutcome::Errored` at this boundary.
async fn process_item(
    item: &CandidateItem,
    key: &str,
    collab: &Collaborators,
    settings: &Settings,
    style: &StyleConfig,
    retry: &RetryPolicy,
) -> ItemOutcome {
    match try_process_item(item, key, collab, settings, style, retry).await {
        Ok(outcome) => outcome,
        Err(err) => ItemOutcome::Errored(err),
    }
}

async fn try_process_item(
    item: &CandidateItem,
    key: &str,
    collab: &Collaborators,
    settings: &Settings,
    style: &StyleConfig,
    retry: &RetryPolicy,
) -> Result<ItemOutcome> {
    // Scratch area scoped to this single item; removed on success, skip and
    // error paths alike when it drops.
    let scratch = tempfile::Builder::new()
        .prefix("feedreel_")
        .tempdir()
        .context("creating scratch dir")?;
    let max_images = style.max_images_per_video.max(1);

    let downloaded = collab
        .images
        .download(&item.image_urls, &scratch.path().join("images"), max_images)
        .await
        .context("downloading images")?;
    if downloaded.is_empty() {
        return Ok(ItemOutcome::Skipped(SkipReason::NoDownloadableImage));
    }

    let narration = generate_with_fallback(
        collab.narrator.as_ref(),
        collab.narrator_fallback.as_ref(),
        retry,
        item,
    )
    .await
    .context("generating narration")?;

    let audio_path = scratch.path().join("voiceover.mp3");
    retry
        .run("tts", || {
            collab.tts.synthesize(&narration.narration_text, &audio_path)
        })
        .await
        .context("synthesizing speech")?;

    let audio_duration = collab
        .renderer
        .probe_audio_duration(&audio_path)
        .context("probing audio duration")?;
    let duration = audio_duration
        .max(style.min_duration_sec as f64)
        .min(style.max_duration_sec as f64);

    let srt_path = generate_srt(
        &narration.narration_text,
        duration,
        &scratch.path().join("captions.srt"),
    )?;

    let images: Vec<PathBuf> = downloaded.into_iter().take(max_images).collect();
    let output_video = scratch.path().join("clip.mp4");
    collab
        .renderer
        .render(&images, &audio_path, duration, Some(&srt_path), &output_video)
        .context("rendering video")?;

    collab
        .store
        .put_file(&output_video, key, "video/mp4")
        .await
        .context("uploading video")?;
    let presigned_url = collab
        .store
        .presign_get(key, settings.presign_expires_secs)
        .await
        .context("presigning video url")?;

    Ok(ItemOutcome::Produced(Box::new(VideoResult {
        item_id: item.item_id.clone(),
        source_name: item.source_name.clone(),
        title: item.title.clone(),
        published: item.published.clone(),
        source_link: item.link.clone(),
        video_key: key.to_string(),
        presigned_url,
        model_used: narration.model_used,
        created_at: Utc::now(),
    })))
}

fn write_run_summary(path: &str, summary: &RunSummary) -> Result<()> {
    let payload = serde_json::to_string_pretty(summary).context("encoding run summary")?;
    std::fs::write(path, payload).with_context(|| format!("writing run summary to {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reasons_have_distinct_labels() {
        let reasons = [
            SkipReason::NoImage,
            SkipReason::DuplicateInRun,
            SkipReason::AlreadyProcessed,
            SkipReason::OutputExists,
            SkipReason::NoDownloadableImage,
        ];
        let labels: HashSet<&str> = reasons.iter().map(|r| r.as_str()).collect();
        assert_eq!(labels.len(), reasons.len());
    }

    #[test]
    fn count_skip_maps_to_matching_counter() {
        let mut stats = RunStats::default();
        stats.count_skip(SkipReason::NoImage);
        stats.count_skip(SkipReason::OutputExists);
        stats.count_skip(SkipReason::OutputExists);
        assert_eq!(stats.skipped_no_image, 1);
        assert_eq!(stats.skipped_output_exists, 2);
        assert_eq!(stats.skipped_duplicate_in_run, 0);
    }
}
