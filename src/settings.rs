// src/settings.rs
// Environment-driven settings plus file-based feeds/style config.
// Secrets stay in the environment (.env in local runs); feeds and style are
// checked-in files, TOML or JSON, with an env-var path override.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedConfig;

pub const ENV_FEEDS_PATH: &str = "FEEDS_CONFIG_PATH";
pub const ENV_STYLE_PATH: &str = "STYLE_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_primary_model: String,
    pub openai_fallback_model: String,
    pub openai_primary_timeout_secs: u64,
    pub openai_fallback_timeout_secs: u64,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub elevenlabs_model: String,
    pub elevenlabs_stability: f32,
    pub elevenlabs_similarity: f32,
    pub store_access_key_id: Option<String>,
    pub store_secret_access_key: Option<String>,
    pub store_bucket: String,
    pub store_endpoint: Option<String>,
    pub store_region: String,
    pub presign_expires_secs: u64,
    pub retention_days: i64,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub email_to: Option<String>,
    pub email_mode: String,
    pub always_email: bool,
    pub max_recent_per_source: i32,
    pub max_retries: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub user_agent: String,
    pub run_summary_path: String,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_opt(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env_opt(name) {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_primary_model: env_or("OPENAI_PRIMARY_MODEL", "gpt-5-mini"),
            openai_fallback_model: env_or("OPENAI_FALLBACK_MODEL", "gpt-4.1-nano"),
            openai_primary_timeout_secs: env_parsed("OPENAI_PRIMARY_TIMEOUT_SECS", 20),
            openai_fallback_timeout_secs: env_parsed("OPENAI_FALLBACK_TIMEOUT_SECS", 15),
            elevenlabs_api_key: env_opt("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: env_opt("ELEVENLABS_VOICE_ID"),
            elevenlabs_model: env_or("ELEVENLABS_MODEL", "eleven_multilingual_v2"),
            elevenlabs_stability: env_parsed("ELEVENLABS_STABILITY", 0.5),
            elevenlabs_similarity: env_parsed("ELEVENLABS_SIMILARITY", 0.8),
            store_access_key_id: env_opt("STORE_ACCESS_KEY_ID"),
            store_secret_access_key: env_opt("STORE_SECRET_ACCESS_KEY"),
            store_bucket: env_or("STORE_BUCKET", "videoshorts"),
            store_endpoint: env_opt("STORE_ENDPOINT"),
            store_region: env_or("STORE_REGION", "auto"),
            presign_expires_secs: env_parsed("PRESIGN_EXPIRES_SECS", 604_800),
            retention_days: env_parsed("RETENTION_DAYS", 30),
            smtp_host: env_or("SMTP_HOST", "smtp.gmail.com"),
            smtp_port: env_parsed("SMTP_PORT", 587),
            smtp_user: env_opt("SMTP_USER"),
            smtp_pass: env_opt("SMTP_PASS"),
            email_to: env_opt("EMAIL_TO"),
            email_mode: env_or("EMAIL_MODE", "digest").trim().to_ascii_lowercase(),
            always_email: env_bool("ALWAYS_EMAIL", false),
            max_recent_per_source: env_parsed("MAX_RECENT_PER_SOURCE", 5),
            max_retries: env_parsed("MAX_RETRIES", 3),
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: env_or("FFPROBE_BIN", "ffprobe"),
            user_agent: env_or("HTTP_USER_AGENT", "feedreel/0.1 (+https://github.com/feedreel/feedreel)"),
            run_summary_path: env_or("RUN_SUMMARY_PATH", "run_summary.json"),
        }
    }
}

/// Missing run-level credentials are fatal: the run aborts before any item
/// is processed.
pub fn require(value: &Option<String>, name: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| anyhow!("Missing required environment variable: {name}"))
}

/// Rendering knobs for the vertical clip.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    pub min_duration_sec: u32,
    pub max_duration_sec: u32,
    pub caption_font_size: u32,
    pub caption_margin_v: u32,
    pub fps: u32,
    pub bitrate: String,
    pub max_images_per_video: usize,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            min_duration_sec: 10,
            max_duration_sec: 45,
            caption_font_size: 46,
            caption_margin_v: 96,
            fps: 30,
            bitrate: "4M".to_string(),
            max_images_per_video: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedsFile {
    feeds: Vec<FeedConfig>,
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))
}

fn parse_feeds(content: &str, hint_ext: &str) -> Result<Vec<FeedConfig>> {
    if hint_ext == "toml" {
        let parsed: FeedsFile = toml::from_str(content).context("parsing feeds toml")?;
        return Ok(clean_feeds(parsed.feeds));
    }
    let parsed: Vec<FeedConfig> = serde_json::from_str(content).context("parsing feeds json")?;
    Ok(clean_feeds(parsed))
}

fn clean_feeds(feeds: Vec<FeedConfig>) -> Vec<FeedConfig> {
    feeds
        .into_iter()
        .map(|f| FeedConfig {
            name: f.name.trim().to_string(),
            url: f.url.trim().to_string(),
        })
        .filter(|f| !f.name.is_empty() && !f.url.is_empty())
        .collect()
}

/// Load feeds from an explicit path, or via fallbacks:
/// 1) `$FEEDS_CONFIG_PATH`  2) config/feeds.toml  3) config/feeds.json
pub fn load_feeds_config(explicit: Option<&Path>) -> Result<Vec<FeedConfig>> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            if let Some(p) = env_opt(ENV_FEEDS_PATH) {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_FEEDS_PATH} points to non-existent path");
                }
                pb
            } else {
                let toml_p = PathBuf::from("config/feeds.toml");
                let json_p = PathBuf::from("config/feeds.json");
                if toml_p.exists() {
                    toml_p
                } else if json_p.exists() {
                    json_p
                } else {
                    bail!("no feeds config found (config/feeds.toml or config/feeds.json)");
                }
            }
        }
    };
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&read_config_file(&path)?, &ext)
}

/// Load style from an explicit path or the config/style.{toml,json}
/// fallbacks; a missing file yields the defaults.
pub fn load_style_config(explicit: Option<&Path>) -> Result<StyleConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            if let Some(p) = env_opt(ENV_STYLE_PATH) {
                PathBuf::from(p)
            } else {
                let toml_p = PathBuf::from("config/style.toml");
                let json_p = PathBuf::from("config/style.json");
                if toml_p.exists() {
                    toml_p
                } else if json_p.exists() {
                    json_p
                } else {
                    return Ok(StyleConfig::default());
                }
            }
        }
    };
    let content = read_config_file(&path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext == "toml" {
        toml::from_str(&content).context("parsing style toml")
    } else {
        serde_json::from_str(&content).context("parsing style json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeds_parse_toml_and_json_and_filter_blanks() {
        let toml_src = r#"
            [[feeds]]
            name = " ESPN "
            url = "https://espn.test/rss"

            [[feeds]]
            name = ""
            url = "https://dropped.test/rss"
        "#;
        let feeds = parse_feeds(toml_src, "toml").unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name, "ESPN");

        let json_src = r#"[{"name": "BBC", "url": " https://bbc.test/rss "}]"#;
        let feeds = parse_feeds(json_src, "json").unwrap();
        assert_eq!(feeds[0].url, "https://bbc.test/rss");
    }

    #[test]
    fn style_defaults_apply_to_partial_files() {
        let style: StyleConfig = toml::from_str("fps = 24").unwrap();
        assert_eq!(style.fps, 24);
        assert_eq!(style.max_images_per_video, 3);
        assert_eq!(style.bitrate, "4M");
    }

    #[serial_test::serial]
    #[test]
    fn from_env_reads_overrides_and_defaults() {
        std::env::set_var("MAX_RECENT_PER_SOURCE", "7");
        std::env::set_var("ALWAYS_EMAIL", "true");
        let s = Settings::from_env();
        assert_eq!(s.max_recent_per_source, 7);
        assert!(s.always_email);

        std::env::remove_var("MAX_RECENT_PER_SOURCE");
        std::env::remove_var("ALWAYS_EMAIL");
        let s = Settings::from_env();
        assert_eq!(s.max_recent_per_source, 5);
        assert!(!s.always_email);
        assert_eq!(s.retention_days, 30);
        assert_eq!(s.email_mode, "digest");
    }

    #[test]
    fn require_reports_missing_name() {
        let err = require(&None, "OPENAI_API_KEY").unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert_eq!(require(&Some("k".into()), "X").unwrap(), "k");
    }
}
