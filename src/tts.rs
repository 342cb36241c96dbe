// src/tts.rs
// Speech synthesis against an ElevenLabs-style HTTP API. Single provider,
// no secondary tier; transient statuses map into the retryable taxonomy.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ExternalError;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` into an audio file at `out_path`.
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<PathBuf, ExternalError>;
}

pub struct ElevenLabsTts {
    http: reqwest::Client,
    api_key: String,
    voice_id: String,
    model: String,
    stability: f32,
    similarity: f32,
    base_url: String,
}

impl ElevenLabsTts {
    pub fn new(
        api_key: String,
        voice_id: String,
        model: String,
        stability: f32,
        similarity: f32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(45))
            .build()?;
        Ok(Self {
            http,
            api_key,
            voice_id,
            model,
            stability,
            similarity,
            base_url: "https://api.elevenlabs.io".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str, out_path: &Path) -> Result<PathBuf, ExternalError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let payload = json!({
            "text": text,
            "model_id": self.model,
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity,
            },
        });

        let resp = self
            .http
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let tail: String = detail.chars().take(300).collect();
            return Err(ExternalError::from_status(status.as_u16(), tail));
        }

        let audio = resp.bytes().await?;
        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExternalError::InvalidResponse(format!("creating audio dir: {e}")))?;
        }
        tokio::fs::write(out_path, &audio)
            .await
            .map_err(|e| ExternalError::InvalidResponse(format!("writing audio file: {e}")))?;
        Ok(out_path.to_path_buf())
    }
}
