// src/narrate.rs
// Narration generation against an OpenAI-compatible chat API, with a
// primary/secondary model fallback. The model is asked for strict JSON;
// everything it returns is re-normalized into the 35-95 word budget before
// it is allowed anywhere near the TTS stage.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ExternalError;
use crate::ingest::types::CandidateItem;
use crate::retry::RetryPolicy;

pub const MIN_WORDS: usize = 35;
pub const MAX_WORDS: usize = 95;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub narration_text: String,
    pub on_screen_hook: String,
    pub model_used: String,
}

#[async_trait]
pub trait NarrationProvider: Send + Sync {
    async fn generate(&self, item: &CandidateItem) -> Result<Narration, ExternalError>;
    /// Provider/model name for diagnostics and result records.
    fn name(&self) -> &str;
}

pub struct OpenAiNarrator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiNarrator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_prompt(item: &CandidateItem) -> String {
        let title: String = item.title.chars().take(350).collect();
        let summary: String = item.summary.chars().take(1600).collect();
        format!(
            r#"You are writing short voiceover scripts for vertical sports videos.
You MUST use only facts present in the feed fields below. Do not invent details.
If details are limited, keep wording general and clearly avoid specifics not present.

Output strict JSON with this exact shape:
{{
  "narration_text": "{MIN_WORDS}-{MAX_WORDS} words, spoken style, no hashtags, no emojis, no weird symbols",
  "on_screen_hook": "optional, max 8 words"
}}

Feed title:
{title}

Feed summary:
{summary}
"#
        )
    }
}

#[async_trait]
impl NarrationProvider for OpenAiNarrator {
    async fn generate(&self, item: &CandidateItem) -> Result<Narration, ExternalError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let prompt = Self::build_prompt(item);
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.4,
        };

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let tail: String = detail.chars().take(300).collect();
            return Err(ExternalError::from_status(status.as_u16(), tail));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ExternalError::InvalidResponse(e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();
        let payload = parse_model_json(content)?;
        normalize_narration(payload, &self.model)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Run the full retry policy against the primary provider; if it exhausts
/// with a retry-worthy failure, run the full policy again against the
/// secondary with its own attempt budget. A non-retryable primary failure
/// propagates without touching the secondary.
pub async fn generate_with_fallback(
    primary: &dyn NarrationProvider,
    secondary: &dyn NarrationProvider,
    policy: &RetryPolicy,
    item: &CandidateItem,
) -> Result<Narration, ExternalError> {
    match policy.run(primary.name(), || primary.generate(item)).await {
        Ok(narration) => Ok(narration),
        Err(err) if err.is_retryable() => {
            tracing::warn!(
                item_id = %item.item_id,
                primary = primary.name(),
                secondary = secondary.name(),
                error = %err,
                "primary narration model exhausted; falling back"
            );
            policy.run(secondary.name(), || secondary.generate(item)).await
        }
        Err(err) => Err(err),
    }
}

#[derive(Debug, Deserialize)]
struct NarrationPayload {
    #[serde(default)]
    narration_text: String,
    #[serde(default)]
    on_screen_hook: String,
}

/// Models wrap JSON in code fences or chatter more often than they should.
fn parse_model_json(text: &str) -> Result<NarrationPayload, ExternalError> {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re_fence =
        RE_FENCE.get_or_init(|| Regex::new(r"(?s)^```(?:json)?\s*|\s*```$").unwrap());
    static RE_OBJ: OnceCell<Regex> = OnceCell::new();
    let re_obj = RE_OBJ.get_or_init(|| Regex::new(r"(?s)\{.*\}").unwrap());

    let trimmed = re_fence.replace_all(text.trim(), "").to_string();
    if let Ok(payload) = serde_json::from_str::<NarrationPayload>(&trimmed) {
        return Ok(payload);
    }
    let found = re_obj
        .find(&trimmed)
        .ok_or_else(|| ExternalError::InvalidResponse("no JSON object in model output".into()))?;
    serde_json::from_str(found.as_str())
        .map_err(|e| ExternalError::InvalidResponse(format!("bad model JSON: {e}")))
}

fn truncate_to_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    let cut = words[..max_words].join(" ");
    format!("{}.", cut.trim_end_matches(['.', ',', ';', ':', '!', '?']))
}

fn normalize_narration(
    payload: NarrationPayload,
    model: &str,
) -> Result<Narration, ExternalError> {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let mut narration = re_ws
        .replace_all(payload.narration_text.trim(), " ")
        .replace('#', "");

    if narration.split_whitespace().count() > MAX_WORDS {
        narration = truncate_to_words(&narration, MAX_WORDS);
    } else if narration.split_whitespace().count() < MIN_WORDS {
        narration = format!(
            "{} This update is based on the feed item details currently available.",
            narration
        )
        .trim()
        .to_string();
        narration = truncate_to_words(&narration, MAX_WORDS);
    }

    if narration.split_whitespace().count() < MIN_WORDS {
        return Err(ExternalError::InvalidResponse(
            "narration too short after normalization".into(),
        ));
    }

    Ok(Narration {
        narration_text: narration,
        on_screen_hook: payload.on_screen_hook.trim().to_string(),
        model_used: model.to_string(),
    })
}
