//! Vision-LLM answering backend.
//!
//! Sends the page image plus the question to any `edgequake-llm` provider
//! and asks for a JSON list of scored answers (see [`crate::prompts`]).
//! Models do not always obey "JSON only", so the reply is parsed leniently:
//! code fences and surrounding prose are stripped before decoding.

use crate::config::{SearchConfig, DEFAULT_VLM_MODEL};
use crate::error::{DocQaError, InferenceError};
use crate::pipeline::encode::encode_page;
use crate::pipeline::inference::{
    answers_from_values, InferenceClient, InferenceParams, RawAnswer, RetryPolicy,
};
use crate::prompts::{qa_system_prompt, question_message};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// [`InferenceClient`] backed by a vision LLM.
pub struct VlmClient {
    provider: Arc<dyn LLMProvider>,
    name: String,
    temperature: f32,
    retry: RetryPolicy,
    timeout_secs: u64,
}

impl VlmClient {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &SearchConfig) -> Self {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VLM_MODEL);
        Self {
            provider,
            name: format!("vlm:{model}"),
            temperature: config.temperature,
            retry: RetryPolicy::from_config(config),
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from config and the environment.
    pub async fn from_config(config: &SearchConfig) -> Result<Self, DocQaError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn chat_once(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, InferenceError> {
        let call = self.provider.chat(messages, Some(options));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| InferenceError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| InferenceError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[async_trait]
impl InferenceClient for VlmClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn answer(
        &self,
        question: &str,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawAnswer>, InferenceError> {
        let image_data = encode_page(image).map_err(|e| InferenceError::Encode(e.to_string()))?;

        let messages = vec![
            ChatMessage::system(qa_system_prompt(params.top_k, params.max_answer_length)),
            ChatMessage::user_with_images(&question_message(question), vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(params.max_answer_length.saturating_mul(params.top_k) + 64),
            ..Default::default()
        };

        let content = self
            .retry
            .run(&self.name, || self.chat_once(&messages, &options))
            .await?;

        let mut answers = parse_answers(&content)?;
        answers.truncate(params.top_k);
        Ok(answers)
    }
}

// ── Reply parsing ────────────────────────────────────────────────────────

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n?(.*?)```").expect("valid regex")
});

/// Decode a VLM reply into raw answers.
///
/// Accepts `{"answers": [...]}`, a bare list, or a single answer object,
/// optionally inside a code fence or between prose. Parsing stops at the
/// end of the first complete JSON value, so trailing text may contain
/// braces. Scores are clamped to `[0, 1]`.
pub fn parse_answers(content: &str) -> Result<Vec<RawAnswer>, InferenceError> {
    let body = FENCE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content);
    let value = first_json_value(body).ok_or_else(|| {
        InferenceError::InvalidResponse(format!(
            "no JSON in model reply: {}",
            body.chars().take(120).collect::<String>()
        ))
    })?;

    let value = match value {
        Value::Object(mut map) if map.contains_key("answers") => {
            map.remove("answers").unwrap_or(Value::Null)
        }
        other => other,
    };
    let answers = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => answers_from_values(items),
        other => serde_json::from_value::<RawAnswer>(other)
            .map(|a| vec![a])
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?,
    };

    Ok(answers
        .into_iter()
        .map(|mut a| {
            if a.score.is_finite() {
                a.score = a.score.clamp(0.0, 1.0);
            }
            a
        })
        .collect())
}

/// The first complete JSON object or array in `s`.
///
/// Each `{`/`[` is tried in turn as a start; the stream deserializer stops
/// after one value, ignoring whatever follows it.
fn first_json_value(s: &str) -> Option<Value> {
    s.match_indices(['{', '['])
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&s[start..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        })
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &SearchConfig) -> Result<Arc<dyn LLMProvider>, DocQaError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VLM_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VLM_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocQaError::ProviderNotConfigured {
            backend: "vlm".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocQaError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocQaError::ProviderNotConfigured {
            backend: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
