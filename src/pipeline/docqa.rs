//! HTTP client for extractive document-question-answering endpoints.
//!
//! Speaks the Hugging Face inference wire format used by the
//! `document-question-answering` task:
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer <token>
//! {"inputs": {"image": "<base64 PNG>", "question": "..."},
//!  "parameters": {"top_k": 3, "max_seq_len": 512, "max_answer_len": 200}}
//!
//! → [{"answer": "...", "score": 0.93, "start": 12, "end": 14}, ...]
//! ```
//!
//! Some deployments return a bare object instead of a list when `top_k` is
//! 1; [`RawResponse`] accepts both. Errors arrive as `{"error": "..."}`.

use crate::config::{SearchConfig, DEFAULT_DOCQA_MODEL};
use crate::error::{DocQaError, InferenceError};
use crate::pipeline::encode::encode_png_base64;
use crate::pipeline::inference::{
    InferenceClient, InferenceParams, RawAnswer, RawResponse, RetryPolicy,
};
use async_trait::async_trait;
use image::DynamicImage;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Hosted inference base URL; the model id is appended.
pub const HOSTED_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

/// [`InferenceClient`] for a document-QA HTTP endpoint.
pub struct DocQaHttpClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    name: String,
    retry: RetryPolicy,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct DocQaRequest<'a> {
    inputs: DocQaInputs<'a>,
    parameters: DocQaParameters,
}

#[derive(Serialize)]
struct DocQaInputs<'a> {
    image: String,
    question: &'a str,
}

#[derive(Serialize)]
struct DocQaParameters {
    top_k: usize,
    max_seq_len: usize,
    max_answer_len: usize,
}

impl DocQaHttpClient {
    /// Build a client from config.
    ///
    /// Endpoint: [`SearchConfig::endpoint`], else the hosted URL for
    /// [`SearchConfig::model`] (default `impira/layoutlm-document-qa`).
    /// Token: [`SearchConfig::api_token`], else `HF_TOKEN`.
    pub fn from_config(config: &SearchConfig) -> Result<Self, DocQaError> {
        let model = config.model.as_deref().unwrap_or(DEFAULT_DOCQA_MODEL);
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/{}", HOSTED_INFERENCE_BASE, model));

        if reqwest::Url::parse(&endpoint).is_err() {
            return Err(DocQaError::InvalidConfig(format!(
                "endpoint is not a valid URL: '{endpoint}'"
            )));
        }

        let token = config
            .api_token
            .clone()
            .or_else(|| std::env::var("HF_TOKEN").ok())
            .filter(|t| !t.is_empty());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| DocQaError::ProviderNotConfigured {
                backend: "docqa".into(),
                hint: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint,
            token,
            name: format!("docqa:{model}"),
            retry: RetryPolicy::from_config(config),
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once(&self, body: &str) -> Result<Vec<RawAnswer>, InferenceError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                InferenceError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(InferenceError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        parse_response(&text)
    }
}

#[async_trait]
impl InferenceClient for DocQaHttpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn answer(
        &self,
        question: &str,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawAnswer>, InferenceError> {
        let body = build_request_body(question, image, params)?;
        debug!("POST {} ({} bytes)", self.endpoint, body.len());

        self.retry
            .run(&self.name, || self.post_once(&body))
            .await
    }
}

fn build_request_body(
    question: &str,
    image: &DynamicImage,
    params: &InferenceParams,
) -> Result<String, InferenceError> {
    let image = encode_png_base64(image).map_err(|e| InferenceError::Encode(e.to_string()))?;
    let request = DocQaRequest {
        inputs: DocQaInputs { image, question },
        parameters: DocQaParameters {
            top_k: params.top_k,
            max_seq_len: params.max_length,
            max_answer_len: params.max_answer_length,
        },
    };
    serde_json::to_string(&request).map_err(|e| InferenceError::Encode(e.to_string()))
}

/// Decode a success body into answers.
fn parse_response(text: &str) -> Result<Vec<RawAnswer>, InferenceError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| InferenceError::InvalidResponse(format!("{e}: {}", snippet(text))))?;

    if let Some(err) = value.get("error").and_then(|v| v.as_str()) {
        return Err(InferenceError::InvalidResponse(err.to_string()));
    }

    let response: RawResponse = serde_json::from_value(value)
        .map_err(|e| InferenceError::InvalidResponse(format!("{e}: {}", snippet(text))))?;
    Ok(response.into_answers())
}

/// Pull `{"error": "..."}` out of an error body, else return a snippet.
fn error_message(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| snippet(text))
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}
