//! Gemini vision classifier for page headers.
//!
//! Sends the header crop with a constrained prompt and parses a strict
//! JSON reply. Transient failures are retried with bounded exponential
//! backoff; whatever escapes here is already past the retry budget.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use shear_core::{
    HeaderClassifier, RetryConfig, SplitError, SplitResult, DEFAULT_MODEL, UNKNOWN_REPLY,
};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Instruction sent with every header crop. Decoy tokens the model tends
/// to latch onto (account prefixes, report boilerplate) are called out
/// explicitly; the resolver still re-checks the answer against the AI
/// blacklist afterwards.
const HEADER_PROMPT: &str = r#"Look at this document HEADER.
Identify the 3-letter Agency/Department code inside the box at the top-left or in the header line.

Rules:
1. Ignore any "Account No" or "WHK" references unless "WHK" is explicitly the Agency Code in the box.
2. Ignore generic report words (RPT, PAGE, DATE) and date/cutoff phrases.
3. Common codes: APO, FPL, OFS, WMG, WCL.
4. Return ONLY the 3-letter code. If unsure, return "UNKNOWN".

Output Format: JSON
{"code": "XXX"}"#;

/// Gemini-backed header classifier.
pub struct GeminiClassifier {
    client: Client,
    api_key: SecretString,
    model: String,
    retry: RetryConfig,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeReply {
    code: Option<String>,
}

/// Classification of one API attempt, driving the retry decision.
#[derive(Error, Debug)]
enum ApiError {
    /// Worth retrying: network failure, rate limit, server error,
    /// malformed reply.
    #[error("transient: {0}")]
    Transient(String),
    /// Not worth retrying: the request itself is bad.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl GeminiClassifier {
    /// Create a classifier with the default model and retry policy.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(api_key, DEFAULT_MODEL, RetryConfig::default())
    }

    /// Create a classifier with an explicit model and retry policy.
    pub fn with_config(
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
            retry,
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Override the API base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, header_png: &[u8]) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: Some(HEADER_PROMPT.to_string()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: "image/png".to_string(),
                            data: STANDARD.encode(header_png),
                        }),
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        }
    }

    /// One API attempt: request, status triage, reply parsing.
    async fn request_code(&self, header_png: &[u8]) -> Result<String, ApiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret().as_str())
            .json(&self.build_request(header_png))
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(format!("failed to read response body: {e}")))?;

        if is_transient_status(status) {
            return Err(ApiError::Transient(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            return Err(ApiError::Permanent(format!("HTTP {status}: {body}")));
        }

        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::Transient(format!("malformed response envelope: {e}")))?;
        let reply = extract_reply_text(&response)
            .ok_or_else(|| ApiError::Transient("empty reply from model".to_string()))?;

        debug!(reply = %reply, "model replied");
        parse_code_reply(&reply).map_err(ApiError::Transient)
    }
}

#[async_trait]
impl HeaderClassifier for GeminiClassifier {
    async fn classify_header(&self, header_png: &[u8]) -> SplitResult<String> {
        let attempt = || self.request_code(header_png);

        attempt
            .retry(
                ExponentialBuilder::default()
                    .with_max_times(self.retry.max_retries)
                    .with_min_delay(Duration::from_millis(self.retry.min_delay_ms))
                    .with_max_delay(Duration::from_millis(self.retry.max_delay_ms)),
            )
            .when(|e| matches!(e, ApiError::Transient(_)))
            .notify(|err, dur| {
                warn!("Gemini call failed, retrying in {:?}: {}", dur, err);
            })
            .await
            .map_err(|e| SplitError::Classifier(e.to_string()))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// HTTP statuses worth another attempt.
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// First text part of the first candidate, if any.
fn extract_reply_text(response: &GenerateResponse) -> Option<String> {
    response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .iter()
        .find_map(|part| part.text.clone())
}

/// Strip optional markdown code fences around the JSON reply.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

/// Decode the `{"code": "XXX"}` reply.
///
/// A missing `code` field is the model abstaining and maps to
/// [`UNKNOWN_REPLY`]; undecodable JSON is a malformed (retryable) reply.
fn parse_code_reply(reply: &str) -> Result<String, String> {
    let reply: CodeReply = serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| format!("malformed JSON reply: {e}"))?;
    Ok(reply.code.unwrap_or_else(|| UNKNOWN_REPLY.to_string()))
}
