//! Gemini-backed explanation client.
//!
//! # Responsibility
//! - Build the explanation prompt and issue one `generateContent` call.
//! - Extract `candidates[0].content.parts[0].text` and classify everything
//!   else into `ExplainError`.
//!
//! # Invariants
//! - The API key and the selected text never reach log output.
//! - Every request carries an explicit timeout.

use crate::config::GeminiConfig;
use crate::explain::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
};
use crate::explain::{ExplainError, ExplanationClient};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FINISH_SAFETY: &str = "SAFETY";
const FINISH_MAX_TOKENS: &str = "MAX_TOKENS";
const FINISH_STOP: &str = "STOP";

/// Gemini HTTP client.
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Builds a client from configuration.
    ///
    /// An absent API key is accepted; `explain` then fails with
    /// `ExplainError::Unconfigured`.
    pub fn new(config: &GeminiConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            api_key: config.usable_api_key().map(str::to_string),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl ExplanationClient for GeminiClient {
    async fn explain(&self, text: &str) -> Result<String, ExplainError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ExplainError::Unconfigured);
        };

        let started_at = Instant::now();
        debug!(
            "event=explain_request module=explain status=start model={} text_len={}",
            self.model,
            text.chars().count()
        );

        let response = self
            .http
            .post(self.url())
            .query(&[("key", api_key)])
            .json(&build_request(text))
            .send()
            .await
            .map_err(|err| ExplainError::NetworkUnreachable(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ExplainError::NetworkUnreachable(err.without_url().to_string()))?;

        let result = classify_response(status, &body);
        match &result {
            Ok(explanation) => info!(
                "event=explain_request module=explain status=ok http_status={} duration_ms={} explanation_len={}",
                status.as_u16(),
                started_at.elapsed().as_millis(),
                explanation.chars().count()
            ),
            Err(err) => warn!(
                "event=explain_request module=explain status=error http_status={} duration_ms={} error_code={}",
                status.as_u16(),
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }
}

/// Prompt wrapping the literal selected text.
pub fn build_prompt(text: &str) -> String {
    format!(
        "You are an academic assistant helping a student understand concepts.\n\
         Provide a SHORT and CONCISE explanation (2-3 sentences maximum) of the following text:\n\n\
         \"{text}\"\n\n\
         Keep your response brief, clear, and educational. Focus on the key concept."
    )
}

pub fn build_request(text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: None,
            parts: vec![Part {
                text: Some(build_prompt(text)),
            }],
        }],
        generation_config: GenerationConfig::default(),
    }
}

/// Maps one HTTP status + body to an explanation or a failure class.
pub fn classify_response(status: StatusCode, body: &str) -> Result<String, ExplainError> {
    match status {
        StatusCode::TOO_MANY_REQUESTS => return Err(ExplainError::RateLimited),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(ExplainError::Unauthorized)
        }
        other if !other.is_success() => {
            return Err(ExplainError::UpstreamError(format!(
                "http status {}",
                other.as_u16()
            )))
        }
        _ => {}
    }

    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|err| ExplainError::UpstreamError(format!("malformed response: {err}")))?;

    let Some(candidate) = parsed.candidates.as_ref().and_then(|list| list.first()) else {
        return Err(ExplainError::UpstreamError(if parsed.error.is_some() {
            "response carried an error object".to_string()
        } else {
            "response has no candidates".to_string()
        }));
    };

    match candidate.finish_reason.as_deref() {
        Some(FINISH_SAFETY) => return Err(ExplainError::ContentFiltered),
        Some(FINISH_MAX_TOKENS) => {
            warn!("event=explain_request module=explain status=truncated finish_reason=MAX_TOKENS");
        }
        Some(FINISH_STOP) | None => {}
        Some(other) => {
            warn!("event=explain_request module=explain status=unusual finish_reason={other}");
        }
    }

    candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or(ExplainError::EmptyResponse)
}
