//! AI explanation client contract and failure taxonomy.
//!
//! # Responsibility
//! - Define the `ExplanationClient` seam the coordinator calls.
//! - Classify every failure into one stable kind with a user-facing message.
//!
//! # Invariants
//! - Each `ExplainError` kind maps to exactly one message.
//! - Truncated responses are successes, not failures.

pub mod gemini;
pub mod types;

use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use gemini::GeminiClient;

/// Turns a text fragment into a short explanation.
#[async_trait]
pub trait ExplanationClient: Send + Sync {
    async fn explain(&self, text: &str) -> Result<String, ExplainError>;
}

/// Failure classes of one explanation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainError {
    /// No credential set.
    Unconfigured,
    /// HTTP 429.
    RateLimited,
    /// HTTP 401/403.
    Unauthorized,
    /// Transport failed before a response arrived.
    NetworkUnreachable(String),
    /// Remote safety policy withheld the answer.
    ContentFiltered,
    /// Remote answered without usable text.
    EmptyResponse,
    /// Any other non-success status or malformed payload.
    UpstreamError(String),
}

impl ExplainError {
    /// Stable message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unconfigured => "API key not configured. Please add your Gemini API key.",
            Self::RateLimited => "Too many requests. Please wait a moment and try again.",
            Self::Unauthorized => "Invalid API key. Please check your configuration.",
            Self::NetworkUnreachable(_) => {
                "No internet connection. Please check your network and try again."
            }
            Self::ContentFiltered => {
                "Content blocked by safety filters. Try different text or simplify your selection."
            }
            Self::EmptyResponse => {
                "Could not generate explanation. Try selecting more meaningful text (not just codes/numbers)."
            }
            Self::UpstreamError(_) => "AI request failed. Please try again later.",
        }
    }

    /// Short machine code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::RateLimited => "rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::ContentFiltered => "content_filtered",
            Self::EmptyResponse => "empty_response",
            Self::UpstreamError(_) => "upstream_error",
        }
    }
}

impl Display for ExplainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkUnreachable(details) | Self::UpstreamError(details) => {
                write!(f, "{}: {details}", self.code())
            }
            _ => write!(f, "{}", self.code()),
        }
    }
}

impl Error for ExplainError {}
