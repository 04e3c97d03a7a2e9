//! Boundary to the generative AI-assist capability.
//!
//! Components hand over an instruction text and optionally the source image and get raw text
//! back. Everything structured is parsed and validated on this side of the boundary; the
//! capability is never trusted to honor the instructions it was given.

mod http;

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use http::HttpAssistClient;

/// Image payload forwarded to the capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl ImagePart {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Guess the MIME type from the uploaded file name, defaulting to JPEG.
    pub fn from_upload(file_name: &str, data: impl Into<Arc<[u8]>>) -> Self {
        let mime_type = mime_guess::from_path(file_name)
            .first()
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        Self::new(mime_type, data)
    }
}

#[derive(Debug, Clone)]
pub struct AssistRequest<'a> {
    pub instructions: String,
    pub image: Option<&'a ImagePart>,
}

impl<'a> AssistRequest<'a> {
    pub fn text(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            image: None,
        }
    }

    pub fn with_image(instructions: impl Into<String>, image: &'a ImagePart) -> Self {
        Self {
            instructions: instructions.into(),
            image: Some(image),
        }
    }
}

/// Failure kinds classified by the client implementation, not by message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistError {
    #[error("assist capability is rate limited")]
    RateLimited,
    #[error("assist capability unavailable: {0}")]
    Unavailable(String),
    #[error("assist capability returned an empty response")]
    EmptyResponse,
}

pub trait AssistClient: Send + Sync {
    fn generate(&self, request: &AssistRequest<'_>) -> Result<String, AssistError>;
}

/// Used when no assist endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAssist;

impl AssistClient for OfflineAssist {
    fn generate(&self, _request: &AssistRequest<'_>) -> Result<String, AssistError> {
        Err(AssistError::Unavailable("no assist endpoint configured".to_string()))
    }
}

/// Why a component fell back instead of using the capability's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    RateLimited,
    Unavailable(String),
    /// The answer parsed but broke a schema or invariant check.
    Rejected(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::RateLimited => write!(f, "rate limited"),
            DegradedReason::Unavailable(detail) => write!(f, "unavailable: {detail}"),
            DegradedReason::Rejected(detail) => write!(f, "rejected: {detail}"),
        }
    }
}

impl From<AssistError> for DegradedReason {
    fn from(value: AssistError) -> Self {
        match value {
            AssistError::RateLimited => Self::RateLimited,
            AssistError::Unavailable(detail) => Self::Unavailable(detail),
            AssistError::EmptyResponse => Self::Unavailable(value.to_string()),
        }
    }
}

/// Result of a capability-backed step that always yields a usable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Accepted(T),
    Degraded { value: T, reason: DegradedReason },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<DegradedReason>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Accepted(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Accepted(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&DegradedReason> {
        match self {
            Outcome::Accepted(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }
}

/// Strip optional markdown code fences around a JSON answer.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, DegradedReason> {
    serde_json::from_str(strip_code_fences(text))
        .map_err(|err| DegradedReason::Rejected(format!("malformed response: {err}")))
}
