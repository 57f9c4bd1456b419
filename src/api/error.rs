use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Maximum length of a raw response body kept in an error message.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Normalized error shape surfaced to UI-layer callers.
///
/// `message` prefers a server-supplied `message` field, then a structured
/// validation `detail` list joined into one readable string, then the raw
/// transport text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Refresh attempted with no persisted refresh token.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The API rejected the access token (401). Recoverable exactly once
    /// via refresh-and-retry.
    #[error("unauthorized: {0}")]
    Unauthorized(ErrorBody),

    /// The refresh endpoint rejected the refresh token. Fatal to the
    /// session; always demotes to guest.
    #[error("refresh rejected: {0}")]
    RefreshRejected(ErrorBody),

    /// Any other non-success HTTP response.
    #[error("request failed: {0}")]
    Request(ErrorBody),

    /// Transport-level failure; never retried beyond the one
    /// 401-triggered retry.
    #[error("network error: {0}")]
    Network(String),

    /// A success response whose body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = normalize_body(status, body);
        match status {
            401 => ApiError::Unauthorized(body),
            _ => ApiError::Request(body),
        }
    }

    /// The normalized shape for UI consumption, regardless of variant.
    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Unauthorized(body)
            | ApiError::RefreshRejected(body)
            | ApiError::Request(body) => body.clone(),
            other => ErrorBody {
                status: None,
                message: other.to_string(),
                detail: None,
            },
        }
    }

    /// True for a 401 from the API, the only failure the request pipeline
    /// repairs.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// Derive the normalized error shape from a raw response body.
fn normalize_body(status: u16, raw: &str) -> ErrorBody {
    let status = Some(status);

    let data: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return ErrorBody {
                status,
                message: fallback_message(raw),
                detail: None,
            }
        }
    };

    if let Value::String(message) = &data {
        return ErrorBody {
            status,
            message: message.clone(),
            detail: None,
        };
    }

    if let Some(object) = data.as_object() {
        if let Some(message) = object.get("message").and_then(Value::as_str) {
            return ErrorBody {
                status,
                message: message.to_string(),
                detail: Some(data.clone()),
            };
        }

        if let Some(detail) = object.get("detail") {
            let message =
                extract_detail_message(detail).unwrap_or_else(|| "Request failed".to_string());
            return ErrorBody {
                status,
                message,
                detail: Some(detail.clone()),
            };
        }
    }

    ErrorBody {
        status,
        message: fallback_message(raw),
        detail: Some(data),
    }
}

/// Pull a human-readable message out of a validation `detail` payload:
/// either a plain string or a list of `{msg}` objects joined line by line.
fn extract_detail_message(detail: &Value) -> Option<String> {
    if let Some(message) = detail.as_str() {
        return Some(message.to_string());
    }

    if let Some(items) = detail.as_array() {
        let messages: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .collect();
        if !messages.is_empty() {
            return Some(messages.join("\n"));
        }
    }

    None
}

fn fallback_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "Request failed".to_string();
    }
    if trimmed.len() <= MAX_ERROR_BODY_LENGTH {
        trimmed.to_string()
    } else {
        // Back off to a char boundary so a multi-byte character straddling
        // the cutoff cannot panic the slice.
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &trimmed[..end])
    }
}
