//! Errors returned by the assistant API client.

/// Errors that can occur talking to the assistants API.
#[derive(Debug, thiserror::Error)]
pub(crate) enum AssistantError {
    /// 401 or 403.
    #[error("authentication error: {0}")]
    Auth(String),

    /// 404 Not Found.
    #[error("not found: {0}")]
    NotFound(String),

    /// 400 Bad Request.
    #[error("validation error: {0}")]
    Validation(String),

    /// 429 Too Many Requests.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Network / connection error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SSE streaming error.
    #[error("stream error: {0}")]
    Stream(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssistantError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub(crate) type Result<T> = std::result::Result<T, AssistantError>;

/// Map an HTTP status + body to the appropriate error variant.
///
/// The API wraps failures as `{"error": {"message": "..."}}`; anything else
/// is passed through as the raw body.
pub(crate) fn error_from_status(status: u16, body: &str) -> AssistantError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());

    match status {
        400 => AssistantError::Validation(message),
        401 | 403 => AssistantError::Auth(message),
        404 => AssistantError::NotFound(message),
        429 => AssistantError::RateLimited(message),
        _ => AssistantError::Server { status, message },
    }
}
