//! Errors for the embedding client and vector stores.

/// Errors that can occur embedding text or talking to a vector store.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EmbeddingError {
    /// The embedding endpoint returned a non-success status.
    #[error("embedding API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The vector store returned a non-success status.
    #[error("vector store error ({status}): {message}")]
    Store { status: u16, message: String },

    /// The embedding endpoint returned the wrong number of vectors.
    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) type Result<T> = std::result::Result<T, EmbeddingError>;

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"detail": ".."}`; anything else is returned as-is.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|e| e.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .or_else(|| value.get("detail").and_then(|d| d.as_str()))
        .map_or_else(|| body.to_string(), String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad model"}}"#),
            "bad model"
        );
        assert_eq!(error_message(r#"{"error": "InvalidCollection"}"#), "InvalidCollection");
        assert_eq!(error_message(r#"{"detail": "Not Found"}"#), "Not Found");
        assert_eq!(error_message("plain text"), "plain text");
        assert_eq!(error_message(r#"{"other": 1}"#), r#"{"other": 1}"#);
    }

    #[test]
    fn test_count_mismatch_display() {
        let err = EmbeddingError::CountMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "expected 3 embeddings, got 2");
    }
}
