//! Error types for the n8n API client.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the n8n public API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, TLS, connect, timeout).
    #[error("failed to perform request: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a structured error body.
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable error code from the body.
        code: String,
        /// Human-readable message from the body.
        message: String,
        /// Optional remediation hint from the body.
        hint: Option<String>,
    },

    /// The API answered with an error status and an unstructured body.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A single-entity lookup did not match anything.
    #[error("user {identifier:?} not found")]
    NotFound {
        /// The id or email that was looked up.
        identifier: String,
    },

    /// A successful response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The call was aborted because the provider is shutting down.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of the failed call, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether the call ran into the per-request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Classify an error response body.
    ///
    /// Bodies shaped like `{code, message, hint?}` become [`ApiError::Api`];
    /// anything else is surfaced verbatim as [`ApiError::Http`].
    pub(crate) fn from_response(status: u16, body: String) -> Self {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => Self::Api {
                status,
                code: parsed.code,
                message: parsed.message,
                hint: parsed.hint.filter(|h| !h.is_empty()),
            },
            Err(_) => Self::Http { status, body },
        }
    }
}

/// Error body returned by the n8n API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let err = ApiError::from_response(
            409,
            r#"{"code":"CONFLICT","message":"user already exists","hint":"use another email"}"#
                .to_string(),
        );

        assert_eq!(err.to_string(), "API error: CONFLICT - user already exists");
        assert_eq!(err.status(), Some(409));
        match err {
            ApiError::Api { hint, .. } => assert_eq!(hint.as_deref(), Some("use another email")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_unstructured_error_body() {
        let err = ApiError::from_response(502, "<html>Bad Gateway</html>".to_string());
        assert_eq!(err.to_string(), "HTTP 502: <html>Bad Gateway</html>");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_body_missing_message_is_unstructured() {
        let err = ApiError::from_response(400, r#"{"code":"BAD_REQUEST"}"#.to_string());
        assert!(matches!(err, ApiError::Http { status: 400, .. }));
    }

    #[test]
    fn test_not_found_display() {
        let err = ApiError::NotFound {
            identifier: "a@x.com".to_string(),
        };
        assert_eq!(err.to_string(), "user \"a@x.com\" not found");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_timeout());
    }
}
