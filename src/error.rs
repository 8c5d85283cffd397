//! Error types for the n8n Cloud provider.

use thiserror::Error;

use crate::client::ApiError;

/// Errors returned by provider operations.
///
/// Every variant is reported to the host as an error diagnostic; the variant
/// decides the gRPC status code when the error crosses the wire as a status.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The n8n API could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The operation was aborted by a provider stop.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Cancelled(msg) => msg,
        }
    }

    /// Wrap a client error with the operation that produced it.
    ///
    /// The message reads `"<context>, got error: <cause>"` and the variant is
    /// picked from the HTTP status (or the transport failure kind).
    ///
    /// # Examples
    ///
    /// ```
    /// use n8ncloud_provider::client::ApiError;
    /// use n8ncloud_provider::ProviderError;
    ///
    /// let err = ProviderError::from_api(
    ///     "Unable to delete user",
    ///     ApiError::Http { status: 403, body: "forbidden".to_string() },
    /// );
    /// assert!(matches!(err, ProviderError::PermissionDenied(_)));
    /// assert_eq!(err.message(), "Unable to delete user, got error: HTTP 403: forbidden");
    /// ```
    pub fn from_api(context: &str, err: ApiError) -> Self {
        let msg = format!("{}, got error: {}", context, err);
        match &err {
            ApiError::NotFound { .. } => Self::NotFound(msg),
            ApiError::Cancelled => Self::Cancelled(msg),
            ApiError::Transport(_) if err.is_timeout() => Self::DeadlineExceeded(msg),
            ApiError::Transport(_) => Self::Unavailable(msg),
            ApiError::Decode(_) | ApiError::Config(_) => Self::Sdk(msg),
            ApiError::Api { status, .. } | ApiError::Http { status, .. } => match *status {
                400 | 422 => Self::InvalidRequest(msg),
                401 | 403 => Self::PermissionDenied(msg),
                404 => Self::NotFound(msg),
                409 => Self::AlreadyExists(msg),
                429 => Self::ResourceExhausted(msg),
                500..=599 => Self::Unavailable(msg),
                _ => Self::Sdk(msg),
            },
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Sdk(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Cancelled(msg) => tonic::Status::cancelled(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("User with ID \"abc\" not found".to_string());
        assert_eq!(
            format!("{}", err),
            "Resource not found: User with ID \"abc\" not found"
        );

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("n8ncloud_workflow".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: n8ncloud_workflow");

        let err = ProviderError::Cancelled("provider stopping".to_string());
        assert_eq!(format!("{}", err), "Cancelled: provider stopping");
    }

    #[test]
    fn test_error_to_status() {
        let cases = [
            (ProviderError::NotFound("x".into()), tonic::Code::NotFound),
            (ProviderError::Validation("x".into()), tonic::Code::InvalidArgument),
            (ProviderError::Configuration("x".into()), tonic::Code::FailedPrecondition),
            (ProviderError::Sdk("x".into()), tonic::Code::Internal),
            (ProviderError::AlreadyExists("x".into()), tonic::Code::AlreadyExists),
            (ProviderError::PermissionDenied("x".into()), tonic::Code::PermissionDenied),
            (ProviderError::ResourceExhausted("x".into()), tonic::Code::ResourceExhausted),
            (ProviderError::Unavailable("x".into()), tonic::Code::Unavailable),
            (ProviderError::DeadlineExceeded("x".into()), tonic::Code::DeadlineExceeded),
            (ProviderError::FailedPrecondition("x".into()), tonic::Code::FailedPrecondition),
            (ProviderError::InvalidRequest("x".into()), tonic::Code::InvalidArgument),
            (ProviderError::Cancelled("x".into()), tonic::Code::Cancelled),
        ];

        for (err, code) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_from_api_maps_status_codes() {
        let api = |status: u16| ApiError::Api {
            status,
            code: "CODE".to_string(),
            message: "message".to_string(),
            hint: None,
        };

        assert!(matches!(
            ProviderError::from_api("op", api(400)),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_api("op", api(401)),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_api("op", api(409)),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from_api("op", api(429)),
            ProviderError::ResourceExhausted(_)
        ));
        for status in [500, 503, 599] {
            assert!(matches!(
                ProviderError::from_api("op", api(status)),
                ProviderError::Unavailable(_)
            ));
        }
        assert!(matches!(
            ProviderError::from_api("op", api(404)),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_api("op", api(418)),
            ProviderError::Sdk(_)
        ));
    }

    #[test]
    fn test_from_api_keeps_server_code_and_message() {
        let err = ProviderError::from_api(
            "Unable to create user",
            ApiError::Api {
                status: 409,
                code: "CONFLICT".to_string(),
                message: "user exists".to_string(),
                hint: None,
            },
        );
        assert_eq!(
            err.message(),
            "Unable to create user, got error: API error: CONFLICT - user exists"
        );
    }

    #[test]
    fn test_from_api_not_found_and_cancelled() {
        let err = ProviderError::from_api(
            "Unable to read user",
            ApiError::NotFound {
                identifier: "abc".to_string(),
            },
        );
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err.message().contains("\"abc\""));

        let err = ProviderError::from_api("Unable to read user", ApiError::Cancelled);
        assert!(matches!(err, ProviderError::Cancelled(_)));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }
}
