use std::fmt;

use crate::store::StoreError;

/// Machine-readable error codes surfaced by the CLI and the TUI status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    DatasetFetchFailed,
    DatasetDecodeFailed,
    ValidationFailed,
    InvalidEnumValue,
    ItemNotFound,
    NotAuthorized,
    LoginRejected,
    PublishRejected,
    PublishNotConfigured,
    StorageUnavailable,
    StorageWriteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::DatasetFetchFailed => "E2001",
            Self::DatasetDecodeFailed => "E2002",
            Self::ValidationFailed => "E3001",
            Self::InvalidEnumValue => "E3002",
            Self::ItemNotFound => "E3003",
            Self::NotAuthorized => "E4001",
            Self::LoginRejected => "E4002",
            Self::PublishRejected => "E5001",
            Self::PublishNotConfigured => "E5002",
            Self::StorageUnavailable => "E6001",
            Self::StorageWriteFailed => "E6002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::DatasetFetchFailed => "Timeline data could not be fetched",
            Self::DatasetDecodeFailed => "Timeline data is malformed",
            Self::ValidationFailed => "Event form is incomplete",
            Self::InvalidEnumValue => "Invalid filter/sort value",
            Self::ItemNotFound => "Item not found",
            Self::NotAuthorized => "Not signed in",
            Self::LoginRejected => "Incorrect password",
            Self::PublishRejected => "Publish failed",
            Self::PublishNotConfigured => "No publish endpoint configured",
            Self::StorageUnavailable => "Local storage unavailable",
            Self::StorageWriteFailed => "Local storage write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in cas-timeline.toml and retry."),
            Self::DatasetFetchFailed => Some("Check the data URL or server, then press `r` to retry."),
            Self::DatasetDecodeFailed => Some("Validate the timeline JSON against the dataset shape."),
            Self::ValidationFailed => {
                Some("Fill title, date, summary, details, and at least one category.")
            }
            Self::InvalidEnumValue => Some(
                "Use All, Sustainability, Achievements, Community, Facilities, Academics or Creativity.",
            ),
            Self::ItemNotFound => None,
            Self::NotAuthorized => Some("Unlock editing with the teacher password first."),
            Self::LoginRejected => None,
            Self::PublishRejected => Some("Local edits were kept. Retry once the endpoint is reachable."),
            Self::PublishNotConfigured => Some("Set [publish] endpoint or CAS_PUBLISH_ENDPOINT."),
            Self::StorageUnavailable => Some("Check that the storage directory is readable."),
            Self::StorageWriteFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure taxonomy shared by every timeline operation.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("network failure: {message}")]
    NetworkFailure { code: ErrorCode, message: String },

    #[error("{0}")]
    ValidationFailure(String),

    #[error("not authorized: {message}")]
    AuthorizationFailure { code: ErrorCode, message: String },

    #[error("{0}")]
    PublishFailure(String),

    #[error("publish endpoint not set")]
    PublishNotConfigured,

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),

    #[error("configuration error: {0}")]
    ConfigFailure(String),

    #[error("item '{0}' not found")]
    NotFound(String),
}

impl TimelineError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            code: ErrorCode::DatasetFetchFailed,
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            code: ErrorCode::DatasetDecodeFailed,
            message: message.into(),
        }
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::AuthorizationFailure {
            code: ErrorCode::NotAuthorized,
            message: message.into(),
        }
    }

    pub(crate) fn login_rejected() -> Self {
        Self::AuthorizationFailure {
            code: ErrorCode::LoginRejected,
            message: "Incorrect password.".to_string(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NetworkFailure { code, .. } | Self::AuthorizationFailure { code, .. } => *code,
            Self::ValidationFailure(_) => ErrorCode::ValidationFailed,
            Self::PublishFailure(_) => ErrorCode::PublishRejected,
            Self::PublishNotConfigured => ErrorCode::PublishNotConfigured,
            Self::StorageFailure(err) => err.code(),
            Self::ConfigFailure(_) => ErrorCode::ConfigParseError,
            Self::NotFound(_) => ErrorCode::ItemNotFound,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the failure came from talking to a collaborator and may succeed on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. } | Self::PublishFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 13] = [
        ErrorCode::ConfigParseError,
        ErrorCode::DatasetFetchFailed,
        ErrorCode::DatasetDecodeFailed,
        ErrorCode::ValidationFailed,
        ErrorCode::InvalidEnumValue,
        ErrorCode::ItemNotFound,
        ErrorCode::NotAuthorized,
        ErrorCode::LoginRejected,
        ErrorCode::PublishRejected,
        ErrorCode::PublishNotConfigured,
        ErrorCode::StorageUnavailable,
        ErrorCode::StorageWriteFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let raw = code.code();
            assert_eq!(raw.len(), 5);
            assert!(raw.starts_with('E'));
            assert!(raw.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            TimelineError::network("timeout").code(),
            ErrorCode::DatasetFetchFailed
        );
        assert_eq!(
            TimelineError::login_rejected().code(),
            ErrorCode::LoginRejected
        );
        assert_eq!(
            TimelineError::ValidationFailure("x".into()).code(),
            ErrorCode::ValidationFailed
        );
        assert!(TimelineError::network("x").is_retryable());
        assert!(!TimelineError::unauthorized("x").is_retryable());
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = TimelineError::ValidationFailure("Add at least one category.".into());
        assert_eq!(err.to_string(), "Add at least one category.");
    }
}
