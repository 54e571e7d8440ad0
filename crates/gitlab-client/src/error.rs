//! Error types for GitLab API operations.
//!
//! Errors are categorized so callers can tell a transient transport failure
//! from an absent resource, a local validation failure, or a deadline that
//! elapsed while waiting on the remote side.

use std::fmt;
use std::time::Duration;

/// Result type alias for GitLab client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related or server-side (5xx) errors (transient).
    Network,
    /// The remote resource does not exist (HTTP 404).
    NotFound,
    /// Local validation failed before any remote call.
    Validation,
    /// A bounded wait elapsed without observing the expected condition.
    Timeout,
    /// The API rejected the request (4xx other than 404).
    Api,
    /// The API answered with something we could not decode.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network or server issue",
            Self::NotFound => "Resource not found",
            Self::Validation => "Invalid input",
            Self::Timeout => "Timed out waiting for GitLab",
            Self::Api => "Request rejected by GitLab",
            Self::Format => "Unexpected API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the GitLab instance and try again",
            Self::NotFound => "Verify the project, group or branch exists and is visible to the token",
            Self::Validation => "Check the identifier format (e.g. <project>-<branch>)",
            Self::Timeout => "GitLab may still be processing the request; re-run to converge",
            Self::Api => "Check the token scopes and the attribute values",
            Self::Format => "The base URL may not point at a GitLab v4 API",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to GitLab.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure (connection, TLS, timeout at the HTTP layer).
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// GitLab answered with a non-success status.
    #[error("GitLab API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The requested resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Human-readable resource description.
        resource: String,
    },

    /// A composite identifier could not be decoded.
    #[error("malformed identifier {id:?}: {reason}")]
    MalformedId {
        /// The offending identifier.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A bounded wait elapsed without the expected remote transition.
    #[error("waited {} seconds for {what} to be deleted", waited.as_secs())]
    DeadlineExceeded {
        /// What was being waited on.
        what: String,
        /// How long we waited.
        waited: Duration,
    },

    /// Invalid response from the API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP transport error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a malformed-identifier error.
    pub fn malformed_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api { status, .. } if *status >= 500 => ErrorCategory::Network,
            Error::Api { status: 404, .. } => ErrorCategory::NotFound,
            Error::Api { .. } => ErrorCategory::Api,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::MalformedId { .. } => ErrorCategory::Validation,
            Error::DeadlineExceeded { .. } => ErrorCategory::Timeout,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => *status,
            Error::Api { status, .. } => Some(*status),
            Error::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error means the resource is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(404) => Self::NotFound {
                resource: "resource".to_string(),
            },
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                message: format!("HTTP {code}"),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
