//! Error types for REST client operations.
//!
//! Transport failures are split the way callers need to react to them:
//! the appliance could not be reached, it answered with something that is
//! not JSON, or it answered with a non-2xx status.

use std::fmt;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The appliance could not be reached (DNS, connect, TLS, timeout).
    Network,
    /// Redirect loops and other HTTP-level protocol problems.
    Protocol,
    /// The response body could not be parsed.
    Format,
    /// The appliance answered with a non-2xx status.
    Remote,
    /// Client misconfiguration.
    Config,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Appliance unreachable",
            Self::Protocol => "HTTP protocol error",
            Self::Format => "Unexpected response format",
            Self::Remote => "Request rejected by appliance",
            Self::Config => "Invalid client configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the device URL, network path and TLS settings",
            Self::Protocol => "Check that the device URL points at the API root",
            Self::Format => "Check that the endpoint is a JSON API endpoint",
            Self::Remote => "Check the API credentials and the privileges of the API user",
            Self::Config => "Fix the device entry in the configuration file",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to an appliance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Connection, DNS, TLS or timeout failure.
    #[error("cannot reach {url}: {message}")]
    Connectivity {
        /// Requested URL.
        url: String,
        /// Underlying error message.
        message: String,
    },

    /// The body was not valid JSON.
    #[error("invalid JSON from {url}: {message}")]
    ResponseFormat {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// Non-2xx HTTP status.
    #[error("HTTP {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Redirect chain exceeded the configured hop limit.
    #[error("too many redirects ({hops}) starting at {url}")]
    TooManyRedirects {
        /// URL of the original request.
        url: String,
        /// Number of hops followed before giving up.
        hops: u32,
    },

    /// Client configuration is unusable.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a connectivity error.
    pub fn connectivity(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connectivity {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a transport (non-2xx) error.
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connectivity { .. } => ErrorCategory::Network,
            Error::ResponseFormat { .. } => ErrorCategory::Format,
            Error::Transport { .. } => ErrorCategory::Remote,
            Error::TooManyRedirects { .. } => ErrorCategory::Protocol,
            Error::InvalidConfig(_) => ErrorCategory::Config,
        }
    }

    /// HTTP status of a transport error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
