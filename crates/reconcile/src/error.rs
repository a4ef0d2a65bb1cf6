//! Error types for the reconciliation engine

use thiserror::Error;

/// Errors raised while reconciling a resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The appliance could not be reached
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The appliance answered with something that is not JSON
    #[error("response format error: {0}")]
    ResponseFormat(String),

    /// Non-2xx HTTP status
    #[error("transport error: HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// 2xx response without the expected success marker
    #[error("{kind} '{key}': {operation} rejected by appliance: {response}")]
    RemoteRejection {
        kind: String,
        key: String,
        operation: String,
        response: String,
    },

    /// A name could not be translated to an identifier
    #[error("cannot resolve '{value}' via {endpoint} on device '{device}'")]
    RelationResolution {
        value: String,
        endpoint: String,
        device: String,
    },

    /// A precondition forbids the requested change
    #[error("{kind} '{key}': {reason}")]
    RelationshipConstraint {
        kind: String,
        key: String,
        reason: String,
    },

    /// Pre-check reported an alert; the coalesced apply was skipped
    #[error("{action} pre-check on device '{device}' reported an alert: {message}")]
    ConfigValidationAlert {
        action: String,
        device: String,
        message: String,
    },

    /// Kind is not registered
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    /// No client configured for a device
    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    /// Kind references an unregistered deferred action
    #[error("kind '{kind}' references unknown deferred action '{action}'")]
    UnknownAction { kind: String, action: String },

    /// Kind does not support the requested operation
    #[error("{kind} does not support {operation}")]
    UnsupportedOperation { kind: String, operation: String },

    /// The same identity was declared twice in one run
    #[error("duplicate resource {0}")]
    DuplicateResource(String),
}

impl From<restkit::Error> for Error {
    fn from(err: restkit::Error) -> Self {
        match err {
            restkit::Error::Connectivity { .. } | restkit::Error::TooManyRedirects { .. } => {
                Self::Connectivity(err.to_string())
            }
            restkit::Error::InvalidConfig(_) => Self::Connectivity(err.to_string()),
            restkit::Error::ResponseFormat { .. } => Self::ResponseFormat(err.to_string()),
            restkit::Error::Transport { status, body } => Self::Transport { status, body },
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
