//! Unified error types for the Tether core.
//!
//! Transport, outbound API and adapter failures each get their own enum so
//! callers can match on the layer that failed.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// The remote side rejected our credentials. Reconnecting will not help.
    #[error("authentication rejected: {reason}")]
    AuthRejected {
        /// Reason reported by the remote side.
        reason: String,
    },

    /// Transport not available.
    #[error("transport '{transport}' not available")]
    NotAvailable {
        /// The transport type that's not available.
        transport: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} error: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Outbound API Errors
// =============================================================================

/// Errors returned by outbound platform API calls (send, react, lookups).
///
/// These are handed back to the caller as-is; nothing in the core retries them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a usable response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The platform answered but reported a failure.
    #[error("{method} failed: {error}")]
    Api {
        /// API method that was called.
        method: String,
        /// Error code reported by the platform.
        error: String,
    },

    /// The platform answered with something we could not interpret.
    #[error("invalid response from {method}: {reason}")]
    InvalidResponse {
        /// API method that was called.
        method: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The adapter has been closed.
    #[error("adapter is closed")]
    Closed,
}

impl ApiError {
    /// Creates an API-level error.
    pub fn api(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            error: error.into(),
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Returns the platform error code, if the platform reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that can occur in adapter operations.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The startup authentication handshake failed; the adapter cannot start.
    #[error("{platform} auth test failed: {source}")]
    AuthHandshake {
        /// Platform name, e.g. `slack`.
        platform: &'static str,
        /// Underlying failure.
        #[source]
        source: ApiError,
    },

    /// Event parsing failed.
    #[error("failed to parse event: {reason}")]
    ParseError {
        /// Reason for failure.
        reason: String,
    },

    /// The adapter was used in a state that does not allow the operation.
    #[error("invalid adapter state: {0}")]
    InvalidState(String),

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),

    /// Outbound API error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AdapterError {
    /// Creates an internal adapter error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError { reason: msg.into() }
    }

    /// Wraps a handshake failure.
    pub fn auth_handshake(platform: &'static str, source: ApiError) -> Self {
        Self::AuthHandshake { platform, source }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for outbound API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
