//! Error types for the LTI gateway.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

/// Errors raised while verifying a signed launch request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Consumer key is not registered.
    #[error("Unknown consumer: {key}")]
    UnknownConsumer {
        /// The `oauth_consumer_key` from the request
        key: String,
    },

    /// Recomputed signature does not match the supplied one.
    #[error("Invalid OAuth signature")]
    InvalidSignature,

    /// Request is missing OAuth fields or carries unusable values.
    #[error("Malformed LTI request: {0}")]
    MalformedRequest(String),

    /// `oauth_timestamp` is outside the accepted window.
    #[error("Stale request timestamp, {skew:?} outside the accepted window")]
    StaleTimestamp {
        /// Distance between the request timestamp and now
        skew: Duration,
    },
}

impl VerificationError {
    /// Create an unknown consumer error.
    #[must_use]
    pub fn unknown_consumer(key: impl Into<String>) -> Self {
        Self::UnknownConsumer { key: key.into() }
    }

    /// Create a malformed request error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }
}

/// Errors from the gateway and the grade poster.
#[derive(thiserror::Error, Debug)]
pub enum LtiError {
    /// Launch verification failed
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Session request without an authenticated LTI session
    #[error("Session expired or unavailable")]
    NotInSession,

    /// Session roles do not satisfy the required role class
    #[error("Not authorized for role '{role}'")]
    NotAuthorized {
        /// Required role class
        role: String,
    },

    /// Required role class is not in the role table
    #[error("Unknown role {0}")]
    UnknownRole(String),

    /// Session lacks a property the operation needs
    #[error("Missing LTI property: {0}")]
    MissingProperty(&'static str),

    /// Outbound grade message could not be delivered or was refused
    #[error("Post Message Failed: {0}")]
    PostMessageFailed(String),
}

impl LtiError {
    /// Create a not authorized error.
    #[must_use]
    pub fn not_authorized(role: impl Into<String>) -> Self {
        Self::NotAuthorized { role: role.into() }
    }

    /// Create an unknown role error.
    #[must_use]
    pub fn unknown_role(role: impl Into<String>) -> Self {
        Self::UnknownRole(role.into())
    }

    /// Create a post message failure.
    #[must_use]
    pub fn post_failed(message: impl Into<String>) -> Self {
        Self::PostMessageFailed(message.into())
    }

    /// Returns true for errors caused by deployment configuration rather than the caller.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnknownRole(_))
    }

    /// Convert to a message safe to show the end user.
    ///
    /// Signature details never leave the gateway; the caller only learns that
    /// the launch was refused.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Verification(VerificationError::UnknownConsumer { .. }) => {
                "Invalid LTI request (unknown consumer)".to_string()
            }
            Self::Verification(VerificationError::InvalidSignature) => {
                "Invalid LTI request (signature mismatch)".to_string()
            }
            Self::NotAuthorized { .. } => "Not authorized.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for LtiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::post_failed("consumer did not answer before the timeout");
        }
        Self::post_failed(err.to_string())
    }
}

/// Result type alias for verification.
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Result type alias for gateway and grade operations.
pub type LtiResult<T> = Result<T, LtiError>;
