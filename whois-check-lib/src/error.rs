//! Error handling for WHOIS lookups.
//!
//! Every stage of the lookup pipeline (validation, server resolution, the raw
//! protocol exchange, response parsing) reports failures through one error type.
//! The orchestrator never lets these escape a batch: each one is folded into the
//! `LookupResult` of the domain that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Message used when a response cannot be classified.
pub const UNPARSEABLE_RESPONSE: &str = "unparseable response";

/// Main error type for WHOIS lookup operations.
#[derive(Debug, Clone, PartialEq)]
pub enum WhoisCheckError {
    /// Malformed domain name (empty, whitespace, no suffix, bad label)
    InvalidDomain { domain: String, reason: String },

    /// No WHOIS server is known or discoverable for the suffix
    ResolverError { suffix: String, message: String },

    /// Connection, reset or per-query timeout while talking to a server
    NetworkError {
        server: String,
        kind: NetworkErrorKind,
        message: String,
    },

    /// A response was received but could not be classified
    ParseError { message: String },

    /// The server answered with a rate-limit notice instead of data
    RateLimited { server: String },

    /// An orchestrator-level bound (batch deadline) elapsed
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Invalid configuration value
    ConfigError { message: String },

    /// File I/O errors when reading configuration or domain lists
    FileError { path: String, message: String },
}

/// What went wrong on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkErrorKind {
    /// Host resolution failed or the connection was refused
    Connect,
    /// The peer reset or aborted an established connection
    Reset,
    /// The whole exchange did not finish within the query timeout
    Timeout,
}

/// Coarse error category carried by `LookupResult` for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Resolver,
    Network,
    Timeout,
    Parse,
    RateLimited,
    Config,
}

impl WhoisCheckError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new resolver error.
    pub fn resolver<S: Into<String>, M: Into<String>>(suffix: S, message: M) -> Self {
        Self::ResolverError {
            suffix: suffix.into(),
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<S: Into<String>, M: Into<String>>(
        server: S,
        kind: NetworkErrorKind,
        message: M,
    ) -> Self {
        Self::NetworkError {
            server: server.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// The error used for empty or unclassifiable responses.
    pub fn unparseable() -> Self {
        Self::parse(UNPARSEABLE_RESPONSE)
    }

    /// Create a new rate-limit error.
    pub fn rate_limited<S: Into<String>>(server: S) -> Self {
        Self::RateLimited {
            server: server.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Category of this error for summaries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDomain { .. } => ErrorKind::Validation,
            Self::ResolverError { .. } => ErrorKind::Resolver,
            Self::NetworkError {
                kind: NetworkErrorKind::Timeout,
                ..
            } => ErrorKind::Timeout,
            Self::NetworkError { .. } => ErrorKind::Network,
            Self::ParseError { .. } => ErrorKind::Parse,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ConfigError { .. } | Self::FileError { .. } => ErrorKind::Config,
        }
    }

    /// Check if this error suggests the operation could succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

impl fmt::Display for WhoisCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "invalid domain '{}': {}", domain, reason)
            }
            Self::ResolverError { suffix, message } => {
                write!(f, "no WHOIS server for suffix '{}': {}", suffix, message)
            }
            Self::NetworkError {
                server,
                kind,
                message,
            } => write!(f, "{} error talking to {}: {}", kind, server, message),
            Self::ParseError { message } => write!(f, "{}", message),
            Self::RateLimited { server } => write!(f, "rate limited by {}", server),
            Self::Timeout {
                operation,
                duration,
            } => write!(f, "timeout after {:?} during: {}", duration, operation),
            Self::ConfigError { message } => write!(f, "configuration error: {}", message),
            Self::FileError { path, message } => write!(f, "file error at '{}': {}", path, message),
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Connect => write!(f, "connect"),
            NetworkErrorKind::Reset => write!(f, "reset"),
            NetworkErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Validation => "invalid input",
            ErrorKind::Resolver => "unknown suffix",
            ErrorKind::Network => "network error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Parse => "unparseable response",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Config => "configuration",
        };
        write!(f, "{}", label)
    }
}

impl std::error::Error for WhoisCheckError {}

impl From<toml::de::Error> for WhoisCheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("failed to parse TOML configuration: {}", err),
        }
    }
}
