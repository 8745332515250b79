//! Type definitions for the proxy module

use axum::{
    http::{uri::Authority, StatusCode},
    response::{IntoResponse, Response},
};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ========== Runner Types ==========

/// Human readable runner name, used only for diagnostics
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, AsRef, TryFrom),
)]
pub struct RunnerName(String);

/// Path prefix a runner is exposed under
#[nutype(
    validate(predicate = |s: &str| s.starts_with('/')),
    derive(Clone, Debug, Display, Hash, PartialEq, Eq, Deserialize, Serialize, AsRef, TryFrom),
)]
pub struct RunnerPath(String);

impl RunnerPath {
    /// A bare `/` prefix is never stripped from forwarded paths.
    pub fn is_strippable(&self) -> bool {
        self.as_ref().len() > 1
    }
}

/// Backend authority (`host` or `host:port`) a runner forwards to
#[nutype(
    sanitize(trim),
    validate(not_empty, predicate = |s: &str| s.parse::<Authority>().is_ok()),
    derive(Clone, Debug, Display, PartialEq, Eq, Deserialize, Serialize, AsRef, TryFrom),
)]
pub struct TargetHost(String);

/// Scheme used to reach a runner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetScheme {
    #[default]
    Http,
    Https,
}

impl TargetScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for TargetScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== Constants ==========

/// Default path when stripping a prefix leaves nothing behind
pub const DEFAULT_PATH: &str = "/";

/// Scheme reported for inbound requests that do not carry one
pub const DEFAULT_INBOUND_SCHEME: &str = "http";

/// Body returned when an unexpected fault carries no message
pub const INTERNAL_SERVER_ERROR_BODY: &str = "Internal server error";

/// Body returned when no runner matches the request path
pub const NOT_FOUND_BODY: &str = "Not Found";

/// Default upper bound for inbound request bodies (10MB)
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

/// Errors that can occur while forwarding a request
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Request too large: exceeds {max_size} bytes")]
    RequestTooLarge { max_size: usize },

    #[error("Request timeout after {0:?}")]
    RequestTimeout(Duration),

    #[error("Invalid target URI: {0}")]
    InvalidTargetUri(String),

    #[error("Failed to read request body: {0}")]
    Body(String),

    /// Transport failure talking to the runner; carries the full error chain.
    #[error("{0}")]
    Upstream(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout(_)
            | Self::InvalidTargetUri(_)
            | Self::Body(_)
            | Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build an upstream error from a client error and all of its sources
    pub fn upstream(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Upstream(message)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_path_validation() {
        assert!(RunnerPath::try_new("/v1/chat").is_ok());
        assert!(RunnerPath::try_new("/").is_ok());

        assert!(RunnerPath::try_new("v1/chat").is_err());
        assert!(RunnerPath::try_new("").is_err());
    }

    #[test]
    fn test_root_path_is_not_strippable() {
        assert!(!RunnerPath::try_new("/").unwrap().is_strippable());
        assert!(RunnerPath::try_new("/a").unwrap().is_strippable());
    }

    #[test]
    fn test_target_host_is_trimmed() {
        let host = TargetHost::try_new("  backend:9000 ").unwrap();
        assert_eq!(host.as_ref(), "backend:9000");
        assert!(TargetHost::try_new("   ").is_err());
    }

    #[test]
    fn test_target_host_must_be_an_authority() {
        assert!(TargetHost::try_new("backend").is_ok());
        assert!(TargetHost::try_new("127.0.0.1:9000").is_ok());

        assert!(TargetHost::try_new("http://backend:9000").is_err());
        assert!(TargetHost::try_new("a b").is_err());
        assert!(TargetHost::try_new("backend/v1").is_err());
    }

    #[test]
    fn test_scheme_display() {
        assert_eq!(TargetScheme::Http.to_string(), "http");
        assert_eq!(TargetScheme::Https.to_string(), "https");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ProxyError::RequestTooLarge { max_size: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::Upstream("connection refused".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::RequestTimeout(Duration::from_secs(1)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_error_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = std::io::Error::other(inner);
        let error = ProxyError::upstream(&outer);
        assert!(error.to_string().contains("refused"));
    }
}
