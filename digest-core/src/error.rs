//! Error types for daily-digest.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// External service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    GitHub,
    Jira,
    Calendar,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::GitHub => "GitHub",
            Service::Jira => "Jira",
            Service::Calendar => "Calendar",
        };
        f.write_str(name)
    }
}

/// Errors that abort a digest run.
///
/// Every variant is fatal: the digest is either complete or not produced.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("{service}: authentication failed (HTTP {status})")]
    AuthenticationFailure { service: Service, status: u16 },

    #[error("{service}: request failed: {detail}")]
    NetworkFailure { service: Service, detail: String },

    #[error("{service}: unexpected HTTP {status}: {body}")]
    UnexpectedStatus {
        service: Service,
        status: u16,
        body: String,
    },

    #[error("{service}: malformed response: {detail}")]
    MalformedResponse { service: Service, detail: String },

    #[error("{service}: cannot read {}: {source}", path.display())]
    ReadFailure {
        service: Service,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Missing required configuration value: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration value for {name}: {detail}")]
    InvalidConfiguration { name: String, detail: String },

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD, 'today' or 'yesterday'")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DigestError {
    /// The service a failure belongs to, if it came from one.
    pub fn service(&self) -> Option<Service> {
        match self {
            DigestError::AuthenticationFailure { service, .. }
            | DigestError::NetworkFailure { service, .. }
            | DigestError::UnexpectedStatus { service, .. }
            | DigestError::MalformedResponse { service, .. }
            | DigestError::ReadFailure { service, .. } => Some(*service),
            _ => None,
        }
    }

    pub fn malformed(service: Service, detail: impl Into<String>) -> Self {
        DigestError::MalformedResponse {
            service,
            detail: detail.into(),
        }
    }

    pub fn invalid_config(name: &str, detail: impl Into<String>) -> Self {
        DigestError::InvalidConfiguration {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;
