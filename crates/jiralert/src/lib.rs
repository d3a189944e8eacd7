pub mod alertmanager;
pub mod cache;
pub mod config;
pub mod identity;
pub mod jira;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod template;

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

pub use jira::GatewayError;

/// Whether a failed operation is worth retrying by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Permanent,
    Temporary { retry_after: Option<Duration> },
}

impl ErrorKind {
    pub fn is_temporary(&self) -> bool {
        matches!(self, ErrorKind::Temporary { .. })
    }

    /// HTTP-style status recorded for an alert that failed with this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Permanent => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Temporary { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// One failing alert inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFailure {
    pub issue_label: String,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Receiver missing: {0}")]
    ReceiverNotFound(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("JIRA state {state:?} does not exist or no transition possible for {issue}")]
    MissingTransition { state: String, issue: String },
    #[error("{} alert(s) failed: {}", .0.len(), join_failures(.0))]
    Batch(Vec<LabelFailure>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Retry classification. Only gateway responses can be temporary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Gateway(e) => e.kind,
            _ => ErrorKind::Permanent,
        }
    }
}

fn join_failures(failures: &[LabelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.issue_label, f.status, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
