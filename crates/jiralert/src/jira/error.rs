use std::time::Duration;

use thiserror::Error;

use crate::ErrorKind;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// A failed call to the ticket system.
#[derive(Debug, Clone, Error)]
#[error("JIRA request {api} failed: {message}")]
pub struct GatewayError {
    pub api: &'static str,
    pub status: Option<u16>,
    pub kind: ErrorKind,
    pub message: String,
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// 500 and 503 are worth retrying, everything else is not.
pub fn classify(status: u16, retry_after: Option<Duration>) -> ErrorKind {
    match status {
        500 | 503 => ErrorKind::Temporary { retry_after },
        _ => ErrorKind::Permanent,
    }
}

fn truncate_error_body(raw: &str) -> String {
    if raw.chars().count() <= MAX_ERROR_BODY_CHARS {
        return raw.to_string();
    }
    let mut truncated: String = raw.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

impl GatewayError {
    /// Non-2xx response.
    pub fn from_status(
        api: &'static str,
        url: &str,
        status: u16,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Self {
        Self {
            api,
            status: Some(status),
            kind: classify(status, retry_after),
            message: format!(
                "{} returned status {}, body {:?}",
                url,
                status,
                truncate_error_body(body)
            ),
        }
    }

    /// No usable response: connect failure, timeout, undecodable body.
    pub fn transport(api: &'static str, err: impl std::fmt::Display) -> Self {
        Self::permanent(api, err.to_string())
    }

    pub fn permanent(api: &'static str, message: impl Into<String>) -> Self {
        Self {
            api,
            status: None,
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }
}
