//! Error types for autoreply-core operations.

use thiserror::Error;

/// Boxed error raised by a port implementation (HTTP client, fake, ...).
pub type PortError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum AutoReplyError {
    #[error("Invalid period: start {start} is after end {end}")]
    InvalidPeriod { start: String, end: String },

    #[error("Invalid date-time: {0}")]
    InvalidDateTime(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Calendar query failed: {0}")]
    Calendar(#[source] PortError),

    #[error("Mailbox access failed: {0}")]
    Mailbox(#[source] PortError),
}

impl From<minijinja::Error> for AutoReplyError {
    fn from(e: minijinja::Error) -> Self {
        AutoReplyError::Template(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutoReplyError>;
