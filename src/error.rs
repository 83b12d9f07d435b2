// src/error.rs

use thiserror::Error;

/// Input rejected before any remote call is made. Shown to the user verbatim.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Target is required")]
    MissingTarget,
    #[error("Invalid target format. Please enter a valid domain, URL, or IP address")]
    InvalidTarget,
    #[error("Custom headers must be a valid JSON object")]
    InvalidHeaders,
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// Failures of the remote execution round-trip. Never swallowed by the orchestrator.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Scan timed out after {0} seconds")]
    Timeout(u64),
    #[error("request to remote execution service failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("MCP server responded with status: {status}: {detail}")]
    RemoteStatus { status: u16, detail: String },
    #[error("MCP server response exceeds {0} bytes")]
    ResponseTooLarge(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
