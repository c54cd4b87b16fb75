use thiserror::Error;

/// Why a slot refresh did not happen
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("network error: {0}")]
    Network(String),

    #[error("identity service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Durable settings store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings root must be a JSON object")]
    NotAnObject,
}
