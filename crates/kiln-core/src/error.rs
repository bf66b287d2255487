//! Error types for Kiln

use thiserror::Error;

pub type Result<T> = std::result::Result<T, KilnError>;

#[derive(Error, Debug)]
pub enum KilnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Version conflict: submitted {submitted}, current {current}")]
    VersionConflict { submitted: String, current: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for KilnError {
    fn from(e: serde_json::Error) -> Self {
        KilnError::Serialization(e.to_string())
    }
}
