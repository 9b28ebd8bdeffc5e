//! Error types for Snapmox

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapmoxError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Control error on CT {ctid} during {operation}: {message}")]
    ControlError {
        ctid: u32,
        operation: &'static str,
        message: String,
    },

    #[error("Container listing failed: {0}")]
    ListError(String),

    #[error("Command in CT {ctid} timed out after {seconds}s")]
    Timeout { ctid: u32, seconds: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SnapmoxError {
    pub fn control(ctid: u32, operation: &'static str, message: impl Into<String>) -> Self {
        SnapmoxError::ControlError {
            ctid,
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapmoxError>;
