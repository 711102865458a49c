//! Error taxonomy for mimic-core.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MacroError {
    /// Empty or invalid path, or settings that fail validation.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("macro file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Save or play requested with nothing recorded.
    #[error("nothing recorded: {0}")]
    EmptyState(String),
    /// The OS refused to register a global input hook. Fatal for capture.
    #[error("failed to install input hook: {0}")]
    HookInstall(String),
    /// A single synthetic input could not be delivered.
    #[error("injection failed: {0}")]
    Injection(String),
    /// Rejected because recording or playback is in progress.
    #[error("busy: {0}")]
    Busy(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type MacroResult<T> = Result<T, MacroError>;
