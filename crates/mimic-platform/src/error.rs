//! Common error types for mimic-platform.

use mimic_core::MacroError;
use thiserror::Error;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("hook installation failed: {0}")]
    HookFailed(String),
    #[error("injection failed: {0}")]
    InjectionFailed(String),
    #[error("no key mapping for virtual-key 0x{0:02X}")]
    UnmappedKey(u32),
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

impl From<PlatformError> for MacroError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::HookFailed(msg) => MacroError::HookInstall(msg),
            other => MacroError::Injection(other.to_string()),
        }
    }
}
