/// Error type definitions
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    #[error("Signing failed: {0}")]
    SigningError(String),

    #[error("Recovery failed: {0}")]
    RecoveryError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, SignerError>;
