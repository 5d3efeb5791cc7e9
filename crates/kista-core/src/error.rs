#![forbid(unsafe_code)]

/// Errors produced by the Kista PKCS#12 library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid object identifier: {0}")]
    InvalidOid(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, Error>;
