//! Crypto error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid secret key encoding")]
    InvalidSecretKey,

    #[error("invalid signature encoding")]
    InvalidSignatureFormat,

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),
}
