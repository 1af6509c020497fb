//! Authentication and key distribution errors.

use thiserror::Error;

/// Reasons an inbound token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing signature header")]
    MissingToken,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token header carries no key id")]
    MissingKeyId,

    #[error("unknown key id '{0}'")]
    UnknownKeyId(String),

    #[error("key '{0}' is not a usable RSA public key")]
    InvalidKey(String),

    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("audience mismatch: expected '{expected}', got '{actual}'")]
    AudienceMismatch { expected: String, actual: String },
}

/// Failures while fetching keys from the distribution endpoint.
#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("key endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("key endpoint returned status {0}")]
    Status(u16),

    #[error("key endpoint body is not a key map: {0}")]
    Decode(String),

    #[error("invalid key endpoint: {0}")]
    InvalidEndpoint(String),
}
