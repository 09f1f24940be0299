//! Error types for envelope operations.

use thiserror::Error;

/// Errors produced by key management, sealing, and wire-format handling.
#[derive(Error, Debug)]
pub enum SealpostError {
    /// The platform cannot perform key operations. Fatal, not retryable.
    #[error("Cryptographic provider unavailable: {0}")]
    CryptoUnavailable(String),

    /// No local keypair exists for this identity. Run key setup.
    #[error("No encryption keys found for identity '{0}'")]
    KeyNotFound(String),

    /// The recipient has not published a key. Treated as "recipient not
    /// ready", not as a failure.
    #[error("Recipient '{0}' has not set up encryption")]
    RecipientKeyNotFound(String),

    /// Remote registry call failed. Transient, retryable with backoff.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Malformed token or wire text.
    #[error("Invalid envelope format: {0}")]
    Format(String),

    /// Plaintext would overflow the posting substrate's length limit.
    /// Rejected before any cryptographic or network work.
    #[error("Message too long: {len} bytes exceeds the {max}-byte limit")]
    MessageTooLong { len: usize, max: usize },

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed. Deliberately carries no detail: corrupt token,
    /// wrong key, and tag mismatch are indistinguishable to callers.
    #[error("Unable to decrypt message")]
    Decryption,

    /// A public key could not be imported.
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    /// Identity string unusable as a storage key.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Keystore passphrase too short.
    #[error("Passphrase too short (minimum {0} characters required)")]
    PassphraseTooShort(usize),

    /// I/O error from the local keystore.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for envelope operations.
pub type Result<T> = std::result::Result<T, SealpostError>;
