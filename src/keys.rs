//! X25519 keypairs and their transport encoding.
//!
//! The local identity holds one X25519 keypair. The public half travels
//! through the key registry and inside envelopes as a [`PortablePublicKey`],
//! which stringifies the 32-byte curve point (base64) so it survives any
//! serialization boundary without precision loss. The private half never
//! leaves the local keystore.
//!
//! # Security
//!
//! - Private keys are zeroized on drop
//! - `Debug` output redacts private key material

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SealpostError};

/// Keypair format version persisted alongside key material.
pub const KEY_VERSION: u8 = 1;

/// X25519 public key (32 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create a public key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn to_x25519(&self) -> X25519Public {
        X25519Public::from(self.0)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: String = self.0[..8].iter().map(|b| format!("{:02x}", b)).collect();
        write!(f, "PublicKey({})", hex)
    }
}

/// X25519 private key (32 bytes) with automatic zeroization.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Create a private key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0)
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = self.to_x25519();
        let public = X25519Public::from(&secret);
        PublicKey(*public.as_bytes())
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// X25519 keypair for envelope encryption.
pub struct Keypair {
    /// The public key (published to the registry, embedded in envelopes).
    pub public: PublicKey,
    /// The private key (kept in the local keystore).
    pub private: PrivateKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut secret_bytes = [0u8; 32];
        rng.fill_bytes(&mut secret_bytes);

        let secret = StaticSecret::from(secret_bytes);
        let public = X25519Public::from(&secret);

        secret_bytes.zeroize();

        Self {
            public: PublicKey(*public.as_bytes()),
            private: PrivateKey(secret.to_bytes()),
        }
    }

    /// Reconstruct a keypair from an existing private key.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            public: self.public.clone(),
            private: self.private.clone(),
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// A keypair as persisted by the keystore: key material plus metadata.
pub struct StoredKeypair {
    pub keypair: Keypair,
    pub created_at: DateTime<Utc>,
    pub version: u8,
}

impl StoredKeypair {
    /// Wrap a freshly generated keypair with current metadata.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            created_at: Utc::now(),
            version: KEY_VERSION,
        }
    }
}

impl std::fmt::Debug for StoredKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeypair")
            .field("keypair", &self.keypair)
            .field("created_at", &self.created_at)
            .field("version", &self.version)
            .finish()
    }
}

/// Transport-safe encoding of a public key.
///
/// This is what crosses the registry wire and what `exportPublic` produces.
/// The curve point is carried as a base64 string rather than a byte array so
/// that JSON round-trips cannot silently mangle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortablePublicKey {
    /// Key format version.
    pub version: u8,
    /// Curve identifier (always "x25519").
    pub curve: String,
    /// Base64-encoded 32-byte curve point.
    pub public_key: String,
}

impl PortablePublicKey {
    /// Export the public half of a key in transportable form.
    pub fn from_public(key: &PublicKey) -> Self {
        use base64::Engine;
        Self {
            version: KEY_VERSION,
            curve: "x25519".to_string(),
            public_key: base64::engine::general_purpose::STANDARD.encode(key.as_bytes()),
        }
    }

    /// Import back into the curve domain, validating the encoding.
    pub fn to_public(&self) -> Result<PublicKey> {
        use base64::Engine;
        if self.curve != "x25519" {
            return Err(SealpostError::InvalidKey(format!(
                "Unsupported curve: {}",
                self.curve
            )));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.public_key)
            .map_err(|e| SealpostError::InvalidKey(format!("Invalid base64: {}", e)))?;
        if bytes.len() != 32 {
            return Err(SealpostError::InvalidKey(format!(
                "Expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(PublicKey(arr))
    }
}
