//! # sealpost
//!
//! End-to-end encrypted direct-message envelopes for public social feeds.
//!
//! A sender turns plaintext into a self-describing, publicly-postable
//! ciphertext addressed to one recipient. The envelope rides inside an
//! ordinary text post; only the addressed recipient (or the original
//! sender) can recover the plaintext, using key material published through
//! an external handle-keyed registry.
//!
//! ## Cryptographic primitives
//!
//! - **Key agreement**: X25519 (static-static ECDH)
//! - **Key derivation**: HKDF-SHA256 with a fixed domain-separation string
//! - **Symmetric cipher**: AES-256-GCM (AEAD)
//! - **Key at rest**: Argon2id + AES-256-GCM (local keystore)
//!
//! ## Wire format
//!
//! ```text
//! 🔒 @<recipientHandle> #e2e <token>
//!
//! token = base64url-no-pad( iv[12] || ciphertext+tag || senderPublicKey[32] )
//! ```
//!
//! The whole message must fit the posting substrate's character limit
//! (300 in the observed deployment); the plaintext cap is derived backward
//! from that limit and enforced before any cryptographic work.
//!
//! ## Example
//!
//! ```rust
//! use sealpost::{seal, unseal, wire, Keypair, WireLimits};
//!
//! let alice = Keypair::generate();
//! let bob = Keypair::generate();
//! let limits = WireLimits::default();
//!
//! // Alice seals a message for Bob and wraps it for posting.
//! let envelope = seal("meet at 9", &bob.public, &alice, &limits, "bob").unwrap();
//! let body = wire::wrap("bob", &wire::encode(&envelope));
//!
//! // Bob matches the wire shape and unseals with his private key.
//! let parts = wire::unwrap(&body).unwrap();
//! let envelope = wire::decode(&parts.token).unwrap();
//! let plaintext = unseal(&envelope, &envelope.sender_public, &bob).unwrap();
//! assert_eq!(plaintext, "meet at 9");
//! ```

pub mod cipher;
pub mod ecdh;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod limits;
pub mod policy;
pub mod registry;
pub mod session;
pub mod wire;

// Re-export commonly used types
pub use cipher::{seal, unseal};
pub use error::{Result, SealpostError};
pub use keys::{Keypair, PortablePublicKey, PrivateKey, PublicKey, StoredKeypair};
pub use keystore::KeyStore;
pub use limits::WireLimits;
pub use policy::can_attempt_decrypt;
pub use registry::{HttpKeyRegistry, KeyRegistry, MockKeyRegistry, PublicKeyRecord};
pub use session::{MessagingSession, MockSubstrate, Post, PostRef, PostView, PostingSubstrate};
pub use wire::{Envelope, WireParts};
