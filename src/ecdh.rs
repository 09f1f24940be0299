//! X25519 key agreement and symmetric key derivation.
//!
//! Sender and recipient each combine their own private key with the other
//! party's public key and arrive at the same shared secret:
//!
//! ```text
//! ECDH(sender_private, recipient_public) == ECDH(recipient_private, sender_public)
//! ```
//!
//! This symmetry is what lets the recipient decrypt without the sender
//! being online. The raw agreement output is never used as a cipher key
//! directly; it passes through HKDF-SHA256 with a fixed info string for
//! domain separation. The HKDF step is part of the wire format: an
//! implementation that feeds the raw secret to AES will not interoperate.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keys::{PrivateKey, PublicKey};

/// Domain separation context, fixed for the v1 envelope format.
const HKDF_INFO: &[u8] = b"sealpost-envelope-v1";

/// Raw shared secret from X25519 agreement (32 bytes).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Get the raw bytes of the shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// AEAD key derived from a shared secret (32 bytes, AES-256).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; 32]);

impl MessageKey {
    /// Get the raw bytes of the derived key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Perform X25519 Diffie-Hellman agreement.
pub fn agree(our_private: &PrivateKey, their_public: &PublicKey) -> SharedSecret {
    let secret = our_private.to_x25519();
    let public = their_public.to_x25519();
    let shared = secret.diffie_hellman(&public);
    SharedSecret(*shared.as_bytes())
}

/// Derive the per-conversation AEAD key from a shared secret.
///
/// The sender's public key is mixed in as HKDF salt so that the same two
/// parties derive direction-independent but pair-specific keys.
pub fn derive_message_key(shared: &SharedSecret, sender_public: &PublicKey) -> MessageKey {
    let hkdf = Hkdf::<Sha256>::new(Some(sender_public.as_bytes()), shared.as_bytes());
    let mut key = [0u8; 32];
    // Expand cannot fail for a 32-byte output
    hkdf.expand(HKDF_INFO, &mut key)
        .expect("HKDF expand failed for 32-byte output");
    MessageKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    #[test]
    fn test_agreement_symmetric() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let shared_alice = agree(&alice.private, &bob.public);
        let shared_bob = agree(&bob.private, &alice.public);

        assert_eq!(shared_alice.as_bytes(), shared_bob.as_bytes());
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let carol = Keypair::generate();

        let shared_ab = agree(&alice.private, &bob.public);
        let shared_ac = agree(&alice.private, &carol.public);

        assert_ne!(shared_ab.as_bytes(), shared_ac.as_bytes());
    }

    #[test]
    fn test_derived_key_matches_both_directions() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        // Alice seals to Bob: her key travels as sender material
        let key_sender = derive_message_key(&agree(&alice.private, &bob.public), &alice.public);
        let key_recipient = derive_message_key(&agree(&bob.private, &alice.public), &alice.public);

        assert_eq!(key_sender.as_bytes(), key_recipient.as_bytes());
    }

    #[test]
    fn test_salt_changes_key() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let shared = agree(&alice.private, &bob.public);

        let key1 = derive_message_key(&shared, &alice.public);
        let key2 = derive_message_key(&shared, &bob.public);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_secret_debug_redacted() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let shared = agree(&alice.private, &bob.public);

        assert!(format!("{:?}", shared).contains("REDACTED"));
        let key = derive_message_key(&shared, &alice.public);
        assert!(format!("{:?}", key).contains("REDACTED"));
    }
}
