//! Sealing and unsealing of message plaintext.
//!
//! One scheme only: static-static X25519 agreement, HKDF-SHA256, then
//! AES-256-GCM under a fresh random IV. The sender's public key rides in the
//! envelope so the recipient can re-derive the shared secret offline.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::ecdh::{agree, derive_message_key};
use crate::error::{Result, SealpostError};
use crate::keys::{Keypair, PublicKey};
use crate::limits::{WireLimits, IV_LEN};
use crate::wire::Envelope;

/// Encrypt `plaintext` for the holder of `recipient_public`.
///
/// The plaintext length is validated against `limits` before any
/// cryptographic work; oversized input fails fast with
/// [`SealpostError::MessageTooLong`].
pub fn seal(
    plaintext: &str,
    recipient_public: &PublicKey,
    sender: &Keypair,
    limits: &WireLimits,
    recipient_handle: &str,
) -> Result<Envelope> {
    limits.check_plaintext(plaintext, recipient_handle)?;

    let shared = agree(&sender.private, recipient_public);
    let key = derive_message_key(&shared, &sender.public);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SealpostError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| SealpostError::Encryption("AES-GCM encryption failed".into()))?;

    Ok(Envelope {
        iv,
        ciphertext,
        sender_public: sender.public.clone(),
    })
}

/// Decrypt an envelope addressed to the holder of `recipient.private`.
///
/// `sender_public` is the counterpart key for the agreement: the envelope's
/// embedded sender key on the receiving side, or the recipient's published
/// key when the original sender re-opens their own message.
///
/// Every failure collapses to the opaque [`SealpostError::Decryption`]; the
/// caller is never told whether the key, the tag, or the format was wrong.
pub fn unseal(envelope: &Envelope, sender_public: &PublicKey, recipient: &Keypair) -> Result<String> {
    let shared = agree(&recipient.private, sender_public);
    let key = derive_message_key(&shared, &envelope.sender_public);

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| SealpostError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_slice())
        .map_err(|_| SealpostError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| SealpostError::Decryption)
}
