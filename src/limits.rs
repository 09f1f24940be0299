//! Post-length budget and the plaintext cap derived from it.
//!
//! The posting substrate rejects text over a hard character limit (300 in
//! the observed deployment). The maximum plaintext is computed backward from
//! that limit: fixed wire prefix, base64 expansion (4/3), AEAD tag, and the
//! embedded sender key all come off the top. The check runs before any
//! cryptographic or network work so an oversized message costs nothing and
//! the caller gets an actionable error.
//!
//! Lengths are counted in Unicode scalar values, matching how the substrate
//! counts post text. Plaintext is capped by its UTF-8 byte length, which is
//! what actually gets encrypted.

use crate::error::{Result, SealpostError};

/// AES-GCM initialization vector length.
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Embedded X25519 sender public key length.
pub const SENDER_KEY_LEN: usize = 32;

/// Fixed wire bytes per envelope besides the ciphertext itself.
pub const ENVELOPE_OVERHEAD: usize = IV_LEN + TAG_LEN + SENDER_KEY_LEN;

/// Characters in the wire prefix `🔒 @<handle> #e2e ` for a given handle.
fn prefix_chars(recipient_handle: &str) -> usize {
    // lock(1) + space(1) + '@'(1) + handle + space(1) + "#e2e"(4) + space(1)
    recipient_handle.chars().count() + 9
}

/// Length budget for outgoing wire messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLimits {
    /// Hard character limit of the posting substrate.
    pub max_post_chars: usize,
}

impl Default for WireLimits {
    fn default() -> Self {
        Self {
            max_post_chars: 300,
        }
    }
}

impl WireLimits {
    /// Create limits for a substrate with the given post-length cap.
    pub fn new(max_post_chars: usize) -> Self {
        Self { max_post_chars }
    }

    /// Maximum plaintext bytes that still fit a post addressed to `handle`.
    ///
    /// Derivation: the token is base64url (no padding) of
    /// `iv || ciphertext+tag || sender_key`, so `n` payload bytes occupy
    /// `ceil(4n/3)` characters. The largest `n` fitting the remaining budget
    /// is `floor(3 * budget / 4)`; the fixed envelope overhead then comes
    /// out of `n`.
    pub fn max_plaintext_len(&self, recipient_handle: &str) -> usize {
        let budget = self
            .max_post_chars
            .saturating_sub(prefix_chars(recipient_handle));
        (budget * 3 / 4).saturating_sub(ENVELOPE_OVERHEAD)
    }

    /// Reject plaintext that cannot fit, before any crypto work happens.
    pub fn check_plaintext(&self, plaintext: &str, recipient_handle: &str) -> Result<()> {
        let max = self.max_plaintext_len(recipient_handle);
        let len = plaintext.len();
        if len > max {
            return Err(SealpostError::MessageTooLong { len, max });
        }
        Ok(())
    }
}
