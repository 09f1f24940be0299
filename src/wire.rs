//! Envelope wire format: token codec and tagged message body.
//!
//! # Token layout
//!
//! ```text
//! ┌────────────┬──────────────────────────┬──────────────────┐
//! │ IV (12 B)  │ ciphertext + tag (≥16 B) │ sender key (32 B)│
//! └────────────┴──────────────────────────┴──────────────────┘
//! ```
//!
//! The concatenation is encoded as URL-safe base64 with padding stripped.
//! Encoding is deterministic and fully reversible; two independent
//! implementations must produce bit-identical tokens for identical inputs.
//!
//! # Wire message
//!
//! ```text
//! 🔒 @<recipientHandle> #e2e <token>
//! ```
//!
//! Anything not matching that exact shape is not an envelope and is left to
//! render as plain text.

use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;

use crate::error::{Result, SealpostError};
use crate::keys::PublicKey;
use crate::limits::{ENVELOPE_OVERHEAD, IV_LEN, SENDER_KEY_LEN, TAG_LEN};

/// A sealed message, constructed per encryption and embedded in a token.
///
/// The sender's static public key travels with the message so the recipient
/// can re-derive the shared secret without a prior handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Fresh random IV; never reused with the same symmetric key.
    pub iv: [u8; IV_LEN],
    /// AES-256-GCM output including the 16-byte authentication tag.
    pub ciphertext: Vec<u8>,
    /// The sender's public key material.
    pub sender_public: PublicKey,
}

fn b64() -> &'static base64::engine::GeneralPurpose {
    &base64::engine::general_purpose::URL_SAFE_NO_PAD
}

/// Serialize an envelope into a compact printable token.
pub fn encode(envelope: &Envelope) -> String {
    let mut payload =
        Vec::with_capacity(IV_LEN + envelope.ciphertext.len() + SENDER_KEY_LEN);
    payload.extend_from_slice(&envelope.iv);
    payload.extend_from_slice(&envelope.ciphertext);
    payload.extend_from_slice(envelope.sender_public.as_bytes());
    b64().encode(payload)
}

/// Parse a token back into an envelope.
///
/// Rejects malformed base64 and any payload too short to hold an IV, an
/// authentication tag, and the embedded sender key.
pub fn decode(token: &str) -> Result<Envelope> {
    let payload = b64()
        .decode(token)
        .map_err(|e| SealpostError::Format(format!("Invalid base64 token: {}", e)))?;

    if payload.len() < ENVELOPE_OVERHEAD {
        return Err(SealpostError::Format(format!(
            "Token payload too short: {} bytes, need at least {}",
            payload.len(),
            ENVELOPE_OVERHEAD
        )));
    }

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&payload[..IV_LEN]);

    let key_start = payload.len() - SENDER_KEY_LEN;
    let mut key = [0u8; SENDER_KEY_LEN];
    key.copy_from_slice(&payload[key_start..]);

    let ciphertext = payload[IV_LEN..key_start].to_vec();
    debug_assert!(ciphertext.len() >= TAG_LEN);

    Ok(Envelope {
        iv,
        ciphertext,
        sender_public: PublicKey::from_bytes(key),
    })
}

/// The two pieces recovered from a wire message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireParts {
    /// Handle the message is addressed to, as written (case preserved).
    pub recipient_handle: String,
    /// The envelope token.
    pub token: String,
}

/// Produce the postable text body for a token addressed to `recipient_handle`.
pub fn wrap(recipient_handle: &str, token: &str) -> String {
    format!("\u{1F512} @{} #e2e {}", recipient_handle, token)
}

fn wire_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Handle charset matches the posting substrate's handle grammar.
        Regex::new(r"^\u{1F512} @([A-Za-z0-9.-]+) #e2e ([A-Za-z0-9_-]+)$")
            .expect("wire regex is valid")
    })
}

/// Match a post body against the wire shape.
///
/// Returns `None` for any text that is not an envelope; the feed renderer
/// uses this to decide whether to show a locked-message affordance at all.
pub fn unwrap(text: &str) -> Option<WireParts> {
    let caps = wire_regex().captures(text.trim())?;
    Some(WireParts {
        recipient_handle: caps[1].to_string(),
        token: caps[2].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    fn sample_envelope() -> Envelope {
        Envelope {
            iv: [7u8; IV_LEN],
            ciphertext: vec![42u8; 29], // 13 bytes of "plaintext" + tag
            sender_public: Keypair::generate().public,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let envelope = sample_envelope();
        let token = encode(&envelope);
        let decoded = decode(&token).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_token_is_urlsafe_no_pad() {
        let token = encode(&sample_envelope());
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_encode_deterministic() {
        let envelope = sample_envelope();
        assert_eq!(encode(&envelope), encode(&envelope));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let result = decode("not!!valid//base64==");
        assert!(matches!(result, Err(SealpostError::Format(_))));
    }

    #[test]
    fn test_decode_rejects_short_payload() {
        // 59 bytes is one short of iv + tag + sender key.
        let short = b64().encode(vec![0u8; ENVELOPE_OVERHEAD - 1]);
        assert!(matches!(decode(&short), Err(SealpostError::Format(_))));

        // Exactly the minimum (empty plaintext) parses.
        let minimal = b64().encode(vec![0u8; ENVELOPE_OVERHEAD]);
        let envelope = decode(&minimal).unwrap();
        assert_eq!(envelope.ciphertext.len(), TAG_LEN);
    }

    #[test]
    fn test_wrap_shape() {
        let body = wrap("bob.bsky.social", "dG9rZW4");
        assert_eq!(body, "\u{1F512} @bob.bsky.social #e2e dG9rZW4");
    }

    #[test]
    fn test_unwrap_wrap_identity() {
        let parts = unwrap(&wrap("Bob.example", "QUJDRA")).unwrap();
        assert_eq!(parts.recipient_handle, "Bob.example");
        assert_eq!(parts.token, "QUJDRA");
    }

    #[test]
    fn test_unwrap_preserves_handle_case() {
        let parts = unwrap(&wrap("AlIcE", "QUJDRA")).unwrap();
        assert_eq!(parts.recipient_handle, "AlIcE");
    }

    #[test]
    fn test_unwrap_rejects_plain_text() {
        assert!(unwrap("just a normal post").is_none());
        assert!(unwrap("").is_none());
    }

    #[test]
    fn test_unwrap_rejects_partial_shapes() {
        assert!(unwrap("\u{1F512} @bob").is_none());
        assert!(unwrap("\u{1F512} @bob #e2e").is_none());
        assert!(unwrap("\u{1F512} @bob #e2e two tokens").is_none());
        assert!(unwrap("@bob #e2e QUJDRA").is_none());
        // Token charset is base64url only.
        assert!(unwrap("\u{1F512} @bob #e2e abc+def").is_none());
    }

    #[test]
    fn test_unwrap_tolerates_surrounding_whitespace() {
        let parts = unwrap("  \u{1F512} @bob #e2e QUJDRA \n").unwrap();
        assert_eq!(parts.recipient_handle, "bob");
    }

    #[test]
    fn test_full_token_through_wire() {
        let envelope = sample_envelope();
        let token = encode(&envelope);
        let body = wrap("carol.example.org", &token);

        let parts = unwrap(&body).unwrap();
        assert_eq!(parts.token, token);
        assert_eq!(decode(&parts.token).unwrap(), envelope);
    }
}
