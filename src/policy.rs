//! Recipient gating for envelopes found in a feed.
//!
//! A locked post is decryptable by exactly two parties: the addressed
//! recipient and the author (who may always re-open their own sent
//! messages). Everyone else gets the locked placeholder and is never offered
//! a decrypt action.

/// Case-insensitive handle comparison.
///
/// Handles are matched case-sensitively by the wire regex but compared
/// case-insensitively for identity, because the posting substrate treats
/// handles as case-insensitive.
pub fn handles_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Decide whether `local_handle` may attempt decryption of a wire message
/// addressed to `wire_recipient_handle` and authored by `wire_author_handle`.
pub fn can_attempt_decrypt(
    wire_recipient_handle: &str,
    wire_author_handle: &str,
    local_handle: &str,
) -> bool {
    handles_match(local_handle, wire_recipient_handle)
        || handles_match(local_handle, wire_author_handle)
}
