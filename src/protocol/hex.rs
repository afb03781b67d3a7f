/// Hexadecimal field decoding for packet body tokens
use crate::models::EMPTY_FIELD;

/// Convert a hex token to its decimal string form
///
/// Tokens that are not made up solely of hex digits (after trimming) are
/// returned unchanged, so identifiers and already-decimal text survive.
/// Values too large for a `u128` are also passed through.
pub fn hex_to_decimal(token: &str) -> String {
    if token.is_empty() || token == EMPTY_FIELD {
        return token.to_string();
    }

    let clean = token.trim().to_ascii_uppercase();
    if clean.is_empty() || !clean.bytes().all(|b| b.is_ascii_hexdigit()) {
        return token.to_string();
    }

    match u128::from_str_radix(&clean, 16) {
        Ok(value) => value.to_string(),
        Err(_) => token.to_string(),
    }
}
