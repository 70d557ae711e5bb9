//! Display helpers

use std::borrow::Cow;

/// Shorten a long hex string to `0x1234…abcd`, keeping `keep` digits on each side
///
/// Strings that are already short enough are returned unchanged
#[must_use]
pub fn short_hex(s: &str, keep: usize) -> Cow<str> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() <= keep * 2 {
        return Cow::Borrowed(s);
    }

    Cow::Owned(format!(
        "0x{}…{}",
        &digits[..keep],
        &digits[digits.len() - keep..]
    ))
}
