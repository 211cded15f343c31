//! Percent-escaping of free-text header arguments.
//!
//! Nicknames, personal messages, group names, and display-picture objects
//! travel percent-escaped so they cannot contain the SP and CRLF bytes
//! that delimit headers. Everything outside the RFC 3986 unreserved set
//! (`ALPHA / DIGIT / "-" / "." / "_" / "~"`) is escaped; free text is
//! UTF-8 before encoding.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything but the RFC 3986 unreserved characters.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Escape a free-text argument for the wire.
pub fn escape(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, ESCAPED).into()
}

/// Decode a percent-escaped argument.
///
/// Invalid UTF-8 after unescaping is replaced rather than rejected: a
/// malformed nickname must not kill the whole command.
pub fn unescape(value: &str) -> Cow<'_, str> {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Owned(
            percent_decode_str(value)
                .decode_utf8_lossy()
                .into_owned(),
        ),
    }
}
