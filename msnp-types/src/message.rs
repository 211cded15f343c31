//! Instant messages and their MIME-ish payload form.
//!
//! A `MSG` payload is a block of `Name: value` headers, a blank line, and
//! the body bytes. The headers are ASCII; the body is opaque (its charset
//! is named by `Content-Type`). Rendering and parsing live here because
//! they are pure; the codec carries the payload as bytes.

use std::fmt::{Display, Formatter};

use crate::error::{ValidationError, ValidationErrorKind};

/// Delivery class of an outbound `MSG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryClass {
    /// `U` — fire-and-forget (typing notifications).
    Unacknowledged,
    /// `A` — the switchboard replies `ACK` or `NAK`.
    Acknowledged,
    /// `N` — notification; no ack expected.
    Notification,
}

impl DeliveryClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unacknowledged => "U",
            Self::Acknowledged => "A",
            Self::Notification => "N",
        }
    }
}

impl std::str::FromStr for DeliveryClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Self::Unacknowledged),
            "A" => Ok(Self::Acknowledged),
            "N" => Ok(Self::Notification),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

impl Display for DeliveryClass {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message carried inside `MSG`.
///
/// Headers keep their wire order; lookup is case-insensitive, matching how
/// the original clients treat them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Message {
    pub const CONTENT_TYPE_TEXT: &'static str = "text/plain; charset=UTF-8";
    pub const CONTENT_TYPE_CONTROL: &'static str = "text/x-msmsgscontrol";

    /// A plain-text message with the default format header.
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            headers: vec![
                ("MIME-Version".into(), "1.0".into()),
                ("Content-Type".into(), Self::CONTENT_TYPE_TEXT.into()),
                (
                    "X-MMS-IM-Format".into(),
                    "FN=MS%20Sans%20Serif; EF=; CO=0; CS=0; PF=0".into(),
                ),
            ],
            body: body.into().into_bytes(),
        }
    }

    /// A typing notification (`text/x-msmsgscontrol`, empty body).
    pub fn typing_user(login: impl AsRef<str>) -> Self {
        Self {
            headers: vec![
                ("MIME-Version".into(), "1.0".into()),
                ("Content-Type".into(), Self::CONTENT_TYPE_CONTROL.into()),
                ("TypingUser".into(), login.as_ref().to_owned()),
            ],
            // Clients expect the trailing CRLF after the header block only;
            // an empty body keeps some of them from rendering a ghost line.
            body: Vec::new(),
        }
    }

    /// A message with explicit headers. `MIME-Version` is prepended when
    /// missing.
    pub fn with_headers(headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let mut headers = headers;
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("MIME-Version"))
        {
            headers.insert(0, ("MIME-Version".into(), "1.0".into()));
        }

        Self { headers, body }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// The media type without parameters: `text/plain; charset=UTF-8` →
    /// `text/plain`.
    pub fn media_type(&self) -> Option<&str> {
        self.content_type()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Render to the payload byte form: headers, blank line, body.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 64);

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);

        out
    }

    /// Parse a payload back into headers and body.
    ///
    /// Header lines without a colon end the header block early (treated as
    /// the start of the body) — some gateways emit sloppy payloads and a
    /// lost header must not lose the message.
    pub fn parse(payload: &[u8]) -> Self {
        let mut headers = Vec::new();
        let mut rest = payload;

        loop {
            let Some(line_end) = find_crlf(rest) else {
                // No blank line: the whole remainder is body.
                break;
            };

            let line = &rest[..line_end];
            if line.is_empty() {
                rest = &rest[line_end + 2..];
                break;
            }

            let Some(colon) = line.iter().position(|b| *b == b':') else {
                break;
            };

            let name = String::from_utf8_lossy(&line[..colon]).trim().to_owned();
            let value = String::from_utf8_lossy(&line[colon + 1..]).trim().to_owned();
            headers.push((name, value));

            rest = &rest[line_end + 2..];
        }

        Self {
            headers,
            body: rest.to_vec(),
        }
    }
}

fn find_crlf(input: &[u8]) -> Option<usize> {
    input.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_render() {
        let message = Message::text("Hi!");
        let payload = message.render();

        let expected = b"MIME-Version: 1.0\r\n\
            Content-Type: text/plain; charset=UTF-8\r\n\
            X-MMS-IM-Format: FN=MS%20Sans%20Serif; EF=; CO=0; CS=0; PF=0\r\n\
            \r\n\
            Hi!";
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_render_parse_inverse() {
        let message = Message::text("two\r\nlines");
        let parsed = Message::parse(&message.render());

        assert_eq!(parsed, message);
        assert_eq!(parsed.media_type(), Some("text/plain"));
        assert_eq!(parsed.body_text(), Some("two\r\nlines"));
    }

    #[test]
    fn test_typing_user() {
        let message = Message::typing_user("a@b.c");

        assert_eq!(message.media_type(), Some("text/x-msmsgscontrol"));
        assert_eq!(message.header("typinguser"), Some("a@b.c"));
        assert!(message.body().is_empty());
    }

    #[test]
    fn test_parse_headerless_payload() {
        let parsed = Message::parse(b"no headers here");

        assert!(parsed.headers().is_empty());
        assert_eq!(parsed.body(), b"no headers here");
    }

    #[test]
    fn test_with_headers_prepends_mime_version() {
        let message = Message::with_headers(
            vec![("Content-Type".into(), "text/x-clientcaps".into())],
            Vec::new(),
        );

        assert_eq!(message.headers()[0].0, "MIME-Version");
    }
}
