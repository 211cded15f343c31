//! Parsers for the primitive tokens of the MSNP header grammar.
//!
//! Header arguments are space-separated runs of non-whitespace bytes;
//! free-text arguments are percent-escaped. All parsers are streaming:
//! running out of input yields `Incomplete`, never a hard failure.

use std::str::from_utf8;

use msnp_types::{
    core::{Email, Endpoint, Guid, SessionId, Token, TrId},
    presence::{Capabilities, MsnObject, Status},
    utils::unescape,
};
use nom::{
    bytes::streaming::take_while1,
    character::streaming::digit1,
    combinator::{map, map_res},
};

use crate::codec::decode::MsnpResult;

/// Any byte allowed inside a header argument: everything except SP and the
/// line terminator.
pub(crate) fn is_token_char(byte: u8) -> bool {
    byte != b' ' && byte != b'\r' && byte != b'\n'
}

/// `token = 1*<any byte except SP / CR / LF>`, decoded as UTF-8.
pub(crate) fn token(input: &[u8]) -> MsnpResult<&[u8], &str> {
    map_res(take_while1(is_token_char), from_utf8)(input)
}

/// `number = 1*DIGIT`
///
/// Unsigned 32-bit integer.
pub(crate) fn number(input: &[u8]) -> MsnpResult<&[u8], u32> {
    map_res(
        // # Safety
        //
        // `unwrap` is safe because `1*DIGIT` contains ASCII-only characters.
        map(digit1, |val| from_utf8(val).unwrap()),
        str::parse::<u32>,
    )(input)
}

pub(crate) fn trid(input: &[u8]) -> MsnpResult<&[u8], TrId> {
    map(number, TrId)(input)
}

pub(crate) fn email(input: &[u8]) -> MsnpResult<&[u8], Email> {
    map_res(token, Email::try_from)(input)
}

pub(crate) fn guid(input: &[u8]) -> MsnpResult<&[u8], Guid> {
    map_res(token, Guid::try_from)(input)
}

pub(crate) fn session_id(input: &[u8]) -> MsnpResult<&[u8], SessionId> {
    map_res(token, SessionId::try_from)(input)
}

/// An opaque ticket/auth-string token.
pub(crate) fn opaque_token(input: &[u8]) -> MsnpResult<&[u8], Token> {
    map_res(token, Token::try_from)(input)
}

pub(crate) fn status(input: &[u8]) -> MsnpResult<&[u8], Status> {
    map_res(token, str::parse::<Status>)(input)
}

pub(crate) fn capabilities(input: &[u8]) -> MsnpResult<&[u8], Capabilities> {
    map(number, Capabilities)(input)
}

/// `endpoint = host ":" port`
pub(crate) fn endpoint(input: &[u8]) -> MsnpResult<&[u8], Endpoint> {
    map_res(token, str::parse::<Endpoint>)(input)
}

/// A percent-escaped free-text argument, decoded.
pub(crate) fn escaped_text(input: &[u8]) -> MsnpResult<&[u8], String> {
    map(token, |value| unescape(value).into_owned())(input)
}

/// A display-picture object reference (carried escaped, stored verbatim).
pub(crate) fn msn_object(input: &[u8]) -> MsnpResult<&[u8], MsnObject> {
    map_res(token, MsnObject::try_from)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_stops_at_space_and_crlf() {
        let (rest, value) = token(b"MSNP12 CVR0\r\n").unwrap();
        assert_eq!(value, "MSNP12");
        assert_eq!(rest, b" CVR0\r\n");

        let (rest, value) = token(b"CVR0\r\n").unwrap();
        assert_eq!(value, "CVR0");
        assert_eq!(rest, b"\r\n");
    }

    #[test]
    fn test_token_incomplete_at_end_of_input() {
        // Streaming: the token might continue in the next read.
        assert!(matches!(token(b"MSNP12"), Err(nom::Err::Incomplete(_))));
    }

    #[test]
    fn test_number() {
        let (_, value) = number(b"11752013 ").unwrap();
        assert_eq!(value, 11752013);

        assert!(number(b"abc ").is_err());
    }

    #[test]
    fn test_escaped_text_decodes() {
        let (_, value) = escaped_text(b"Example%20Name\r\n").unwrap();
        assert_eq!(value, "Example Name");
    }

    #[test]
    fn test_endpoint() {
        let (_, value) = endpoint(b"207.46.108.38:1863 ").unwrap();
        assert_eq!(value, Endpoint::new("207.46.108.38", 1863));
    }
}
