//! # Decoding of commands.
//!
//! Decoders parse one complete command (header line plus payload, when the
//! header declares one) from the head of the input and return the
//! remainder. `Incomplete` means more bytes are needed — header arguments
//! and payloads are parsed with streaming combinators, so a partially
//! received frame is never misparsed.

use std::{num::ParseIntError, str::Utf8Error};

use msnp_types::{command::Command, error::ValidationError, response::ServerCommand};
use nom::error::{ErrorKind, FromExternalError, ParseError};

use crate::{command::command, response::server_command, CommandCodec, ServerCommandCodec};

/// An extended version of [`nom::IResult`].
pub(crate) type MsnpResult<I, O> = Result<(I, O), nom::Err<MsnpParseError<I>>>;

/// An extended version of [`nom::error::Error`].
#[derive(Debug)]
pub(crate) struct MsnpParseError<I> {
    #[allow(unused)]
    pub input: I,
    pub kind: MsnpErrorKind,
}

/// An extended version of [`nom::error::ErrorKind`].
#[derive(Debug)]
pub(crate) enum MsnpErrorKind {
    BadNumber,
    BadUtf8,
    BadValue,
    UnknownCommand,
    Nom(ErrorKind),
}

impl<I> ParseError<I> for MsnpParseError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self {
            input,
            kind: MsnpErrorKind::Nom(kind),
        }
    }

    fn append(input: I, kind: ErrorKind, _: Self) -> Self {
        Self {
            input,
            kind: MsnpErrorKind::Nom(kind),
        }
    }
}

impl<I> FromExternalError<I, ParseIntError> for MsnpParseError<I> {
    fn from_external_error(input: I, _: ErrorKind, _: ParseIntError) -> Self {
        Self {
            input,
            kind: MsnpErrorKind::BadNumber,
        }
    }
}

impl<I> FromExternalError<I, Utf8Error> for MsnpParseError<I> {
    fn from_external_error(input: I, _: ErrorKind, _: Utf8Error) -> Self {
        Self {
            input,
            kind: MsnpErrorKind::BadUtf8,
        }
    }
}

impl<I> FromExternalError<I, ValidationError> for MsnpParseError<I> {
    fn from_external_error(input: I, _: ErrorKind, _: ValidationError) -> Self {
        Self {
            input,
            kind: MsnpErrorKind::BadValue,
        }
    }
}

/// Decoder.
///
/// Implemented for types that know how to decode a specific direction of
/// the protocol. See [implementors](trait.Decoder.html#implementors).
pub trait Decoder {
    type Message: Sized;
    type Error;

    fn decode<'a>(&self, input: &'a [u8]) -> Result<(&'a [u8], Self::Message), Self::Error>;
}

/// Error during decoding of a client-originated command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommandDecodeError {
    /// More data is needed.
    Incomplete,

    /// Decoding failed.
    Failed,
}

/// Error during decoding of a server-originated command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerCommandDecodeError {
    /// More data is needed.
    Incomplete,

    /// Decoding failed.
    Failed,
}

impl Decoder for CommandCodec {
    type Message = Command;
    type Error = CommandDecodeError;

    fn decode<'a>(&self, input: &'a [u8]) -> Result<(&'a [u8], Command), CommandDecodeError> {
        match command(input) {
            Ok((remaining, command)) => Ok((remaining, command)),
            Err(nom::Err::Incomplete(_)) => Err(CommandDecodeError::Incomplete),
            Err(nom::Err::Error(_) | nom::Err::Failure(_)) => Err(CommandDecodeError::Failed),
        }
    }
}

impl Decoder for ServerCommandCodec {
    type Message = ServerCommand;
    type Error = ServerCommandDecodeError;

    fn decode<'a>(
        &self,
        input: &'a [u8],
    ) -> Result<(&'a [u8], ServerCommand), ServerCommandDecodeError> {
        match server_command(input) {
            Ok((remaining, command)) => Ok((remaining, command)),
            Err(nom::Err::Incomplete(_)) => Err(ServerCommandDecodeError::Incomplete),
            Err(nom::Err::Error(_) | nom::Err::Failure(_)) => Err(ServerCommandDecodeError::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use msnp_types::response::ServerCommand;

    use super::*;

    #[test]
    fn test_server_command_incomplete_failed() {
        let tests = [
            // Incomplete
            (b"Q".as_ref(), Err(ServerCommandDecodeError::Incomplete)),
            (b"QNG".as_ref(), Err(ServerCommandDecodeError::Incomplete)),
            (b"QNG ".as_ref(), Err(ServerCommandDecodeError::Incomplete)),
            (b"QNG 50".as_ref(), Err(ServerCommandDecodeError::Incomplete)),
            (b"QNG 50\r".as_ref(), Err(ServerCommandDecodeError::Incomplete)),
            // Incomplete (payload declared, bytes missing)
            (
                b"MSG a@b.c Nick 10\r\n12345".as_ref(),
                Err(ServerCommandDecodeError::Incomplete),
            ),
            // Failed
            (b"ZZZ 1 2\r\n".as_ref(), Err(ServerCommandDecodeError::Failed)),
            (b"QNG abc\r\n".as_ref(), Err(ServerCommandDecodeError::Failed)),
        ];

        for (test, expected) in tests {
            let got = ServerCommandCodec.decode(test).map(|(_, command)| command);
            assert_eq!(expected, got, "input: {:?}", std::str::from_utf8(test));
        }
    }

    #[test]
    fn test_server_command_remainder() {
        let (remaining, command) = ServerCommandCodec.decode(b"QNG 50\r\nNLN ...").unwrap();

        assert_eq!(command, ServerCommand::Qng { until_next: 50 });
        assert_eq!(remaining, b"NLN ...");
    }
}
