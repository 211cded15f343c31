//! [`tokio_util::codec`] support.
//!
//! Frames a byte stream into commands: a CRLF-terminated header line,
//! followed — when the header declares a decimal length — by exactly that
//! many payload bytes. Both roles are provided: [`MsnpClientCodec`]
//! decodes server-originated commands and encodes client-originated ones;
//! [`MsnpServerCodec`] is its mirror image for scripted test servers.
//!
//! A malformed or unknown header line is consumed and surfaced as
//! [`MsnpCodecError::ParsingFailed`]; decoding resumes on the next line,
//! so one bad command never poisons the stream.

use std::io::Error as IoError;

use bytes::{Buf, BytesMut};
use msnp_types::{command::Command, response::ServerCommand};
use thiserror::Error;
use tokio_util::codec::{Decoder as TokioDecoder, Encoder as TokioEncoder};

use crate::{
    codec::{decode::Decoder, encode::Encoder},
    CommandCodec, ServerCommandCodec,
};

/// Payloads beyond this many bytes indicate a broken peer.
const DEFAULT_MAX_PAYLOAD_LENGTH: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramingState {
    ReadLine { to_consume_acc: usize },
    ReadPayload { line: usize, needed: usize },
}

#[derive(Debug, Error)]
pub enum MsnpCodecError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("Payload of {needed} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { needed: usize, limit: usize },
    #[error("Parsing failed")]
    ParsingFailed,
}

impl PartialEq for MsnpCodecError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Io(error1), Self::Io(error2)) => error1.kind() == error2.kind(),
            (
                Self::PayloadTooLarge { needed: n1, limit: l1 },
                Self::PayloadTooLarge { needed: n2, limit: l2 },
            ) => n1 == n2 && l1 == l2,
            (Self::ParsingFailed, Self::ParsingFailed) => true,
            _ => false,
        }
    }
}

/// Find `\r\n`, starting the scan at `skip` (bytes already scanned in a
/// previous call). Returns the line length including the terminator.
///
/// A `\r` at the end of the buffer is not yet a terminator; a `\r`
/// followed by any other byte resumes scanning.
fn find_crlf_inclusive(skip: usize, buf: &BytesMut) -> Option<usize> {
    buf[skip..]
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|position| skip + position + 2)
}

/// How many payload bytes the (complete) header line declares.
///
/// `role_payload_len` knows, per identifier, which header token is the
/// length. A malformed length yields 0 — the command parser will reject
/// the line and the decoder skips it.
fn declared_payload_len(line: &[u8], len_token_index: impl Fn(&str) -> Option<usize>) -> usize {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(_) => return 0,
    };
    let tokens: Vec<&str> = line.split(' ').collect();

    let Some(index) = tokens.first().and_then(|name| len_token_index(name)) else {
        return 0;
    };

    tokens
        .get(index)
        .and_then(|token| token.trim_end().parse::<usize>().ok())
        .unwrap_or(0)
}

/// Which header token declares the payload length, for commands a client
/// receives.
fn server_payload_index(name: &str) -> Option<usize> {
    match name {
        // MSG <sender> <nick> <len>
        "MSG" => Some(3),
        // UBX <login> <len> / UUX <trid> <len>
        "UBX" | "UUX" => Some(2),
        // NOT <len>
        "NOT" => Some(1),
        _ => None,
    }
}

/// Which header token declares the payload length, for commands a server
/// receives.
fn client_payload_index(name: &str) -> Option<usize> {
    match name {
        // MSG <trid> <class> <len> / QRY <trid> <product-id> <len>
        "MSG" | "QRY" => Some(3),
        // UUX <trid> <len>
        "UUX" => Some(2),
        _ => None,
    }
}

macro_rules! impl_framed_decode {
    ($self:ident, $src:ident, $codec:expr, $payload_index:expr) => {{
        loop {
            match $self.state {
                FramingState::ReadLine {
                    ref mut to_consume_acc,
                } => match find_crlf_inclusive(*to_consume_acc, $src) {
                    Some(line) => {
                        let needed = declared_payload_len(&$src[..line], $payload_index);

                        if needed > $self.max_payload_length {
                            $src.advance(line);
                            $self.state = FramingState::ReadLine { to_consume_acc: 0 };

                            return Err(MsnpCodecError::PayloadTooLarge {
                                needed,
                                limit: $self.max_payload_length,
                            });
                        }

                        $src.reserve(needed);
                        $self.state = FramingState::ReadPayload { line, needed };
                    }
                    None => {
                        // Resume the scan where it stopped; a trailing `\r`
                        // is rescanned once its `\n` may have arrived.
                        $self.state = FramingState::ReadLine {
                            to_consume_acc: $src.len().saturating_sub(1),
                        };

                        return Ok(None);
                    }
                },
                FramingState::ReadPayload { line, needed } => {
                    let total = line + needed;

                    if $src.len() < total {
                        return Ok(None);
                    }

                    let result = $codec.decode(&$src[..total]);
                    $self.state = FramingState::ReadLine { to_consume_acc: 0 };

                    match result {
                        Ok((remaining, command)) => {
                            debug_assert!(remaining.is_empty());
                            $src.advance(total);

                            return Ok(Some(command));
                        }
                        Err(error) => {
                            // Both `Failed` and a (theoretically
                            // impossible) `Incomplete` on a complete frame:
                            // drop the frame, resume on the next line.
                            log::warn!("skipping undecodable command: {error:?}");
                            $src.advance(total);

                            return Err(MsnpCodecError::ParsingFailed);
                        }
                    }
                }
            }
        }
    }};
}

/// Client-role codec: decodes [`ServerCommand`]s, encodes [`Command`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsnpClientCodec {
    state: FramingState,
    max_payload_length: usize,
}

impl MsnpClientCodec {
    pub fn new() -> Self {
        Self {
            state: FramingState::ReadLine { to_consume_acc: 0 },
            max_payload_length: DEFAULT_MAX_PAYLOAD_LENGTH,
        }
    }

    pub fn with_max_payload_length(max_payload_length: usize) -> Self {
        Self {
            max_payload_length,
            ..Self::new()
        }
    }
}

impl Default for MsnpClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioDecoder for MsnpClientCodec {
    type Item = ServerCommand;
    type Error = MsnpCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        impl_framed_decode!(self, src, ServerCommandCodec, server_payload_index)
    }
}

impl TokioEncoder<&Command> for MsnpClientCodec {
    type Error = MsnpCodecError;

    fn encode(&mut self, item: &Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&CommandCodec.encode(item).dump());

        Ok(())
    }
}

// By-value flavor, for sinks that own their items (`Framed::split`).
impl TokioEncoder<Command> for MsnpClientCodec {
    type Error = MsnpCodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        TokioEncoder::encode(self, &item, dst)
    }
}

/// Server-role codec: decodes [`Command`]s, encodes [`ServerCommand`]s.
///
/// The library itself never runs a server; this is the codec scripted
/// test servers are built on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsnpServerCodec {
    state: FramingState,
    max_payload_length: usize,
}

impl MsnpServerCodec {
    pub fn new() -> Self {
        Self {
            state: FramingState::ReadLine { to_consume_acc: 0 },
            max_payload_length: DEFAULT_MAX_PAYLOAD_LENGTH,
        }
    }
}

impl Default for MsnpServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioDecoder for MsnpServerCodec {
    type Item = Command;
    type Error = MsnpCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        impl_framed_decode!(self, src, CommandCodec, client_payload_index)
    }
}

impl TokioEncoder<&ServerCommand> for MsnpServerCodec {
    type Error = MsnpCodecError;

    fn encode(&mut self, item: &ServerCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&ServerCommandCodec.encode(item).dump());

        Ok(())
    }
}

impl TokioEncoder<ServerCommand> for MsnpServerCodec {
    type Error = MsnpCodecError;

    fn encode(&mut self, item: ServerCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        TokioEncoder::encode(self, &item, dst)
    }
}
