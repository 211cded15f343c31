//! # Codec for the MSNP12 wire protocol
//!
//! MSNP commands are ASCII header lines terminated by CRLF; a handful of
//! commands declare a decimal payload length in the header and the payload
//! bytes follow immediately, without extra framing.
//!
//! This crate provides ...
//!
//! * parsing via [`decode::Decoder`] — implemented by [`CommandCodec`] for
//!   client-originated commands and [`ServerCommandCodec`] for
//!   server-originated ones,
//! * serialization via [`encode::Encoder`] — yielding header-line and
//!   payload [`encode::Fragment`]s so a writer can keep frames contiguous,
//! * ready-made [`tokio_util::codec`] codecs in [`tokio`] (feature
//!   `tokio`, default on) for both the client and the server role.
//!
//! Types are provided by [`msnp_types`] and re-exported for convenience.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod codec;
pub(crate) mod command;
pub(crate) mod core;
pub(crate) mod response;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(feature = "tokio")]
pub mod tokio;

pub use codec::{decode, encode};
// Re-export (dependency of) this library.
pub use msnp_types;

/// Codec for client-originated commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCodec;

/// Codec for server-originated commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerCommandCodec;
