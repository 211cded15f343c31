//! # (De)serialization of commands.
//!
//! All commands implement the [`encode::Encoder`]/[`decode::Decoder`] pair
//! through [`CommandCodec`](crate::CommandCodec) (client-originated) and
//! [`ServerCommandCodec`](crate::ServerCommandCodec) (server-originated).
//!
//! ## Example
//!
//! ```
//! use msnp_codec::{
//!     decode::Decoder, encode::Encoder, msnp_types::response::ServerCommand, ServerCommandCodec,
//! };
//!
//! let (remaining, command) =
//!     ServerCommandCodec::default().decode(b"QNG 50\r\n<remaining>").unwrap();
//!
//! assert_eq!(command, ServerCommand::Qng { until_next: 50 });
//! assert_eq!(remaining, &b"<remaining>"[..]);
//!
//! let out = ServerCommandCodec::default().encode(&command).dump();
//! assert_eq!(out, b"QNG 50\r\n");
//! ```

pub mod decode;
pub mod encode;
