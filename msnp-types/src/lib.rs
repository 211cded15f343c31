//! # Misuse-resistant MSNP types
//!
//! This crate provides the data types of the MSNP12 instant-messaging
//! protocol: validated core primitives such as [`core::Email`] and
//! [`core::Guid`], client-originated [`command::Command`]s, inbound
//! [`response::ServerCommand`]s, and the MIME-ish [`message::Message`]
//! carried by `MSG`.
//!
//! The general idea is that types should be used in such a way that only
//! valid protocol units can be produced: a `CHG` can only carry one of the
//! client-settable presence codes, list memberships are a closed set of
//! five flags, and escaped arguments are stored decoded so the object model
//! never sees percent-escapes.
//!
//! Parsing and serialization of these types is provided by `msnp-codec`.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod command;
pub mod core;
pub mod error;
pub mod list;
pub mod message;
pub mod presence;
pub mod response;
pub mod utils;
