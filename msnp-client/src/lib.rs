//! # MSNP12 instant-messaging client
//!
//! Logs a user into a notification server, maintains presence and contact
//! state, and brokers multi-party IM sessions (switchboards) over separate
//! TCP connections.
//!
//! ```no_run
//! use msnp_client::{Client, ClientEvent};
//! use msnp_types::core::Email;
//!
//! # async fn run() -> msnp_client::Result<()> {
//! let client = Client::new(Email::try_from("someone@example.com").unwrap());
//! let mut events = client.events().unwrap();
//!
//! client.login("password").await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::InvitedToImSession(invitation) => {
//!             let session = client.accept_invitation(invitation).await?;
//!             session.send_message(&msnp_types::message::Message::text("hello")).await?;
//!         }
//!         ClientEvent::LoggedOut(reason) => {
//!             println!("logged out: {reason:?}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The wire protocol lives in [`msnp_codec`]; the data model in
//! [`msnp_types`]. Both are re-exported.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod auth;
mod challenge;
mod client;
mod connection;
pub mod error;
pub mod event;
mod notification;
pub mod roster;
pub mod switchboard;
mod tracker;
pub mod transport;

pub use client::Client;
pub use error::{Error, Result};
pub use event::{ClientEvent, LogoutReason, SessionCloseReason, SessionEvent};
pub use notification::{ClientConfig, Credentials};
pub use switchboard::{ImSession, Invitation, Participant};

// Re-exports of the sibling crates for convenience.
pub use msnp_codec;
pub use msnp_types;
