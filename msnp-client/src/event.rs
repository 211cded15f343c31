//! Events surfaced to the caller.
//!
//! Both the client and each IM session expose an unbounded mpsc of typed
//! events; the caller takes the receiver once and drains it. Handlers run
//! on the caller's side — heavy work never blocks the reader tasks.

use msnp_types::{
    core::{Email, SessionId},
    list::List,
    message::Message,
    presence::Status,
};

use crate::switchboard::Invitation;

/// Why the notification session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// `logout()` was called.
    UserInitiated,
    /// `OUT OTH` — this account signed in somewhere else.
    OtherClient,
    /// `OUT SSD` — server shutting down.
    ServerShutdown,
    /// No `QNG` for twice the ping interval.
    PingTimeout,
    /// The transport failed or reached EOF.
    Transport,
    /// The server broke framing beyond recovery.
    Protocol,
}

/// Notification-session events.
#[derive(Debug)]
pub enum ClientEvent {
    /// Login completed; the roster is synchronized and presence is set.
    LoggedIn,

    /// The session ended. Emitted exactly once per login.
    LoggedOut(LogoutReason),

    /// A contact's presence changed (`NLN`/`ILN`/`FLN`). `None` means
    /// offline.
    ContactPresenceChanged {
        login: Email,
        status: Option<Status>,
    },

    /// A contact's display name changed.
    ContactNicknameChanged { login: Email, nickname: String },

    /// A contact's personal status message changed (`UBX`).
    ContactPersonalMessageChanged {
        login: Email,
        personal_message: String,
    },

    /// A contact entered or left one of the five lists.
    ListMembershipChanged {
        login: Email,
        list: List,
        member: bool,
    },

    /// A group appeared, disappeared, or was renamed.
    GroupsChanged,

    /// Someone rang us: accept or reject the invitation.
    InvitedToImSession(Invitation),

    /// An IM session came up, by outbound call or by accepting an
    /// invitation.
    ImSessionCreated {
        remote: Email,
        session_id: Option<SessionId>,
    },

    /// A server notification (`NOT`) or notification-server message
    /// payload (profile, initial e-mail tally).
    NotificationReceived { payload: Vec<u8> },
}

/// Why an IM session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCloseReason {
    /// Every remote participant left.
    Empty,
    /// `close()` was called.
    UserInitiated,
    /// The switchboard connection dropped.
    Transport,
}

/// IM-session events.
#[derive(Debug)]
pub enum SessionEvent {
    /// A participant joined (`JOI`/`IRO`).
    UserJoined { login: Email, nickname: String },

    /// A participant left; `idle` when the switchboard dropped them for
    /// inactivity.
    UserParted { login: Email, idle: bool },

    /// A text message arrived.
    MessageReceived { sender: Email, message: Message },

    /// The remote user is typing.
    TypingNotification { login: Email },

    /// A message with an unhandled content type arrived.
    RawMessageReceived { sender: Email, message: Message },

    /// Terminal; emitted exactly once.
    Closed(SessionCloseReason),
}
