//! Server-originated commands.
//!
//! One variant per inbound wire shape. Replies carry the transaction id of
//! the request they answer; unsolicited commands (presence, ring-ins,
//! notifications) carry none. 3-digit identifiers are decoded into
//! [`ServerCommand::Error`].

use crate::{
    command::{PrivacySetting, RemTarget, ReversePrompt},
    core::{Email, Endpoint, Guid, SessionId, Token, TrId},
    error::ServerError,
    list::{List, ListSet},
    presence::{Capabilities, MsnObject, Status},
};

/// Why the server terminated the session (`OUT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutReason {
    /// `OTH` — the account logged in elsewhere.
    OtherClient,
    /// `SSD` — server shutting down.
    ServerShutdown,
}

impl OutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OtherClient => "OTH",
            Self::ServerShutdown => "SSD",
        }
    }
}

/// One `LST` line of the synchronization stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LstEntry {
    pub email: Email,
    /// Unescaped friendly name, when the server sent one.
    pub nickname: Option<String>,
    /// Present for FL members.
    pub guid: Option<Guid>,
    pub lists: ListSet,
    /// Group memberships, FL only.
    pub groups: Vec<Guid>,
}

/// A server-originated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    /// `VER <trid> <dialects...>`
    Ver { trid: TrId, dialects: Vec<String> },

    /// `CVR <trid> <recommended versions and download URLs>`
    ///
    /// Carried opaquely; this library never upgrades itself.
    Cvr { trid: TrId, args: Vec<String> },

    /// `USR <trid> TWN S <policy>` — SSO policy string.
    UsrTwnS { trid: TrId, policy: String },

    /// `USR <trid> OK <login> <args...>` — authentication (NS) or join (SB)
    /// accepted. Trailing arguments differ between the two, hence opaque.
    UsrOk {
        trid: TrId,
        login: Email,
        args: Vec<String>,
    },

    /// `XFR <trid> NS <endpoint> 0 <backup>` — redirect to another NS.
    XfrNs {
        trid: TrId,
        endpoint: Endpoint,
        backup: Option<Endpoint>,
    },

    /// `XFR <trid> SB <endpoint> CKI <ticket>` — switchboard granted.
    XfrSb {
        trid: TrId,
        endpoint: Endpoint,
        ticket: Token,
    },

    /// `QRY <trid>` — challenge response accepted.
    QryOk { trid: TrId },

    /// `CHL 0 <challenge>` — answer within the deadline or be dropped.
    Chl { challenge: String },

    /// `CHG <trid> <status> <caps> [<object>]` — status change accepted.
    Chg {
        trid: TrId,
        status: Status,
        capabilities: Capabilities,
        object: Option<MsnObject>,
    },

    /// `ILN <trid> <status> <login> <nick> <caps> [<object>]` — initial
    /// presence, answering `CHG`.
    Iln {
        trid: TrId,
        status: Status,
        login: Email,
        nickname: String,
        capabilities: Capabilities,
        object: Option<MsnObject>,
    },

    /// `NLN <status> <login> <nick> <caps> [<object>]` — presence change.
    Nln {
        status: Status,
        login: Email,
        nickname: String,
        capabilities: Capabilities,
        object: Option<MsnObject>,
    },

    /// `FLN <login>` — contact went offline.
    Fln { login: Email },

    /// `UBX <login> <len>` + payload — personal-status XML.
    Ubx { login: Email, payload: Vec<u8> },

    /// `UUX <trid> 0` — personal-status publication accepted.
    UuxOk { trid: TrId },

    /// `PRP [<trid>] <property> <value>` — local-user property (reply, or
    /// one line of the synchronization stream).
    Prp {
        trid: Option<TrId>,
        property: String,
        value: String,
    },

    /// `SBP <trid> <guid> <property> <value>` — contact property accepted.
    Sbp {
        trid: Option<TrId>,
        guid: Guid,
        property: String,
        value: String,
    },

    /// `BPR <property> <value>` — property of the most recent `LST` contact.
    Bpr { property: String, value: String },

    /// `SYN <trid> <v1> <v2> <contacts> <groups>` — synchronization header.
    Syn {
        trid: TrId,
        version1: String,
        version2: String,
        contact_count: u32,
        group_count: u32,
    },

    /// `GTC [<trid>] <A|N>`
    Gtc {
        trid: Option<TrId>,
        setting: ReversePrompt,
    },

    /// `BLP [<trid>] <AL|BL>`
    Blp {
        trid: Option<TrId>,
        setting: PrivacySetting,
    },

    /// `LSG <name> <guid>` — one group of the synchronization stream.
    Lsg { name: String, guid: Guid },

    /// `LST ...` — one contact of the synchronization stream.
    Lst(LstEntry),

    /// `ADC <trid> <list> ...` — contact added (reply, or unsolicited with
    /// a placeholder id when someone adds the local user).
    Adc {
        trid: TrId,
        list: List,
        email: Option<Email>,
        nickname: Option<String>,
        guid: Option<Guid>,
        group: Option<Guid>,
    },

    /// `REM <trid> <list> <target> [<group>]` — contact removed.
    Rem {
        trid: TrId,
        list: List,
        target: RemTarget,
        group: Option<Guid>,
    },

    /// `ADG <trid> <name> <guid>` — group added.
    Adg {
        trid: TrId,
        name: String,
        guid: Guid,
    },

    /// `RMG <trid> <guid>` — group removed.
    Rmg { trid: TrId, guid: Guid },

    /// `REG <trid> <guid> <name>` — group renamed.
    Reg {
        trid: TrId,
        guid: Guid,
        name: String,
    },

    /// `MSG <sender> <nick> <len>` + payload.
    Msg {
        sender: Email,
        nickname: String,
        payload: Vec<u8>,
    },

    /// `RNG <session> <endpoint> CKI <ticket> <login> <nick>` — inbound
    /// invitation.
    Rng {
        session: SessionId,
        endpoint: Endpoint,
        ticket: Token,
        login: Email,
        nickname: String,
    },

    /// `CAL <trid> RINGING <session>` — the invitation went out.
    CalRinging { trid: TrId, session: SessionId },

    /// `ANS <trid> OK` — answered; the `IRO` burst is complete.
    AnsOk { trid: TrId },

    /// `JOI <login> <nick> [<caps>]` — a user joined the switchboard.
    Joi {
        login: Email,
        nickname: String,
        capabilities: Option<Capabilities>,
    },

    /// `IRO <trid> <index> <total> <login> <nick> [<caps>]` — roster
    /// enumeration while answering.
    Iro {
        trid: TrId,
        index: u32,
        total: u32,
        login: Email,
        nickname: String,
        capabilities: Option<Capabilities>,
    },

    /// `BYE <login> [1]` — a user left (`1` = dropped for inactivity).
    Bye { login: Email, idle: bool },

    /// `ACK <trid>` — acknowledged delivery of a class-A `MSG`.
    Ack { trid: TrId },

    /// `NAK <trid>` — delivery failed.
    Nak { trid: TrId },

    /// `QNG <seconds>` — pong, with the delay before the next `PNG`.
    Qng { until_next: u32 },

    /// `NOT <len>` + payload — server notification XML.
    Not { payload: Vec<u8> },

    /// `OUT [<reason>]` — the server ended the session.
    Out { reason: Option<OutReason> },

    /// `SBS <args...>` — partially documented; preserved and otherwise
    /// ignored.
    Sbs { args: Vec<String> },

    /// A 3-digit error answering the request with this transaction id.
    Error { trid: TrId, code: ServerError },
}

impl ServerCommand {
    /// The three-letter identifier, or `"ERR"` for numeric error commands.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ver { .. } => "VER",
            Self::Cvr { .. } => "CVR",
            Self::UsrTwnS { .. } | Self::UsrOk { .. } => "USR",
            Self::XfrNs { .. } | Self::XfrSb { .. } => "XFR",
            Self::QryOk { .. } => "QRY",
            Self::Chl { .. } => "CHL",
            Self::Chg { .. } => "CHG",
            Self::Iln { .. } => "ILN",
            Self::Nln { .. } => "NLN",
            Self::Fln { .. } => "FLN",
            Self::Ubx { .. } => "UBX",
            Self::UuxOk { .. } => "UUX",
            Self::Prp { .. } => "PRP",
            Self::Sbp { .. } => "SBP",
            Self::Bpr { .. } => "BPR",
            Self::Syn { .. } => "SYN",
            Self::Gtc { .. } => "GTC",
            Self::Blp { .. } => "BLP",
            Self::Lsg { .. } => "LSG",
            Self::Lst(_) => "LST",
            Self::Adc { .. } => "ADC",
            Self::Rem { .. } => "REM",
            Self::Adg { .. } => "ADG",
            Self::Rmg { .. } => "RMG",
            Self::Reg { .. } => "REG",
            Self::Msg { .. } => "MSG",
            Self::Rng { .. } => "RNG",
            Self::CalRinging { .. } => "CAL",
            Self::AnsOk { .. } => "ANS",
            Self::Joi { .. } => "JOI",
            Self::Iro { .. } => "IRO",
            Self::Bye { .. } => "BYE",
            Self::Ack { .. } => "ACK",
            Self::Nak { .. } => "NAK",
            Self::Qng { .. } => "QNG",
            Self::Not { .. } => "NOT",
            Self::Out { .. } => "OUT",
            Self::Sbs { .. } => "SBS",
            Self::Error { .. } => "ERR",
        }
    }

    /// The transaction id, for commands that answer a request.
    pub fn trid(&self) -> Option<TrId> {
        match self {
            Self::Ver { trid, .. }
            | Self::Cvr { trid, .. }
            | Self::UsrTwnS { trid, .. }
            | Self::UsrOk { trid, .. }
            | Self::XfrNs { trid, .. }
            | Self::XfrSb { trid, .. }
            | Self::QryOk { trid }
            | Self::Chg { trid, .. }
            | Self::Iln { trid, .. }
            | Self::UuxOk { trid }
            | Self::Syn { trid, .. }
            | Self::Adc { trid, .. }
            | Self::Rem { trid, .. }
            | Self::Adg { trid, .. }
            | Self::Rmg { trid, .. }
            | Self::Reg { trid, .. }
            | Self::CalRinging { trid, .. }
            | Self::AnsOk { trid }
            | Self::Iro { trid, .. }
            | Self::Ack { trid }
            | Self::Nak { trid }
            | Self::Error { trid, .. } => Some(*trid),
            Self::Prp { trid, .. } | Self::Sbp { trid, .. } | Self::Gtc { trid, .. }
            | Self::Blp { trid, .. } => *trid,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trid_extraction() {
        let reply = ServerCommand::QryOk { trid: TrId(7) };
        assert_eq!(reply.trid(), Some(TrId(7)));

        let unsolicited = ServerCommand::Fln {
            login: Email::try_from("a@b.c").unwrap(),
        };
        assert_eq!(unsolicited.trid(), None);

        let sync_line = ServerCommand::Prp {
            trid: None,
            property: "MFN".into(),
            value: "Nick".into(),
        };
        assert_eq!(sync_line.trid(), None);
    }

    #[test]
    fn test_error_identification() {
        let error = ServerCommand::Error {
            trid: TrId(4),
            code: ServerError::AuthenticationFailed,
        };

        assert!(error.is_error());
        assert_eq!(error.trid(), Some(TrId(4)));
    }
}
