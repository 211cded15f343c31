//! Client-originated commands.

use crate::{
    core::{ClientInfo, Email, Guid, SessionId, Token, TrId},
    error::{ValidationError, ValidationErrorKind},
    list::List,
    message::{DeliveryClass, Message},
    presence::{Capabilities, MsnObject, Status},
};

/// A client-originated command.
///
/// Invariant: `trid` is `Some` exactly when the command may receive a
/// correlated reply. [`Command::new`] enforces this; the transaction
/// tracker is the normal place where ids get assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Transaction id correlating the server's reply, if any.
    pub trid: Option<TrId>,
    /// The command proper.
    pub body: CommandBody,
}

impl Command {
    pub fn new(trid: Option<TrId>, body: CommandBody) -> Result<Self, ValidationError> {
        if body.needs_trid() != trid.is_some() {
            return Err(ValidationError::new(ValidationErrorKind::Invalid));
        }

        Ok(Self { trid, body })
    }

    /// Get the command name.
    pub fn name(&self) -> &'static str {
        self.body.name()
    }
}

/// The target of an `ADC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdcTarget {
    /// A contact not yet known to the server side of the roster.
    ByEmail {
        email: Email,
        nickname: Option<String>,
    },
    /// An existing contact, addressed by guid (group membership changes).
    ByGuid(Guid),
}

/// The target of a `REM`: FL removals go by guid, the other lists by
/// login name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemTarget {
    Email(Email),
    Guid(Guid),
}

/// `BLP` — what happens to users on neither AL nor BL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacySetting {
    /// `AL`: unknown users may see presence.
    Allow,
    /// `BL`: unknown users are treated as blocked.
    Block,
}

impl PrivacySetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "AL",
            Self::Block => "BL",
        }
    }
}

impl std::str::FromStr for PrivacySetting {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AL" => Ok(Self::Allow),
            "BL" => Ok(Self::Block),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

/// `GTC` — whether additions to the reverse list prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversePrompt {
    /// `A`: ask before they may be added.
    Ask,
    /// `N`: no prompt.
    Silent,
}

impl ReversePrompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ask => "A",
            Self::Silent => "N",
        }
    }
}

impl std::str::FromStr for ReversePrompt {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::Ask),
            "N" => Ok(Self::Silent),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

/// Command body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandBody {
    /// `VER` — protocol version negotiation.
    Ver { dialects: Vec<String> },

    /// `CVR` — client version information.
    Cvr { info: ClientInfo, login: Email },

    /// `USR ... TWN I <login>` — first authentication step on the NS.
    UsrTwnI { login: Email },

    /// `USR ... TWN S <ticket>` — SSO ticket submission.
    UsrTwnS { ticket: Token },

    /// `USR <login> <ticket>` — switchboard join (outbound call side).
    UsrSb { login: Email, ticket: Token },

    /// `QRY` — challenge response. The digest is the payload.
    Qry { product_id: String, digest: String },

    /// `CHG` — set local presence.
    Chg {
        status: Status,
        capabilities: Capabilities,
        object: Option<MsnObject>,
    },

    /// `UUX` — publish personal-status XML (payload-bearing).
    Uux { payload: Vec<u8> },

    /// `PRP` — set a local-user property (`MFN`, `PHH`, ...). The value is
    /// percent-escaped on the wire.
    Prp { property: String, value: String },

    /// `SBP` — set a per-contact property.
    Sbp {
        guid: Guid,
        property: String,
        value: String,
    },

    /// `SYN` — request list synchronization.
    Syn { version1: String, version2: String },

    /// `ADC` — add a contact to a list (or to a group).
    Adc {
        list: List,
        target: AdcTarget,
        group: Option<Guid>,
    },

    /// `REM` — remove a contact from a list (or from a group).
    Rem {
        list: List,
        target: RemTarget,
        group: Option<Guid>,
    },

    /// `ADG` — add a group. The name is percent-escaped on the wire.
    Adg { name: String },

    /// `RMG` — remove a group.
    Rmg { guid: Guid },

    /// `REG` — rename a group.
    Reg { guid: Guid, name: String },

    /// `BLP` — default privacy for unlisted users.
    Blp { setting: PrivacySetting },

    /// `GTC` — reverse-list prompting.
    Gtc { setting: ReversePrompt },

    /// `XFR ... SB` — request a switchboard.
    XfrSb,

    /// `CAL` — invite a user into the switchboard session.
    Cal { login: Email },

    /// `ANS` — answer an invitation on a freshly dialed switchboard.
    Ans {
        login: Email,
        ticket: Token,
        session: SessionId,
    },

    /// `MSG` — send a message (payload-bearing).
    Msg {
        class: DeliveryClass,
        payload: Vec<u8>,
    },

    /// `PNG` — ping; answered by `QNG` without a transaction id.
    Png,

    /// `OUT` — sign off.
    Out,
}

impl CommandBody {
    /// The default `VER` for this library.
    pub fn ver() -> Self {
        Self::Ver {
            dialects: vec!["MSNP12".into(), "CVR0".into()],
        }
    }

    /// `MSG` from a structured message.
    pub fn message(class: DeliveryClass, message: &Message) -> Self {
        Self::Msg {
            class,
            payload: message.render(),
        }
    }

    /// Get the command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ver { .. } => "VER",
            Self::Cvr { .. } => "CVR",
            Self::UsrTwnI { .. } | Self::UsrTwnS { .. } | Self::UsrSb { .. } => "USR",
            Self::Qry { .. } => "QRY",
            Self::Chg { .. } => "CHG",
            Self::Uux { .. } => "UUX",
            Self::Prp { .. } => "PRP",
            Self::Sbp { .. } => "SBP",
            Self::Syn { .. } => "SYN",
            Self::Adc { .. } => "ADC",
            Self::Rem { .. } => "REM",
            Self::Adg { .. } => "ADG",
            Self::Rmg { .. } => "RMG",
            Self::Reg { .. } => "REG",
            Self::Blp { .. } => "BLP",
            Self::Gtc { .. } => "GTC",
            Self::XfrSb => "XFR",
            Self::Cal { .. } => "CAL",
            Self::Ans { .. } => "ANS",
            Self::Msg { .. } => "MSG",
            Self::Png => "PNG",
            Self::Out => "OUT",
        }
    }

    /// Whether this command carries a transaction id on the wire.
    pub fn needs_trid(&self) -> bool {
        !matches!(self, Self::Png | Self::Out)
    }

    /// The payload byte run, for payload-bearing commands.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Qry { digest, .. } => Some(digest.as_bytes()),
            Self::Uux { payload } | Self::Msg { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trid_invariant() {
        assert!(Command::new(Some(TrId(1)), CommandBody::ver()).is_ok());
        assert!(Command::new(None, CommandBody::ver()).is_err());

        assert!(Command::new(None, CommandBody::Png).is_ok());
        assert!(Command::new(Some(TrId(1)), CommandBody::Png).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(CommandBody::ver().name(), "VER");
        assert_eq!(
            CommandBody::UsrTwnI {
                login: Email::try_from("a@b.c").unwrap()
            }
            .name(),
            "USR"
        );
        assert_eq!(CommandBody::XfrSb.name(), "XFR");
    }

    #[test]
    fn test_message_payload() {
        let body = CommandBody::message(DeliveryClass::Acknowledged, &Message::text("Hi!"));

        let payload = body.payload().unwrap();
        assert!(payload.starts_with(b"MIME-Version: 1.0\r\n"));
        assert!(payload.ends_with(b"\r\n\r\nHi!"));
    }
}
