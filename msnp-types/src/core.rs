//! Core data types.
//!
//! The "string types" of MSNP: every header argument on the wire is a
//! space-free token, and the types here enforce exactly that, so a
//! constructed command can always be serialized without corrupting the
//! framing.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::{ValidationError, ValidationErrorKind};

/// A transaction id.
///
/// A process-local monotonically increasing 32-bit counter shared across a
/// single notification session. `0` is reserved for server-initiated
/// commands that carry a placeholder id (e.g. `CHL 0 ...`, `ADC 0 RL ...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrId(pub u32);

impl Display for TrId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(TrId)
    }
}

impl From<u32> for TrId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A login name (Passport address).
///
/// The stable identifier of a user on the wire: `local@domain`. MSNP never
/// escapes login names, so the validation here rejects anything that could
/// break header framing (whitespace, control bytes) as well as anything
/// that is not `local@domain` shaped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    pub fn verify(value: impl AsRef<str>) -> Result<(), ValidationError> {
        let value = value.as_ref();

        if value.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        if let Some(at) = value
            .bytes()
            .position(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(ValidationError::new(ValidationErrorKind::InvalidByteAt {
                byte: value.as_bytes()[at],
                at,
            }));
        }

        match value.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Email {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Email {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(&value)?;

        Ok(Self(value))
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A contact or group GUID.
///
/// The stable identifier for group membership and removal, in the usual
/// `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form. Stored as received (the
/// server is case-insensitive about the hex digits).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid(String);

impl Guid {
    const GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

    pub fn verify(value: impl AsRef<str>) -> Result<(), ValidationError> {
        let value = value.as_ref();
        let groups: Vec<&str> = value.split('-').collect();

        if groups.len() != Self::GROUP_LENGTHS.len() {
            return Err(ValidationError::new(ValidationErrorKind::Invalid));
        }

        for (group, expected) in groups.iter().zip(Self::GROUP_LENGTHS) {
            if group.len() != expected || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ValidationError::new(ValidationErrorKind::Invalid));
            }
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Guid {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Guid {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(&value)?;

        Ok(Self(value))
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A switchboard session id.
///
/// Opaque: delivered by `RNG`/`CAL ... RINGING` and echoed back in `ANS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn verify(value: impl AsRef<str>) -> Result<(), ValidationError> {
        let value = value.as_ref();

        if value.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        if let Some(at) = value
            .bytes()
            .position(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(ValidationError::new(ValidationErrorKind::InvalidByteAt {
                byte: value.as_bytes()[at],
                at,
            }));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SessionId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for SessionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(&value)?;

        Ok(Self(value))
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A free-form token (no whitespace, no control bytes).
///
/// Used for arguments that are opaque to us but must not break framing:
/// SSO tickets, switchboard auth strings, challenge strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn verify(value: impl AsRef<str>) -> Result<(), ValidationError> {
        let value = value.as_ref();

        if value.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        if let Some(at) = value
            .bytes()
            .position(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(ValidationError::new(ValidationErrorKind::InvalidByteAt {
                byte: value.as_bytes()[at],
                at,
            }));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Token {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::verify(value)?;

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Token {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::verify(&value)?;

        Ok(Self(value))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `host:port` pair as carried by `XFR` and `RNG`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for Endpoint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .split_once(':')
            .ok_or_else(|| ValidationError::new(ValidationErrorKind::Invalid))?;

        if host.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| ValidationError::new(ValidationErrorKind::Invalid))?;

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Client self-identification submitted in `CVR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Locale id, e.g. `0x0409`.
    pub locale_id: String,
    /// Operating system type, e.g. `winnt`.
    pub os_type: String,
    /// Operating system version, e.g. `5.1`.
    pub os_version: String,
    /// Architecture, e.g. `i386`.
    pub arch: String,
    /// Client name, e.g. `MSNMSGR`.
    pub client_name: String,
    /// Client version, e.g. `8.0.0792`.
    pub client_version: String,
    /// Client id token, e.g. `msmsgs`.
    pub client_id: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            locale_id: "0x0409".into(),
            os_type: "winnt".into(),
            os_version: "5.1".into(),
            arch: "i386".into(),
            client_name: "MSNMSGR".into(),
            client_version: "8.0.0792".into(),
            client_id: "msmsgs".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_verify() {
        assert!(Email::verify("a@b.c").is_ok());
        assert!(Email::verify("example@passport.com").is_ok());

        assert!(Email::verify("").is_err());
        assert!(Email::verify("no-at-sign").is_err());
        assert!(Email::verify("@domain").is_err());
        assert!(Email::verify("local@").is_err());
        assert!(Email::verify("a b@c.d").is_err());
        assert!(Email::verify("a@b.c\r\n").is_err());
    }

    #[test]
    fn test_guid_verify() {
        assert!(Guid::verify("d57283f5-b92a-4e7e-88cb-d0327f534a50").is_ok());
        assert!(Guid::verify("D57283F5-B92A-4E7E-88CB-D0327F534A50").is_ok());

        assert!(Guid::verify("").is_err());
        assert!(Guid::verify("d57283f5").is_err());
        assert!(Guid::verify("d57283f5-b92a-4e7e-88cb-d0327f534a5").is_err());
        assert!(Guid::verify("g57283f5-b92a-4e7e-88cb-d0327f534a50").is_err());
    }

    #[test]
    fn test_token_rejects_whitespace() {
        assert!(Token::verify("849102291.520491113").is_ok());
        assert!(Token::verify("t=abc&p=def").is_ok());

        assert!(Token::verify("has space").is_err());
        assert!(Token::verify("").is_err());
    }

    #[test]
    fn test_endpoint_parse() {
        let endpoint = "207.46.108.38:1863".parse::<Endpoint>().unwrap();
        assert_eq!(endpoint, Endpoint::new("207.46.108.38", 1863));
        assert_eq!(endpoint.to_string(), "207.46.108.38:1863");

        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":1863".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_trid_display_parse() {
        assert_eq!(TrId(42).to_string(), "42");
        assert_eq!("42".parse::<TrId>().unwrap(), TrId(42));
        assert!("abc".parse::<TrId>().is_err());
    }
}
