//! Presence status and client capabilities.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::{ValidationError, ValidationErrorKind};

/// A client-settable presence status.
///
/// `FLN` (offline) is deliberately absent: the server reports it via the
/// `FLN` command, and the object model represents it as the absence of a
/// status. A client goes offline by logging out, not by `CHG FLN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Online (`NLN`).
    Online,
    /// Busy (`BSY`).
    Busy,
    /// Idle (`IDL`).
    Idle,
    /// Be right back (`BRB`).
    BeRightBack,
    /// Away (`AWY`).
    Away,
    /// On the phone (`PHN`).
    OnThePhone,
    /// Out to lunch (`LUN`).
    OutToLunch,
    /// Hidden (`HDN`) — appears offline to everyone else.
    Hidden,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "NLN",
            Self::Busy => "BSY",
            Self::Idle => "IDL",
            Self::BeRightBack => "BRB",
            Self::Away => "AWY",
            Self::OnThePhone => "PHN",
            Self::OutToLunch => "LUN",
            Self::Hidden => "HDN",
        }
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NLN" => Ok(Self::Online),
            "BSY" => Ok(Self::Busy),
            "IDL" => Ok(Self::Idle),
            "BRB" => Ok(Self::BeRightBack),
            "AWY" => Ok(Self::Away),
            "PHN" => Ok(Self::OnThePhone),
            "LUN" => Ok(Self::OutToLunch),
            "HDN" => Ok(Self::Hidden),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client capabilities bitmask carried by `CHG`/`NLN`/`ILN`/`JOI`.
///
/// Transparent: the individual bits advertise features (ink, webcam, P2P
/// flavors) that this library does not interpret, so the mask is carried
/// verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(pub u32);

impl Display for Capabilities {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Capabilities {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Capabilities)
    }
}

/// A display-picture (or other shareable object) reference.
///
/// The percent-escaped `<msnobj .../>` XML string, carried verbatim. The
/// object model treats it as an opaque blob reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MsnObject(String);

impl MsnObject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for MsnObject {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for MsnObject {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(ValidationError::new(ValidationErrorKind::Empty));
        }

        Ok(Self(value))
    }
}

impl Display for MsnObject {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for code in ["NLN", "BSY", "IDL", "BRB", "AWY", "PHN", "LUN", "HDN"] {
            assert_eq!(code.parse::<Status>().unwrap().as_str(), code);
        }
    }

    #[test]
    fn test_status_rejects_offline_and_unknown() {
        assert!("FLN".parse::<Status>().is_err());
        assert!("XYZ".parse::<Status>().is_err());
        assert!("nln".parse::<Status>().is_err());
    }
}
