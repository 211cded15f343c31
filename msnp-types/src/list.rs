//! Contact-list membership flags.
//!
//! A contact belongs to any subset of five lists, reported on the wire as a
//! decimal bitmask: FL=1 (forward), AL=2 (allow), BL=4 (block), RL=8
//! (reverse), PL=16 (pending).

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::{ValidationError, ValidationErrorKind};

/// One of the five membership lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum List {
    /// Forward list: the local roster.
    Forward,
    /// Allow list: may see presence and open sessions.
    Allow,
    /// Block list: sees the local user as offline.
    Block,
    /// Reverse list: contacts that have the local user on their roster.
    Reverse,
    /// Pending list: added the local user and await a decision.
    Pending,
}

impl List {
    pub const ALL: [List; 5] = [
        List::Forward,
        List::Allow,
        List::Block,
        List::Reverse,
        List::Pending,
    ];

    pub fn bit(&self) -> u8 {
        match self {
            Self::Forward => 1,
            Self::Allow => 2,
            Self::Block => 4,
            Self::Reverse => 8,
            Self::Pending => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "FL",
            Self::Allow => "AL",
            Self::Block => "BL",
            Self::Reverse => "RL",
            Self::Pending => "PL",
        }
    }
}

impl FromStr for List {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FL" => Ok(Self::Forward),
            "AL" => Ok(Self::Allow),
            "BL" => Ok(Self::Block),
            "RL" => Ok(Self::Reverse),
            "PL" => Ok(Self::Pending),
            _ => Err(ValidationError::new(ValidationErrorKind::Invalid)),
        }
    }
}

impl Display for List {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of list memberships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListSet(u8);

impl ListSet {
    pub const EMPTY: ListSet = ListSet(0);

    pub fn from_bits(bits: u8) -> Self {
        // Out-of-range bits are dropped; the five defined lists are all
        // MSNP12 ever reports.
        Self(bits & 0b1_1111)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, list: List) -> bool {
        self.0 & list.bit() != 0
    }

    pub fn insert(&mut self, list: List) {
        self.0 |= list.bit();
    }

    pub fn remove(&mut self, list: List) {
        self.0 &= !list.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = List> + '_ {
        List::ALL.into_iter().filter(|list| self.contains(*list))
    }
}

impl FromIterator<List> for ListSet {
    fn from_iter<I: IntoIterator<Item = List>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for list in iter {
            set.insert(list);
        }
        set
    }
}

impl Display for ListSet {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
