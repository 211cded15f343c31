//! The local user, contacts, and groups.
//!
//! These tables are shared between the reader task (synchronization
//! stream, presence updates) and caller operations. Reads hand out
//! snapshots; every mutation — reader task included — takes the write
//! lock. Critical sections are pure state mutation, no I/O and no awaits.

use std::collections::HashMap;

use msnp_types::{
    command::{PrivacySetting, ReversePrompt},
    core::{Email, Guid},
    list::{List, ListSet},
    presence::{Capabilities, MsnObject, Status},
    response::LstEntry,
};

/// The authenticated user.
#[derive(Debug, Clone)]
pub struct LocalUser {
    pub login: Email,
    pub nickname: String,
    /// `None` until the first `CHG` completes.
    pub status: Option<Status>,
    pub capabilities: Capabilities,
    pub personal_message: String,
    pub display_picture: Option<MsnObject>,
    /// `PRP` properties other than the nickname (phone numbers etc.).
    pub properties: HashMap<String, String>,
}

impl LocalUser {
    pub(crate) fn new(login: Email) -> Self {
        let nickname = login.as_str().to_owned();

        Self {
            login,
            nickname,
            status: None,
            capabilities: Capabilities::default(),
            personal_message: String::new(),
            display_picture: None,
            properties: HashMap::new(),
        }
    }
}

/// A remote user.
///
/// Invariant: the contact is in the local roster iff the FL bit is set;
/// AL and BL are mutually exclusive.
#[derive(Debug, Clone)]
pub struct Contact {
    pub login: Email,
    /// Stable identifier for group membership and removal; absent until
    /// the contact is on FL.
    pub guid: Option<Guid>,
    pub nickname: String,
    /// `None` means offline.
    pub status: Option<Status>,
    pub capabilities: Capabilities,
    pub display_picture: Option<MsnObject>,
    pub lists: ListSet,
    pub groups: Vec<Guid>,
    pub personal_message: String,
    /// `BPR`/`SBP` properties (phone numbers etc.).
    pub properties: HashMap<String, String>,
}

impl Contact {
    pub(crate) fn new(login: Email) -> Self {
        let nickname = login.as_str().to_owned();

        Self {
            login,
            guid: None,
            nickname,
            status: None,
            capabilities: Capabilities::default(),
            display_picture: None,
            lists: ListSet::EMPTY,
            groups: Vec::new(),
            personal_message: String::new(),
            properties: HashMap::new(),
        }
    }

    pub fn is_on(&self, list: List) -> bool {
        self.lists.contains(list)
    }

    pub fn is_blocked(&self) -> bool {
        self.is_on(List::Block)
    }
}

/// A contact group: a name, a guid, and member contacts by reference.
#[derive(Debug, Clone)]
pub struct Group {
    pub guid: Guid,
    pub name: String,
}

/// The roster tables plus account-level settings.
#[derive(Debug)]
pub(crate) struct Roster {
    pub contacts: HashMap<Email, Contact>,
    pub groups: HashMap<Guid, Group>,
    pub privacy: PrivacySetting,
    pub reverse_prompt: ReversePrompt,
    /// The contact the next `BPR` line of the sync stream applies to.
    pub last_synced: Option<Email>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            contacts: HashMap::new(),
            groups: HashMap::new(),
            privacy: PrivacySetting::Allow,
            reverse_prompt: ReversePrompt::Ask,
            last_synced: None,
        }
    }

    pub fn contact_mut(&mut self, login: &Email) -> &mut Contact {
        self.contacts
            .entry(login.clone())
            .or_insert_with(|| Contact::new(login.clone()))
    }

    /// Apply one `LST` line of the synchronization stream.
    pub fn apply_sync_entry(&mut self, entry: LstEntry) {
        let contact = self.contact_mut(&entry.email);

        contact.lists = entry.lists;
        contact.groups = entry.groups;
        if let Some(nickname) = entry.nickname {
            contact.nickname = nickname;
        }
        if let Some(guid) = entry.guid {
            contact.guid = Some(guid);
        }

        self.last_synced = Some(entry.email);
    }

    /// Membership change; enforces the AL/BL exclusivity the protocol
    /// promises.
    pub fn set_membership(&mut self, login: &Email, list: List, member: bool) {
        let contact = self.contact_mut(login);

        if member {
            contact.lists.insert(list);
            match list {
                List::Allow => contact.lists.remove(List::Block),
                List::Block => contact.lists.remove(List::Allow),
                _ => {}
            }
        } else {
            contact.lists.remove(list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(value: &str) -> Email {
        Email::try_from(value).unwrap()
    }

    #[test]
    fn test_allow_block_exclusive() {
        let mut roster = Roster::new();
        let login = email("a@b.c");

        roster.set_membership(&login, List::Allow, true);
        roster.set_membership(&login, List::Block, true);

        let contact = &roster.contacts[&login];
        assert!(contact.is_on(List::Block));
        assert!(!contact.is_on(List::Allow));

        roster.set_membership(&login, List::Allow, true);
        let contact = &roster.contacts[&login];
        assert!(contact.is_on(List::Allow));
        assert!(!contact.is_on(List::Block));
    }

    #[test]
    fn test_sync_entry_upserts() {
        let mut roster = Roster::new();

        roster.apply_sync_entry(LstEntry {
            email: email("a@b.c"),
            nickname: Some("Nick".into()),
            guid: Some(Guid::try_from("d57283f5-b92a-4e7e-88cb-d0327f534a50").unwrap()),
            lists: ListSet::from_bits(13),
            groups: vec![],
        });

        let contact = &roster.contacts[&email("a@b.c")];
        assert_eq!(contact.nickname, "Nick");
        assert!(contact.is_on(List::Forward));
        assert_eq!(roster.last_synced, Some(email("a@b.c")));
    }
}
