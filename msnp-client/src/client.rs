//! The public client facade.

use std::sync::{Arc, Mutex};

use msnp_types::{
    command::{AdcTarget, CommandBody, PrivacySetting, RemTarget, ReversePrompt},
    core::{Email, Guid},
    list::List,
    presence::Status,
    response::ServerCommand,
};
use tokio::sync::mpsc;

use crate::{
    auth::Authenticator,
    connection::Connection,
    error::{Error, Result},
    event::ClientEvent,
    notification::{establish, personal_status_payload, ClientConfig, Credentials, NsSession, SharedState},
    roster::{Contact, Group, LocalUser},
    switchboard::{ImSession, Invitation},
    transport::Connector,
};

/// A Messenger client: one notification session plus any number of IM
/// sessions.
///
/// Operations that round-trip to the server return after the server
/// acknowledges. Events are delivered through the receiver returned by
/// [`Client::events`].
pub struct Client {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    authenticator: Arc<dyn Authenticator>,
    state: Arc<SharedState>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientEvent>>>,
    session: tokio::sync::Mutex<Option<NsSession>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("login", &self.local_user().login)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// A client with the default TCP dialer and the live SSO exchange.
    #[cfg(feature = "sso")]
    pub fn new(login: Email) -> Self {
        Self::with_parts(
            login,
            ClientConfig::default(),
            Arc::new(crate::transport::TcpConnector::default()),
            Arc::new(crate::auth::PassportAuthenticator::default()),
        )
    }

    /// Full injection: configuration, byte-transport factory, and
    /// authenticator.
    pub fn with_parts(
        login: Email,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            config,
            connector,
            authenticator,
            state: Arc::new(SharedState::new(login)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// The client event stream. Yields `None` on the second call.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<ClientEvent>> {
        self.events_rx.lock().expect("events lock poisoned").take()
    }

    // --- session lifecycle ---------------------------------------------

    /// Run the login sequence: dial, negotiate, SSO, synchronize, go
    /// online. `LoggedIn` fires exactly once on success.
    pub async fn login(&self, password: &str) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(NsSession::is_alive) {
            return Err(Error::Protocol("already logged in".into()));
        }

        let credentials = Credentials {
            login: self.local_user().login,
            password: password.to_owned(),
        };

        let established = tokio::time::timeout(
            self.config.login_timeout,
            establish(
                self.connector.as_ref(),
                self.authenticator.as_ref(),
                &self.config,
                &credentials,
                Arc::clone(&self.state),
                self.events_tx.clone(),
            ),
        )
        .await
        .map_err(|_elapsed| Error::Timeout)??;

        *session = Some(established);

        Ok(())
    }

    /// Sign off: best-effort `OUT`, close the connection, cancel pending
    /// operations. `LoggedOut(UserInitiated)` fires once.
    pub async fn logout(&self) {
        let session = self.session.lock().await.take();

        if let Some(session) = session {
            session.shutdown(&self.events_tx).await;
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>> {
        let session = self.session.lock().await;

        match session.as_ref() {
            Some(session) if session.is_alive() => Ok(Arc::clone(&session.connection)),
            _ => Err(Error::Closed),
        }
    }

    // --- snapshots ------------------------------------------------------

    pub fn local_user(&self) -> LocalUser {
        self.state
            .local
            .read()
            .expect("local user lock poisoned")
            .clone()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state
            .roster
            .read()
            .expect("roster lock poisoned")
            .contacts
            .values()
            .cloned()
            .collect()
    }

    pub fn contact(&self, login: &Email) -> Option<Contact> {
        self.state
            .roster
            .read()
            .expect("roster lock poisoned")
            .contacts
            .get(login)
            .cloned()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.state
            .roster
            .read()
            .expect("roster lock poisoned")
            .groups
            .values()
            .cloned()
            .collect()
    }

    // --- local user -----------------------------------------------------

    /// `CHG` — change presence.
    pub async fn set_status(&self, status: Status) -> Result<()> {
        let connection = self.connection().await?;
        let capabilities = self.local_user().capabilities;
        let object = self.local_user().display_picture;

        let reply = connection
            .transaction(
                CommandBody::Chg {
                    status,
                    capabilities,
                    object,
                },
                &["CHG"],
                self.config.reply_timeout,
            )
            .await?;

        if let ServerCommand::Chg { status, .. } = reply {
            self.state
                .local
                .write()
                .expect("local user lock poisoned")
                .status = Some(status);
        }

        Ok(())
    }

    /// `PRP MFN` — change the display name.
    pub async fn set_nickname(&self, nickname: &str) -> Result<()> {
        let connection = self.connection().await?;

        let reply = connection
            .transaction(
                CommandBody::Prp {
                    property: "MFN".into(),
                    value: nickname.to_owned(),
                },
                &["PRP"],
                self.config.reply_timeout,
            )
            .await?;

        if let ServerCommand::Prp { value, .. } = reply {
            self.state
                .local
                .write()
                .expect("local user lock poisoned")
                .nickname = value;
        }

        Ok(())
    }

    /// `UUX` — publish the personal status message.
    pub async fn set_personal_message(&self, personal_message: &str) -> Result<()> {
        let connection = self.connection().await?;

        connection
            .transaction(
                CommandBody::Uux {
                    payload: personal_status_payload(personal_message),
                },
                &["UUX"],
                self.config.reply_timeout,
            )
            .await?;

        self.state
            .local
            .write()
            .expect("local user lock poisoned")
            .personal_message = personal_message.to_owned();

        Ok(())
    }

    /// `BLP` — default treatment of users on neither AL nor BL.
    pub async fn set_privacy(&self, setting: PrivacySetting) -> Result<()> {
        let connection = self.connection().await?;

        connection
            .transaction(
                CommandBody::Blp { setting },
                &["BLP"],
                self.config.reply_timeout,
            )
            .await?;

        self.state
            .roster
            .write()
            .expect("roster lock poisoned")
            .privacy = setting;

        Ok(())
    }

    /// `GTC` — whether reverse-list additions prompt.
    pub async fn set_reverse_prompt(&self, setting: ReversePrompt) -> Result<()> {
        let connection = self.connection().await?;

        connection
            .transaction(
                CommandBody::Gtc { setting },
                &["GTC"],
                self.config.reply_timeout,
            )
            .await?;

        self.state
            .roster
            .write()
            .expect("roster lock poisoned")
            .reverse_prompt = setting;

        Ok(())
    }

    // --- contacts -------------------------------------------------------

    /// `ADC FL` — add a contact to the roster, optionally straight into a
    /// group.
    pub async fn add_contact(
        &self,
        login: &Email,
        nickname: Option<&str>,
        group: Option<&Guid>,
    ) -> Result<Contact> {
        let connection = self.connection().await?;

        let reply = connection
            .transaction(
                CommandBody::Adc {
                    list: List::Forward,
                    target: AdcTarget::ByEmail {
                        email: login.clone(),
                        nickname: nickname.map(str::to_owned),
                    },
                    group: None,
                },
                &["ADC"],
                self.config.reply_timeout,
            )
            .await?;

        let assigned_guid = match reply {
            ServerCommand::Adc { guid, .. } => guid,
            _ => None,
        };

        {
            let mut roster = self.state.roster.write().expect("roster lock poisoned");
            roster.set_membership(login, List::Forward, true);
            let contact = roster.contact_mut(login);
            if let Some(nickname) = nickname {
                contact.nickname = nickname.to_owned();
            }
            if let Some(guid) = assigned_guid.clone() {
                contact.guid = Some(guid);
            }
        }

        // Group placement needs the server-assigned guid.
        if let (Some(group), Some(guid)) = (group, assigned_guid) {
            connection
                .transaction(
                    CommandBody::Adc {
                        list: List::Forward,
                        target: AdcTarget::ByGuid(guid),
                        group: Some(group.clone()),
                    },
                    &["ADC"],
                    self.config.reply_timeout,
                )
                .await?;

            let mut roster = self.state.roster.write().expect("roster lock poisoned");
            roster.contact_mut(login).groups.push(group.clone());
        }

        let _ = self.events_tx.send(ClientEvent::ListMembershipChanged {
            login: login.clone(),
            list: List::Forward,
            member: true,
        });

        self.contact(login).ok_or(Error::Closed)
    }

    /// `REM FL` — drop a contact from the roster.
    pub async fn remove_contact(&self, login: &Email) -> Result<()> {
        let connection = self.connection().await?;

        let guid = self
            .contact(login)
            .and_then(|contact| contact.guid)
            .ok_or_else(|| Error::Protocol(format!("{login} is not on the contact list")))?;

        connection
            .transaction(
                CommandBody::Rem {
                    list: List::Forward,
                    target: RemTarget::Guid(guid),
                    group: None,
                },
                &["REM"],
                self.config.reply_timeout,
            )
            .await?;

        {
            let mut roster = self.state.roster.write().expect("roster lock poisoned");
            roster.set_membership(login, List::Forward, false);
            let contact = roster.contact_mut(login);
            contact.guid = None;
            contact.groups.clear();
            if contact.lists.is_empty() {
                roster.contacts.remove(login);
            }
        }

        let _ = self.events_tx.send(ClientEvent::ListMembershipChanged {
            login: login.clone(),
            list: List::Forward,
            member: false,
        });

        Ok(())
    }

    /// Move a contact to BL (off AL — the two are mutually exclusive).
    pub async fn block(&self, login: &Email) -> Result<()> {
        let connection = self.connection().await?;

        let on_allow = self
            .contact(login)
            .map(|contact| contact.is_on(List::Allow))
            .unwrap_or(false);
        if on_allow {
            connection
                .transaction(
                    CommandBody::Rem {
                        list: List::Allow,
                        target: RemTarget::Email(login.clone()),
                        group: None,
                    },
                    &["REM"],
                    self.config.reply_timeout,
                )
                .await?;
        }

        connection
            .transaction(
                CommandBody::Adc {
                    list: List::Block,
                    target: AdcTarget::ByEmail {
                        email: login.clone(),
                        nickname: None,
                    },
                    group: None,
                },
                &["ADC"],
                self.config.reply_timeout,
            )
            .await?;

        self.state
            .roster
            .write()
            .expect("roster lock poisoned")
            .set_membership(login, List::Block, true);

        let _ = self.events_tx.send(ClientEvent::ListMembershipChanged {
            login: login.clone(),
            list: List::Block,
            member: true,
        });

        Ok(())
    }

    /// Move a contact back to AL.
    pub async fn unblock(&self, login: &Email) -> Result<()> {
        let connection = self.connection().await?;

        let blocked = self
            .contact(login)
            .map(|contact| contact.is_blocked())
            .unwrap_or(false);
        if blocked {
            connection
                .transaction(
                    CommandBody::Rem {
                        list: List::Block,
                        target: RemTarget::Email(login.clone()),
                        group: None,
                    },
                    &["REM"],
                    self.config.reply_timeout,
                )
                .await?;
        }

        connection
            .transaction(
                CommandBody::Adc {
                    list: List::Allow,
                    target: AdcTarget::ByEmail {
                        email: login.clone(),
                        nickname: None,
                    },
                    group: None,
                },
                &["ADC"],
                self.config.reply_timeout,
            )
            .await?;

        self.state
            .roster
            .write()
            .expect("roster lock poisoned")
            .set_membership(login, List::Allow, true);

        let _ = self.events_tx.send(ClientEvent::ListMembershipChanged {
            login: login.clone(),
            list: List::Allow,
            member: true,
        });

        Ok(())
    }

    // --- groups ---------------------------------------------------------

    /// `ADG` — create a group.
    pub async fn add_group(&self, name: &str) -> Result<Group> {
        let connection = self.connection().await?;

        let reply = connection
            .transaction(
                CommandBody::Adg {
                    name: name.to_owned(),
                },
                &["ADG"],
                self.config.reply_timeout,
            )
            .await?;

        let ServerCommand::Adg { name, guid, .. } = reply else {
            return Err(Error::Protocol(format!("ADG answered with {}", reply.name())));
        };

        let group = Group {
            guid: guid.clone(),
            name,
        };
        self.state
            .roster
            .write()
            .expect("roster lock poisoned")
            .groups
            .insert(guid, group.clone());

        let _ = self.events_tx.send(ClientEvent::GroupsChanged);

        Ok(group)
    }

    /// `RMG` — delete a group.
    pub async fn remove_group(&self, guid: &Guid) -> Result<()> {
        let connection = self.connection().await?;

        connection
            .transaction(
                CommandBody::Rmg { guid: guid.clone() },
                &["RMG"],
                self.config.reply_timeout,
            )
            .await?;

        {
            let mut roster = self.state.roster.write().expect("roster lock poisoned");
            roster.groups.remove(guid);
            for contact in roster.contacts.values_mut() {
                contact.groups.retain(|member| member != guid);
            }
        }

        let _ = self.events_tx.send(ClientEvent::GroupsChanged);

        Ok(())
    }

    /// `REG` — rename a group. The in-memory name follows the server's
    /// reply.
    pub async fn rename_group(&self, guid: &Guid, name: &str) -> Result<()> {
        let connection = self.connection().await?;

        let reply = connection
            .transaction(
                CommandBody::Reg {
                    guid: guid.clone(),
                    name: name.to_owned(),
                },
                &["REG"],
                self.config.reply_timeout,
            )
            .await?;

        let ServerCommand::Reg { name, .. } = reply else {
            return Err(Error::Protocol(format!("REG answered with {}", reply.name())));
        };

        if let Some(group) = self
            .state
            .roster
            .write()
            .expect("roster lock poisoned")
            .groups
            .get_mut(guid)
        {
            group.name = name;
        }

        let _ = self.events_tx.send(ClientEvent::GroupsChanged);

        Ok(())
    }

    // --- IM sessions ----------------------------------------------------

    /// Outbound call: `XFR SB` on the NS, then dial the switchboard and
    /// invite `remote`. Returns once they (or anyone) joined.
    pub async fn start_im_session(&self, remote: &Email) -> Result<ImSession> {
        let connection = self.connection().await?;

        let reply = connection
            .transaction(CommandBody::XfrSb, &["XFR"], self.config.reply_timeout)
            .await?;
        let ServerCommand::XfrSb { endpoint, ticket, .. } = reply else {
            return Err(Error::Protocol(format!("XFR answered with {}", reply.name())));
        };

        let transport = self.connector.connect(&endpoint).await?;
        let local = self.local_user().login;

        let session =
            ImSession::call(transport, local, ticket, remote, self.config.reply_timeout).await?;

        let _ = self.events_tx.send(ClientEvent::ImSessionCreated {
            remote: remote.clone(),
            session_id: session.session_id().cloned(),
        });

        Ok(session)
    }

    /// Answer a ring: dial the invitation's switchboard and `ANS`.
    pub async fn accept_invitation(&self, invitation: Invitation) -> Result<ImSession> {
        let transport = self.connector.connect(&invitation.endpoint).await?;
        let local = self.local_user().login;
        let inviter = invitation.inviter.clone();

        let session =
            ImSession::answer(transport, local, invitation, self.config.reply_timeout).await?;

        let _ = self.events_tx.send(ClientEvent::ImSessionCreated {
            remote: inviter,
            session_id: session.session_id().cloned(),
        });

        Ok(session)
    }

    /// Decline a ring. The switchboard is never dialed; the invitation is
    /// consumed.
    pub fn reject_invitation(&self, invitation: Invitation) {
        log::debug!(
            "rejecting invitation from {} (session {})",
            invitation.inviter,
            invitation.session
        );
    }
}
