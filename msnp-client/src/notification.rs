//! The notification-server engine.
//!
//! Owns the NS connection: the login state machine (including
//! server-directed redirection), the unsolicited-command dispatch loop,
//! and the ping loop. The public surface lives on
//! [`Client`](crate::Client); this module is the machinery behind it.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex, RwLock, Weak,
};

use msnp_types::{
    command::{Command, CommandBody},
    core::{ClientInfo, Email, Endpoint},
    message::Message,
    presence::{Capabilities, Status},
    response::{OutReason, ServerCommand},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    auth::Authenticator,
    challenge,
    connection::{CloseReason, Connection, ReaderEvent},
    error::{Error, Result},
    event::{ClientEvent, LogoutReason},
    roster::{LocalUser, Roster},
    switchboard::Invitation,
    transport::Connector,
};

/// Configuration of a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The dispatch server dialed first.
    pub server: Endpoint,
    /// Presence announced by the login sequence's `CHG`.
    pub initial_status: Status,
    pub capabilities: Capabilities,
    pub client_info: ClientInfo,
    /// Deadline for a single correlated reply.
    pub reply_timeout: Duration,
    /// Deadline for the whole login sequence.
    pub login_timeout: Duration,
    /// `XFR NS` hops tolerated before giving up with `Redirected`.
    pub redirect_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: Endpoint::new("messenger.hotmail.com", 1863),
            initial_status: Status::Online,
            capabilities: Capabilities::default(),
            client_info: ClientInfo::default(),
            reply_timeout: Duration::from_secs(60),
            login_timeout: Duration::from_secs(120),
            redirect_limit: 3,
        }
    }
}

/// Login name and password; used during login only, never retained.
#[derive(Clone)]
pub struct Credentials {
    pub login: Email,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The password stays out of logs.
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// State shared between the dispatch loop and caller operations.
pub(crate) struct SharedState {
    pub local: RwLock<LocalUser>,
    pub roster: RwLock<Roster>,
}

impl SharedState {
    pub fn new(login: Email) -> Self {
        Self {
            local: RwLock::new(LocalUser::new(login)),
            roster: RwLock::new(Roster::new()),
        }
    }
}

/// Ping bookkeeping shared between the ping loop and the dispatch loop.
struct PingState {
    /// Seconds until the next `PNG`, as dictated by the latest `QNG`.
    interval_secs: AtomicU32,
    last_pong: Mutex<Instant>,
}

/// An established notification session.
pub(crate) struct NsSession {
    pub connection: Arc<Connection>,
    shared: Arc<NsShared>,
    dispatch: JoinHandle<()>,
    ping: JoinHandle<()>,
}

/// Logout-once bookkeeping.
struct NsShared {
    logged_out: AtomicBool,
    /// Set by whoever initiates the teardown so the terminal event names
    /// the right reason.
    close_reason: Mutex<Option<LogoutReason>>,
}

impl NsShared {
    fn emit_logout_once(
        &self,
        events: &mpsc::UnboundedSender<ClientEvent>,
        fallback: LogoutReason,
    ) {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            return;
        }

        let reason = self
            .close_reason
            .lock()
            .expect("close reason lock poisoned")
            .take()
            .unwrap_or(fallback);
        let _ = events.send(ClientEvent::LoggedOut(reason));
    }
}

impl NsSession {
    pub fn is_alive(&self) -> bool {
        !self.shared.logged_out.load(Ordering::SeqCst)
    }

    /// `logout()`: best-effort `OUT`, then teardown with the
    /// user-initiated reason.
    pub async fn shutdown(&self, events: &mpsc::UnboundedSender<ClientEvent>) {
        *self
            .shared
            .close_reason
            .lock()
            .expect("close reason lock poisoned") = Some(LogoutReason::UserInitiated);

        let _ = self
            .connection
            .send(Command {
                trid: None,
                body: CommandBody::Out,
            })
            .await;

        self.connection.close().await;
        self.ping.abort();
        self.shared.emit_logout_once(events, LogoutReason::UserInitiated);
    }
}

impl Drop for NsSession {
    fn drop(&mut self) {
        self.dispatch.abort();
        self.ping.abort();
    }
}

/// Run the whole login sequence and hand back the established session.
///
/// The overall deadline is applied by the caller; every step in here uses
/// the per-reply timeout.
pub(crate) async fn establish(
    connector: &dyn Connector,
    authenticator: &dyn Authenticator,
    config: &ClientConfig,
    credentials: &Credentials,
    state: Arc<SharedState>,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> Result<NsSession> {
    let timeout = config.reply_timeout;
    // One id sequence across all NS hops of this login.
    let trid_counter = Arc::new(AtomicU32::new(1));

    // Negotiate until a server keeps us instead of redirecting.
    let mut endpoint = config.server.clone();
    let mut hops = 0;
    let (connection, reader_rx, policy) = loop {
        let transport = connector.connect(&endpoint).await?;
        let (connection, reader_rx) = Connection::open(transport, Arc::clone(&trid_counter));

        let reply = connection
            .transaction(CommandBody::ver(), &["VER"], timeout)
            .await?;
        match reply {
            ServerCommand::Ver { dialects, .. }
                if dialects.iter().any(|dialect| dialect == "MSNP12") => {}
            other => {
                connection.close().await;
                return Err(Error::Protocol(format!(
                    "server does not speak MSNP12: {other:?}"
                )));
            }
        }

        connection
            .transaction(
                CommandBody::Cvr {
                    info: config.client_info.clone(),
                    login: credentials.login.clone(),
                },
                &["CVR"],
                timeout,
            )
            .await?;

        let reply = connection
            .transaction(
                CommandBody::UsrTwnI {
                    login: credentials.login.clone(),
                },
                &["USR", "XFR"],
                timeout,
            )
            .await
            .map_err(Error::for_login)?;

        match reply {
            ServerCommand::UsrTwnS { policy, .. } => break (connection, reader_rx, policy),
            ServerCommand::XfrNs {
                endpoint: next, ..
            } => {
                // Tear down this hop and dial where we were sent.
                connection.close().await;

                hops += 1;
                if hops > config.redirect_limit {
                    return Err(Error::Redirected);
                }
                log::debug!("redirected to {next}");
                endpoint = next;
            }
            other => {
                connection.close().await;
                return Err(Error::Protocol(format!(
                    "USR answered with {}",
                    other.name()
                )));
            }
        }
    };

    // The SSO exchange happens off the NS connection.
    let ticket = authenticator
        .authenticate(&credentials.login, &credentials.password, &policy)
        .await
        .map_err(Error::for_login)?;

    let reply = connection
        .transaction(
            CommandBody::UsrTwnS {
                ticket: ticket
                    .as_str()
                    .try_into()
                    .map_err(|_| Error::Protocol("authenticator produced an unusable ticket".into()))?,
            },
            &["USR"],
            timeout,
        )
        .await
        .map_err(Error::for_login)?;
    let ServerCommand::UsrOk { .. } = reply else {
        connection.close().await;
        return Err(Error::Protocol(format!(
            "ticket submission answered with {}",
            reply.name()
        )));
    };

    // From here on, unsolicited traffic (CHL included) must be serviced
    // while login continues.
    let ping = Arc::new(PingState {
        interval_secs: AtomicU32::new(50),
        last_pong: Mutex::new(Instant::now()),
    });
    let shared = Arc::new(NsShared {
        logged_out: AtomicBool::new(false),
        close_reason: Mutex::new(None),
    });
    let (synced_tx, mut synced_rx) = watch::channel(0u32);

    // The dispatch loop holds the connection weakly: if login is dropped
    // (deadline, caller gone), the last strong reference goes with it, the
    // reader stops, and the loop drains out instead of leaking.
    let dispatch = tokio::spawn(run_dispatch(DispatchContext {
        connection: Arc::downgrade(&connection),
        state: Arc::clone(&state),
        events: events.clone(),
        shared: Arc::clone(&shared),
        ping: Arc::clone(&ping),
        synced: synced_tx,
        reply_timeout: timeout,
        reader_rx,
    }));

    // List synchronization. The reply names the counts; the stream itself
    // (LSG/LST/BPR/...) flows through the dispatch loop.
    let reply = connection
        .transaction(
            CommandBody::Syn {
                version1: "0".into(),
                version2: "0".into(),
            },
            &["SYN"],
            timeout,
        )
        .await?;
    let ServerCommand::Syn { contact_count, .. } = reply else {
        return Err(Error::Protocol(format!("SYN answered with {}", reply.name())));
    };

    let sync_complete = async {
        while *synced_rx.borrow() < contact_count {
            if synced_rx.changed().await.is_err() {
                return Err(Error::Closed);
            }
        }
        Ok(())
    };
    if let Err(error) = match tokio::time::timeout(timeout, sync_complete).await {
        Ok(result) => result,
        Err(_elapsed) => Err(Error::Timeout),
    } {
        connection.close().await;
        return Err(error);
    }

    // Announce presence; only now does the server consider us online.
    let reply = connection
        .transaction(
            CommandBody::Chg {
                status: config.initial_status,
                capabilities: config.capabilities,
                object: None,
            },
            &["CHG"],
            timeout,
        )
        .await?;
    if let ServerCommand::Chg { status, capabilities, object, .. } = reply {
        let mut local = state.local.write().expect("local user lock poisoned");
        local.status = Some(status);
        local.capabilities = capabilities;
        local.display_picture = object;
    }

    let ping_task = tokio::spawn(run_ping(
        Arc::clone(&connection),
        Arc::clone(&ping),
        Arc::clone(&shared),
    ));

    let _ = events.send(ClientEvent::LoggedIn);

    Ok(NsSession {
        connection,
        shared,
        dispatch,
        ping: ping_task,
    })
}

struct DispatchContext {
    connection: Weak<Connection>,
    state: Arc<SharedState>,
    events: mpsc::UnboundedSender<ClientEvent>,
    shared: Arc<NsShared>,
    ping: Arc<PingState>,
    synced: watch::Sender<u32>,
    reply_timeout: Duration,
    reader_rx: mpsc::UnboundedReceiver<ReaderEvent>,
}

async fn run_dispatch(mut ctx: DispatchContext) {
    while let Some(event) = ctx.reader_rx.recv().await {
        match event {
            ReaderEvent::Command(command) => handle_command(&ctx, command).await,
            ReaderEvent::Closed(reason) => {
                let fallback = match reason {
                    CloseReason::Eof | CloseReason::Transport(_) => LogoutReason::Transport,
                    CloseReason::Protocol(_) => LogoutReason::Protocol,
                };
                ctx.shared.emit_logout_once(&ctx.events, fallback);
                return;
            }
        }
    }

    // Reader aborted underneath us (logout teardown).
    ctx.shared
        .emit_logout_once(&ctx.events, LogoutReason::Transport);
}

async fn handle_command(ctx: &DispatchContext, command: ServerCommand) {
    match command {
        // --- presence ---------------------------------------------------
        ServerCommand::Nln {
            status,
            login,
            nickname,
            capabilities,
            object,
        }
        | ServerCommand::Iln {
            status,
            login,
            nickname,
            capabilities,
            object,
            ..
        } => {
            let nickname_changed = {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                let contact = roster.contact_mut(&login);

                let changed = contact.nickname != nickname;
                contact.status = Some(status);
                contact.nickname = nickname.clone();
                contact.capabilities = capabilities;
                contact.display_picture = object;
                changed
            };

            let _ = ctx.events.send(ClientEvent::ContactPresenceChanged {
                login: login.clone(),
                status: Some(status),
            });
            if nickname_changed {
                let _ = ctx
                    .events
                    .send(ClientEvent::ContactNicknameChanged { login, nickname });
            }
        }
        ServerCommand::Fln { login } => {
            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                roster.contact_mut(&login).status = None;
            }

            let _ = ctx
                .events
                .send(ClientEvent::ContactPresenceChanged { login, status: None });
        }
        ServerCommand::Ubx { login, payload } => {
            let personal_message = extract_xml_text(&payload, "PSM").unwrap_or_default();

            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                roster.contact_mut(&login).personal_message = personal_message.clone();
            }

            let _ = ctx.events.send(ClientEvent::ContactPersonalMessageChanged {
                login,
                personal_message,
            });
        }

        // --- housekeeping -----------------------------------------------
        ServerCommand::Chl { challenge } => {
            let Some(connection) = ctx.connection.upgrade() else {
                return;
            };

            // Answer from a task of its own; the dispatch loop must not
            // block on the reply.
            let timeout = ctx.reply_timeout;
            tokio::spawn(async move {
                let result = connection
                    .transaction(
                        CommandBody::Qry {
                            product_id: challenge::PRODUCT_ID.into(),
                            digest: challenge::respond(&challenge),
                        },
                        &["QRY"],
                        timeout,
                    )
                    .await;

                if let Err(error) = result {
                    log::warn!("challenge response failed: {error}");
                }
            });
        }
        ServerCommand::Qng { until_next } => {
            ctx.ping.interval_secs.store(until_next, Ordering::Relaxed);
            *ctx.ping.last_pong.lock().expect("pong lock poisoned") = Instant::now();
        }
        ServerCommand::Out { reason } => {
            let reason = match reason {
                Some(OutReason::OtherClient) => LogoutReason::OtherClient,
                Some(OutReason::ServerShutdown) => LogoutReason::ServerShutdown,
                None => LogoutReason::ServerShutdown,
            };

            ctx.shared.emit_logout_once(&ctx.events, reason);
            if let Some(connection) = ctx.connection.upgrade() {
                connection.close().await;
            }
        }
        ServerCommand::Not { payload } => {
            let _ = ctx
                .events
                .send(ClientEvent::NotificationReceived { payload });
        }
        ServerCommand::Msg { payload, .. } => {
            // Profile blob, initial e-mail tallies, and friends. Parsed
            // only to confirm it is a notification-shaped message.
            let message = Message::parse(&payload);
            log::debug!(
                "notification-server message: {}",
                message.content_type().unwrap_or("<untyped>")
            );
            let _ = ctx
                .events
                .send(ClientEvent::NotificationReceived { payload });
        }

        // --- ring-in ----------------------------------------------------
        ServerCommand::Rng {
            session,
            endpoint,
            ticket,
            login,
            nickname,
        } => {
            let _ = ctx
                .events
                .send(ClientEvent::InvitedToImSession(Invitation {
                    session,
                    endpoint,
                    ticket,
                    inviter: login,
                    inviter_nickname: nickname,
                }));
        }

        // --- synchronization stream and roster pushes -------------------
        ServerCommand::Lsg { name, guid } => {
            let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
            roster
                .groups
                .insert(guid.clone(), crate::roster::Group { guid, name });
            drop(roster);

            let _ = ctx.events.send(ClientEvent::GroupsChanged);
        }
        ServerCommand::Lst(entry) => {
            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                roster.apply_sync_entry(entry);
            }

            ctx.synced.send_modify(|count| *count += 1);
        }
        ServerCommand::Bpr { property, value } => {
            let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
            if let Some(login) = roster.last_synced.clone() {
                roster
                    .contact_mut(&login)
                    .properties
                    .insert(property, value);
            }
        }
        ServerCommand::Prp { property, value, .. } => {
            let mut local = ctx.state.local.write().expect("local user lock poisoned");
            if property == "MFN" {
                local.nickname = value;
            } else {
                local.properties.insert(property, value);
            }
        }
        ServerCommand::Sbp {
            guid, property, value, ..
        } => {
            let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
            if let Some(contact) = roster
                .contacts
                .values_mut()
                .find(|contact| contact.guid.as_ref() == Some(&guid))
            {
                if property == "MFN" {
                    contact.nickname = value;
                } else {
                    contact.properties.insert(property, value);
                }
            }
        }
        ServerCommand::Gtc { setting, .. } => {
            ctx.state
                .roster
                .write()
                .expect("roster lock poisoned")
                .reverse_prompt = setting;
        }
        ServerCommand::Blp { setting, .. } => {
            ctx.state
                .roster
                .write()
                .expect("roster lock poisoned")
                .privacy = setting;
        }
        ServerCommand::Adc {
            list,
            email: Some(login),
            nickname,
            guid,
            ..
        } => {
            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                roster.set_membership(&login, list, true);
                let contact = roster.contact_mut(&login);
                if let Some(nickname) = nickname {
                    contact.nickname = nickname;
                }
                if let Some(guid) = guid {
                    contact.guid = Some(guid);
                }
            }

            let _ = ctx.events.send(ClientEvent::ListMembershipChanged {
                login,
                list,
                member: true,
            });
        }
        ServerCommand::Rem { list, target, .. } => {
            let login = {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                let login = match target {
                    msnp_types::command::RemTarget::Email(email) => Some(email),
                    msnp_types::command::RemTarget::Guid(guid) => roster
                        .contacts
                        .values()
                        .find(|contact| contact.guid.as_ref() == Some(&guid))
                        .map(|contact| contact.login.clone()),
                };

                if let Some(login) = &login {
                    roster.set_membership(login, list, false);
                }
                login
            };

            if let Some(login) = login {
                let _ = ctx.events.send(ClientEvent::ListMembershipChanged {
                    login,
                    list,
                    member: false,
                });
            }
        }
        ServerCommand::Adg { name, guid, .. } => {
            ctx.state
                .roster
                .write()
                .expect("roster lock poisoned")
                .groups
                .insert(guid.clone(), crate::roster::Group { guid, name });

            let _ = ctx.events.send(ClientEvent::GroupsChanged);
        }
        ServerCommand::Rmg { guid, .. } => {
            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                roster.groups.remove(&guid);
                for contact in roster.contacts.values_mut() {
                    contact.groups.retain(|member| member != &guid);
                }
            }

            let _ = ctx.events.send(ClientEvent::GroupsChanged);
        }
        ServerCommand::Reg { guid, name, .. } => {
            {
                let mut roster = ctx.state.roster.write().expect("roster lock poisoned");
                if let Some(group) = roster.groups.get_mut(&guid) {
                    group.name = name;
                }
            }

            let _ = ctx.events.send(ClientEvent::GroupsChanged);
        }

        // --- partially documented / uninteresting -----------------------
        ServerCommand::Sbs { args } => {
            log::debug!("ignoring SBS {args:?}");
        }
        other => {
            log::debug!("notification dispatch ignoring {}", other.name());
        }
    }
}

/// `PNG` every interval; a pong gap beyond twice the interval means the
/// server is gone.
async fn run_ping(connection: Arc<Connection>, ping: Arc<PingState>, shared: Arc<NsShared>) {
    loop {
        let interval =
            Duration::from_secs(u64::from(ping.interval_secs.load(Ordering::Relaxed)));
        tokio::time::sleep(interval).await;

        let silence = ping
            .last_pong
            .lock()
            .expect("pong lock poisoned")
            .elapsed();
        if silence > interval * 2 {
            *shared
                .close_reason
                .lock()
                .expect("close reason lock poisoned") = Some(LogoutReason::PingTimeout);
            connection.close().await;
            return;
        }

        let png = Command {
            trid: None,
            body: CommandBody::Png,
        };
        if connection.send(png).await.is_err() {
            return;
        }
    }
}

/// Minimal `<Tag>text</Tag>` extraction for `UBX`/`UUX` payloads.
///
/// The payloads are tiny fixed-shape XML; entities for the five XML
/// specials are decoded, nothing else.
pub(crate) fn extract_xml_text(payload: &[u8], tag: &str) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?;
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;

    Some(
        text[start..end]
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

/// Build the `UUX` personal-status payload.
pub(crate) fn personal_status_payload(personal_message: &str) -> Vec<u8> {
    format!(
        "<Data><PSM>{}</PSM><CurrentMedia></CurrentMedia></Data>",
        crate::auth::xml_escape(personal_message)
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_xml_text() {
        let payload = b"<Data><PSM>out &amp; about</PSM><CurrentMedia></CurrentMedia></Data>";

        assert_eq!(
            extract_xml_text(payload, "PSM").as_deref(),
            Some("out & about")
        );
        assert_eq!(extract_xml_text(payload, "CurrentMedia").as_deref(), Some(""));
        assert_eq!(extract_xml_text(payload, "Missing"), None);
    }

    #[test]
    fn test_personal_status_payload_escapes() {
        let payload = personal_status_payload("a<b");

        assert_eq!(
            payload,
            b"<Data><PSM>a&lt;b</PSM><CurrentMedia></CurrentMedia></Data>"
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            login: Email::try_from("a@b.c").unwrap(),
            password: "hunter2".into(),
        };

        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
