//! Switchboard (IM session) orchestration.
//!
//! Each IM session is its own TCP connection with independent framing.
//! Sessions are born either from an outbound call (`XFR SB` on the NS,
//! then `USR` + `CAL` here) or by answering an inbound invitation (`ANS`,
//! preceded on the wire by an `IRO` roster burst). The session keeps a
//! participant roster, serializes outbound messages through the shared
//! single-writer lock, and closes when every remote participant has left
//! or the transport drops.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};

use msnp_types::{
    command::{Command, CommandBody},
    core::{Email, Endpoint, SessionId, Token},
    message::{DeliveryClass, Message},
    presence::Capabilities,
    response::ServerCommand,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

use crate::{
    connection::{Connection, ReaderEvent},
    error::{Error, Result},
    event::{SessionCloseReason, SessionEvent},
    transport::Transport,
};

/// An inbound IM request (`RNG`).
///
/// Created when the ring arrives; consumed by
/// [`Client::accept_invitation`](crate::Client::accept_invitation) or
/// [`Client::reject_invitation`](crate::Client::reject_invitation).
#[derive(Debug)]
pub struct Invitation {
    pub(crate) session: SessionId,
    pub(crate) endpoint: Endpoint,
    pub(crate) ticket: Token,
    /// Who rang.
    pub inviter: Email,
    /// Their display name, unescaped.
    pub inviter_nickname: String,
}

/// A user currently joined to the session.
#[derive(Debug, Clone)]
pub struct Participant {
    pub login: Email,
    pub nickname: String,
    pub capabilities: Option<Capabilities>,
}

struct SessionShared {
    local: Email,
    participants: RwLock<HashMap<Email, Participant>>,
    closed: AtomicBool,
}

impl SessionShared {
    /// Fold a join into the roster. Idempotent — both the dispatch loop
    /// and construction-time waiters call this for the same commands.
    fn note_join(&self, login: Email, nickname: String, capabilities: Option<Capabilities>) {
        if login == self.local {
            return;
        }

        self.participants
            .write()
            .expect("participants lock poisoned")
            .insert(
                login.clone(),
                Participant {
                    login,
                    nickname,
                    capabilities,
                },
            );
    }

    fn emit_once(&self, events: &mpsc::UnboundedSender<SessionEvent>, reason: SessionCloseReason) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = events.send(SessionEvent::Closed(reason));
        }
    }
}

/// A single switchboard session.
pub struct ImSession {
    connection: Arc<Connection>,
    shared: Arc<SessionShared>,
    events: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    dispatch: JoinHandle<()>,
    session_id: Option<SessionId>,
    reply_timeout: Duration,
}

impl std::fmt::Debug for ImSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImSession")
            .field("session_id", &self.session_id)
            .field("participants", &self.participants().len())
            .finish_non_exhaustive()
    }
}

impl ImSession {
    /// Dial-side construction: `USR`, then `CAL`, then wait for the first
    /// `JOI` — the switchboard is unusable before it.
    pub(crate) async fn call(
        transport: Box<dyn Transport>,
        local: Email,
        ticket: Token,
        remote: &Email,
        reply_timeout: Duration,
    ) -> Result<Self> {
        let mut session = Self::start(transport, local.clone(), reply_timeout);

        // Subscribed before anything is written: the JOI that makes the
        // session usable must not slip past.
        let observer = session.connection.subscribe();

        let reply = session
            .connection
            .transaction(
                CommandBody::UsrSb {
                    login: local,
                    ticket,
                },
                &["USR"],
                reply_timeout,
            )
            .await?;
        let ServerCommand::UsrOk { .. } = reply else {
            return Err(Error::Protocol(format!(
                "switchboard USR answered with {}",
                reply.name()
            )));
        };

        let reply = session
            .connection
            .transaction(
                CommandBody::Cal {
                    login: remote.clone(),
                },
                &["CAL"],
                reply_timeout,
            )
            .await?;
        let ServerCommand::CalRinging { session: id, .. } = reply else {
            return Err(Error::Protocol(format!(
                "CAL answered with {}",
                reply.name()
            )));
        };
        session.session_id = Some(id);

        // Usable only once somebody is actually in the room.
        session
            .wait_for_join(observer, reply_timeout, |_login| true)
            .await?;

        Ok(session)
    }

    /// Answer-side construction: `ANS`; the `IRO` burst enumerating the
    /// existing participants lands in the roster before `ANS ... OK`
    /// completes the transaction.
    pub(crate) async fn answer(
        transport: Box<dyn Transport>,
        local: Email,
        invitation: Invitation,
        reply_timeout: Duration,
    ) -> Result<Self> {
        let mut session = Self::start(transport, local.clone(), reply_timeout);

        // Subscribed before the ANS goes out so the IRO burst is captured.
        let mut observer = session.connection.subscribe();

        let reply = session
            .connection
            .transaction(
                CommandBody::Ans {
                    login: local,
                    ticket: invitation.ticket,
                    session: invitation.session.clone(),
                },
                &["ANS"],
                reply_timeout,
            )
            .await?;
        let ServerCommand::AnsOk { .. } = reply else {
            return Err(Error::Protocol(format!(
                "ANS answered with {}",
                reply.name()
            )));
        };
        session.session_id = Some(invitation.session);

        // The IRO burst precedes ANS OK on the wire, so it already sits in
        // the observer's buffer; fold it into the roster before returning.
        while let Ok(command) = observer.try_recv() {
            if let ServerCommand::Iro {
                login,
                nickname,
                capabilities,
                ..
            } = command
            {
                session.shared.note_join(login, nickname, capabilities);
            }
        }

        Ok(session)
    }

    fn start(transport: Box<dyn Transport>, local: Email, reply_timeout: Duration) -> Self {
        // Fresh id sequence per switchboard connection.
        let (connection, reader_rx) =
            Connection::open(transport, Arc::new(AtomicU32::new(1)));

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(SessionShared {
            local,
            participants: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        // Weak: dropping the session must let the reader and this loop
        // wind down rather than keep the connection alive.
        let dispatch = tokio::spawn(run_dispatch(
            Arc::clone(&shared),
            Arc::downgrade(&connection),
            events_tx.clone(),
            reader_rx,
        ));

        Self {
            connection,
            shared,
            events: Mutex::new(Some(events_rx)),
            events_tx,
            dispatch,
            session_id: None,
            reply_timeout,
        }
    }

    /// The session's event stream. Yields `None` on the second call.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.lock().expect("events lock poisoned").take()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Snapshot of the remote participants.
    pub fn participants(&self) -> Vec<Participant> {
        self.shared
            .participants
            .read()
            .expect("participants lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn is_active(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Send a text message with delivery class `A` and wait for the
    /// switchboard's verdict.
    pub async fn send_message(&self, message: &Message) -> Result<()> {
        self.ensure_active()?;

        let reply = self
            .connection
            .transaction(
                CommandBody::message(DeliveryClass::Acknowledged, message),
                &["ACK", "NAK"],
                self.reply_timeout,
            )
            .await?;

        match reply {
            ServerCommand::Ack { .. } => Ok(()),
            ServerCommand::Nak { .. } => Err(Error::DeliveryFailed),
            other => Err(Error::Protocol(format!("MSG answered with {}", other.name()))),
        }
    }

    /// Fire-and-forget send (`U` for typing notifications, `N` for
    /// notifications). No reply is expected.
    pub async fn send_unacknowledged(
        &self,
        class: DeliveryClass,
        message: &Message,
    ) -> Result<()> {
        self.ensure_active()?;

        let command = Command {
            trid: Some(self.connection.assign_trid()),
            body: CommandBody::message(class, message),
        };

        self.connection.send(command).await
    }

    /// Tell the room the local user is typing.
    pub async fn send_typing(&self) -> Result<()> {
        let message = Message::typing_user(self.shared.local.as_str());

        self.send_unacknowledged(DeliveryClass::Unacknowledged, &message)
            .await
    }

    /// Invite another user into this session (group chat). Resolves once
    /// their `JOI` arrives.
    pub async fn invite(&self, login: &Email) -> Result<()> {
        self.ensure_active()?;

        let observer = self.connection.subscribe();

        self.connection
            .transaction(
                CommandBody::Cal {
                    login: login.clone(),
                },
                &["CAL"],
                self.reply_timeout,
            )
            .await?;

        self.wait_for_join(observer, self.reply_timeout, |joined| joined == login)
            .await
    }

    /// Leave the session: `OUT`, close the transport, cancel pending
    /// sends. Idempotent.
    pub async fn close(&self) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }

        let _ = self
            .connection
            .send(Command {
                trid: None,
                body: CommandBody::Out,
            })
            .await;

        self.shared
            .emit_once(&self.events_tx, SessionCloseReason::UserInitiated);
        self.connection.close().await;
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Wait on the connection's observer stream for a join matching
    /// `predicate`. The subscription must predate the triggering write.
    async fn wait_for_join(
        &self,
        mut observer: broadcast::Receiver<ServerCommand>,
        timeout: Duration,
        predicate: impl Fn(&Email) -> bool,
    ) -> Result<()> {
        let wait = async {
            loop {
                match observer.recv().await {
                    Ok(
                        ServerCommand::Joi {
                            login,
                            nickname,
                            capabilities,
                        }
                        | ServerCommand::Iro {
                            login,
                            nickname,
                            capabilities,
                            ..
                        },
                    ) if predicate(&login) => {
                        // The dispatch loop also folds this join in, but
                        // the caller must see it the moment we return.
                        self.shared.note_join(login, nickname, capabilities);
                        return Ok(());
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A slow observer loses commands, never the reader.
                        log::warn!("switchboard observer lagged, {skipped} commands dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::Closed),
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_elapsed) => Err(Error::Timeout),
        }
    }
}

impl Drop for ImSession {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

async fn run_dispatch(
    shared: Arc<SessionShared>,
    connection: std::sync::Weak<Connection>,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut reader_rx: mpsc::UnboundedReceiver<ReaderEvent>,
) {
    while let Some(event) = reader_rx.recv().await {
        match event {
            ReaderEvent::Command(command) => match command {
                ServerCommand::Joi {
                    login,
                    nickname,
                    capabilities,
                }
                | ServerCommand::Iro {
                    login,
                    nickname,
                    capabilities,
                    ..
                } => {
                    if login == shared.local {
                        continue;
                    }

                    shared.note_join(login.clone(), nickname.clone(), capabilities);

                    let _ = events.send(SessionEvent::UserJoined { login, nickname });
                }
                ServerCommand::Bye { login, idle } => {
                    let now_empty = {
                        let mut roster = shared
                            .participants
                            .write()
                            .expect("participants lock poisoned");
                        roster.remove(&login);
                        roster.is_empty()
                    };

                    let _ = events.send(SessionEvent::UserParted { login, idle });

                    if now_empty {
                        shared.emit_once(&events, SessionCloseReason::Empty);
                        if let Some(connection) = connection.upgrade() {
                            connection.close().await;
                        }
                        break;
                    }
                }
                ServerCommand::Msg {
                    sender, payload, ..
                } => {
                    dispatch_message(&events, sender, &payload);
                }
                other => {
                    log::debug!("switchboard ignoring {}", other.name());
                }
            },
            ReaderEvent::Closed(_reason) => {
                shared.emit_once(&events, SessionCloseReason::Transport);
                break;
            }
        }
    }

    // Reader gone (connection closed under us): same terminal event.
    shared.emit_once(&events, SessionCloseReason::Transport);
}

/// Route an inbound `MSG` payload by content type.
fn dispatch_message(events: &mpsc::UnboundedSender<SessionEvent>, sender: Email, payload: &[u8]) {
    let message = Message::parse(payload);

    match message.media_type() {
        Some("text/plain") => {
            let _ = events.send(SessionEvent::MessageReceived { sender, message });
        }
        Some("text/x-msmsgscontrol") => {
            let login = message
                .header("TypingUser")
                .and_then(|value| Email::try_from(value).ok())
                .unwrap_or(sender);

            let _ = events.send(SessionEvent::TypingNotification { login });
        }
        _ => {
            let _ = events.send(SessionEvent::RawMessageReceived { sender, message });
        }
    }
}
