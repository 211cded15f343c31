//! One framed connection: a reader task plus a single-writer sink.
//!
//! The reader task is the only thing that touches the receive side. Every
//! inbound command is offered, in wire order, to (1) the broadcast channel
//! for observers, (2) the transaction tracker, and — when no transaction
//! consumed it — (3) the owner's unsolicited queue. The tracker path is a
//! oneshot per transaction and can never drop; observers that lag are
//! dropped with a warning on their side.
//!
//! Writes go through an async mutex around the sink half: at most one
//! command is on the wire at a time, which keeps header+payload frames
//! contiguous.

use std::sync::{atomic::AtomicU32, Arc};

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use msnp_codec::tokio::{MsnpClientCodec, MsnpCodecError};
use msnp_types::{
    command::{Command, CommandBody},
    core::TrId,
    response::ServerCommand,
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time::Duration,
};
use tokio_util::codec::Framed;

use crate::{
    error::{Error, Result},
    tracker::PendingReplies,
    transport::Transport,
};

/// Observers that fall this far behind lose commands (with a warning).
const BROADCAST_CAPACITY: usize = 64;

type FramedTransport = Framed<Box<dyn Transport>, MsnpClientCodec>;
type CommandSink = SplitSink<FramedTransport, Command>;

/// Why the reader task ended.
#[derive(Debug)]
pub(crate) enum CloseReason {
    /// Clean EOF from the peer.
    Eof,
    /// Read failed.
    Transport(std::io::Error),
    /// Framing was irrecoverably lost.
    Protocol(String),
}

/// What the reader hands to the owning dispatch loop.
#[derive(Debug)]
pub(crate) enum ReaderEvent {
    /// An inbound command no transaction claimed.
    Command(ServerCommand),
    /// Terminal; sent exactly once.
    Closed(CloseReason),
}

pub(crate) struct Connection {
    writer: Mutex<CommandSink>,
    pending: Arc<PendingReplies>,
    observers: broadcast::Sender<ServerCommand>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Frame `transport` and spawn the reader task. The caller gets the
    /// unsolicited-command queue; `trid_counter` is shared so NS hops keep
    /// one id sequence.
    pub fn open(
        transport: Box<dyn Transport>,
        trid_counter: Arc<AtomicU32>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ReaderEvent>) {
        let framed = Framed::new(transport, MsnpClientCodec::new());
        let (sink, stream) = framed.split();

        let pending = Arc::new(PendingReplies::new(trid_counter));
        let (observers, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (unsolicited_tx, unsolicited_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(run_reader(
            stream,
            Arc::clone(&pending),
            observers.clone(),
            unsolicited_tx,
        ));

        let connection = Arc::new(Self {
            writer: Mutex::new(sink),
            pending,
            observers,
            reader,
        });

        (connection, unsolicited_rx)
    }

    /// Subscribe to every inbound command, in wire order, from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerCommand> {
        self.observers.subscribe()
    }

    /// Reserve the next transaction id without awaiting a reply (`MSG U`,
    /// the occasional fire-and-forget).
    pub fn assign_trid(&self) -> TrId {
        self.pending.assign()
    }

    /// Write one command under the single-writer lock.
    pub async fn send(&self, command: Command) -> Result<()> {
        log::trace!(">> {}", command.name());

        let mut writer = self.writer.lock().await;

        writer.send(command).await.map_err(|error| match error {
            MsnpCodecError::Io(error) => Error::Transport(error),
            other => Error::Protocol(other.to_string()),
        })
    }

    /// One request/reply round trip: assign an id, register the reply slot
    /// (before writing — a fast server must not win the race), write, and
    /// await the first matching reply under `timeout`.
    ///
    /// `accept` lists the command names that complete the transaction;
    /// server errors always do.
    pub async fn transaction(
        &self,
        body: CommandBody,
        accept: &[&'static str],
        timeout: Duration,
    ) -> Result<ServerCommand> {
        let trid = self.pending.assign();
        let accept = if accept.is_empty() {
            vec![body.name()]
        } else {
            accept.to_vec()
        };
        let rx = self.pending.register(trid, accept);

        let command = Command {
            trid: Some(trid),
            body,
        };
        if let Err(error) = self.send(command).await {
            self.pending.abandon(trid);
            return Err(error);
        }

        match tokio::time::timeout(timeout, rx).await {
            Err(_elapsed) => {
                // Abandoned, not retried; a late reply goes nowhere.
                self.pending.abandon(trid);
                Err(Error::Timeout)
            }
            // The slot was dropped wholesale: `close()`/`logout()` or the
            // reader tearing down.
            Ok(Err(_recv)) => Err(Error::Cancelled),
            Ok(Ok(ServerCommand::Error { code, .. })) => Err(Error::Server(code)),
            Ok(Ok(reply)) => Ok(reply),
        }
    }

    /// Shut the connection down: cancel pending transactions, stop the
    /// reader, close the transport. Idempotent.
    pub async fn close(&self) {
        self.pending.fail_all();
        self.reader.abort();

        let mut writer = self.writer.lock().await;
        let _ = writer.close().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn run_reader(
    mut stream: SplitStream<FramedTransport>,
    pending: Arc<PendingReplies>,
    observers: broadcast::Sender<ServerCommand>,
    unsolicited: mpsc::UnboundedSender<ReaderEvent>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(command)) => {
                log::trace!("<< {}", command.name());

                // Observers see everything, in wire order. `send` only
                // errs when nobody listens, which is fine.
                let _ = observers.send(command.clone());

                if pending.try_complete(&command) {
                    continue;
                }

                if unsolicited.send(ReaderEvent::Command(command)).is_err() {
                    // Owner is gone; stop reading.
                    break CloseReason::Eof;
                }
            }
            Some(Err(MsnpCodecError::ParsingFailed)) => {
                // Already logged by the codec; resume on the next line.
                continue;
            }
            Some(Err(MsnpCodecError::PayloadTooLarge { needed, limit })) => {
                break CloseReason::Protocol(format!(
                    "payload of {needed} bytes exceeds the {limit} byte limit"
                ));
            }
            Some(Err(MsnpCodecError::Io(error))) => break CloseReason::Transport(error),
            None => break CloseReason::Eof,
        }
    };

    pending.fail_all();
    let _ = unsolicited.send(ReaderEvent::Closed(reason));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use msnp_types::error::ServerError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    /// Read from `far` until the accumulated bytes end with `suffix`.
    async fn read_until(far: &mut tokio::io::DuplexStream, suffix: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 256];

        while !buf.ends_with(suffix) {
            let n = far.read(&mut chunk).await.unwrap();
            assert!(n > 0, "peer closed while waiting for {suffix:?}");
            buf.extend_from_slice(&chunk[..n]);
        }

        buf
    }

    fn open_pair() -> (
        Arc<Connection>,
        mpsc::UnboundedReceiver<ReaderEvent>,
        tokio::io::DuplexStream,
    ) {
        let (near, far) = tokio::io::duplex(4096);
        let (connection, events) =
            Connection::open(Box::new(near), Arc::new(AtomicU32::new(1)));

        (connection, events, far)
    }

    #[tokio::test]
    async fn test_transaction_reply_matching() {
        let (connection, _events, mut far) = open_pair();

        let server = tokio::spawn(async move {
            // Wait for the full QRY frame, then interleave unsolicited
            // noise before the reply.
            read_until(&mut far, b"0123456789abcdef0123456789abcdef").await;
            far.write_all(b"QNG 50\r\nFLN x@y.z\r\nQRY 1\r\n").await.unwrap();
            far
        });

        let reply = connection
            .transaction(
                CommandBody::Qry {
                    product_id: "msmsgs@msnmsgr.com".into(),
                    digest: "0123456789abcdef0123456789abcdef".into(),
                },
                &[],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(reply, ServerCommand::QryOk { trid: TrId(1) });
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_server_error() {
        let (connection, _events, mut far) = open_pair();

        tokio::spawn(async move {
            read_until(&mut far, b"\r\n").await;
            far.write_all(b"911 1\r\n").await.unwrap();
            far
        });

        let result = connection
            .transaction(CommandBody::ver(), &[], Duration::from_secs(5))
            .await;

        match result {
            Err(Error::Server(ServerError::AuthenticationFailed)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsolicited_commands_reach_owner() {
        let (_connection, mut events, mut far) = open_pair();

        far.write_all(b"FLN x@y.z\r\n").await.unwrap();

        match events.recv().await.unwrap() {
            ReaderEvent::Command(ServerCommand::Fln { login }) => {
                assert_eq!(login.as_str(), "x@y.z");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_eof_emits_closed_once() {
        let (_connection, mut events, far) = open_pair();

        drop(far);

        match events.recv().await.unwrap() {
            ReaderEvent::Closed(CloseReason::Eof) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(events.recv().await.is_none());
    }
}
