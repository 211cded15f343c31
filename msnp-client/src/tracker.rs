//! Transaction-id assignment and reply matching.
//!
//! Each outbound correlated command gets a fresh id from an atomic
//! counter. A oneshot slot is registered *before* the command is written
//! (the reply of a fast server must not race the subscription) and the
//! reader task completes the slot with the first inbound command that has
//! the matching id and either is a server error or carries an accepted
//! command name.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use msnp_types::{core::TrId, response::ServerCommand};
use tokio::sync::oneshot;

pub(crate) struct PendingReplies {
    next: Arc<AtomicU32>,
    slots: Mutex<HashMap<u32, Slot>>,
}

struct Slot {
    accept: Vec<&'static str>,
    tx: oneshot::Sender<ServerCommand>,
}

impl PendingReplies {
    /// `next` is shared so that a redirected login keeps its id sequence
    /// across NS hops.
    pub fn new(next: Arc<AtomicU32>) -> Self {
        Self {
            next,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Strictly increasing per counter; wraps are not expected within a
    /// session.
    pub fn assign(&self) -> TrId {
        TrId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Register interest in the reply to `trid`. Must happen before the
    /// command is written.
    pub fn register(
        &self,
        trid: TrId,
        accept: Vec<&'static str>,
    ) -> oneshot::Receiver<ServerCommand> {
        let (tx, rx) = oneshot::channel();

        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        slots.insert(trid.0, Slot { accept, tx });

        rx
    }

    /// Route an inbound command to its waiter, if any. Returns whether the
    /// command was consumed.
    pub fn try_complete(&self, command: &ServerCommand) -> bool {
        let Some(trid) = command.trid() else {
            return false;
        };

        let mut slots = self.slots.lock().expect("tracker lock poisoned");

        let matches = match slots.get(&trid.0) {
            Some(slot) => command.is_error() || slot.accept.contains(&command.name()),
            None => false,
        };
        if !matches {
            return false;
        }

        // The slot is single-use; a dropped receiver (timeout) just loses
        // the late reply.
        if let Some(slot) = slots.remove(&trid.0) {
            let _ = slot.tx.send(command.clone());
        }

        true
    }

    /// Forget a transaction (timeout or cancellation). The id is simply
    /// abandoned; a late reply is dispatched nowhere.
    pub fn abandon(&self, trid: TrId) {
        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        slots.remove(&trid.0);
    }

    /// Drop every slot; their receivers resolve with `RecvError`, which
    /// callers surface as `Closed`/`Cancelled`.
    pub fn fail_all(&self) {
        let mut slots = self.slots.lock().expect("tracker lock poisoned");
        slots.clear();
    }
}
