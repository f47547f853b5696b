//! Request/response correlation
//!
//! Responses may arrive in any order. Each outgoing request gets a fresh correlation
//! id and a parked one-shot slot; an incoming response fills the slot with the same id.

use crate::core::packet::Attachment;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct Correlator {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Attachment>>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and park a slot for its response
    pub fn begin(&self) -> (u64, oneshot::Receiver<Attachment>) {
        // Ids start at 1; 0 is left for unsolicited messages
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Route a response to whoever is waiting on its id.
    ///
    /// Returns false if nobody is waiting (unknown id, or the waiter gave up).
    pub fn complete(&self, response: Attachment) -> bool {
        let id = response.correlation_id;
        let Some(tx) = self.lock().remove(&id) else {
            warn!(correlation_id = id, "Response for unknown correlation id");
            return false;
        };
        if tx.send(response).is_err() {
            debug!(correlation_id = id, "Waiter dropped before response arrived");
            return false;
        }
        true
    }

    /// Forget a request, e.g. after a local timeout
    pub fn cancel(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Drop every waiter; their receivers observe a closed channel
    pub fn fail_all(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            debug!(count = drained.len(), "Failing pending requests");
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Attachment>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
