use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{CdpError, CdpResult};

pub(crate) type CallOutcome = CdpResult<Value>;

// Owns the id sequence too, so id assignment and waiter registration are one
// step and two in-flight calls can never share an id.
pub(crate) struct PendingCalls {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self) -> CdpResult<(u64, oneshot::Receiver<CallOutcome>)> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let mut waiters = self
            .waiters
            .lock()
            .map_err(|_| CdpError::Internal("pending-call table lock poisoned".to_string()))?;
        waiters.insert(id, tx);
        Ok((id, rx))
    }

    pub(crate) fn complete(&self, id: u64, outcome: CallOutcome) -> bool {
        let waiter = match self.waiters.lock() {
            Ok(mut waiters) => waiters.remove(&id),
            Err(_) => None,
        };
        match waiter {
            Some(tx) => {
                // The receiver may be gone if the caller stopped waiting.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    // A response arriving after this finds no entry and is discarded.
    pub(crate) fn forget(&self, id: u64) {
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.remove(&id);
        }
    }

    pub(crate) fn fail_all(&self) {
        let drained: Vec<_> = match self.waiters.lock() {
            Ok(mut waiters) => waiters.drain().collect(),
            Err(_) => return,
        };
        if !drained.is_empty() {
            debug!("failing {} pending calls on disconnect", drained.len());
        }
        for (id, tx) in drained {
            trace!(id, "rejecting pending call: connection closed");
            let _ = tx.send(Err(CdpError::ConnectionClosed));
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.lock().map(|waiters| waiters.len()).unwrap_or(0)
    }
}
