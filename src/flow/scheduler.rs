//! Cancelable delayed transitions.
//!
//! Each scheduled transition is a tokio task that sleeps and then posts the
//! transition back to the owning session. Only transitions whose handle is
//! still pending when they arrive are applied, so cancelling is reliable
//! even for a task that already fired.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::node::NodeId;

/// A deferred step of the dialog engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Make a node current: cancels everything pending, then reveals it.
    Enter(NodeId),
    /// Show the current node's prompt and its options or input.
    Reveal(NodeId),
    /// Show a node's prompt only (a step of a sequence).
    Narrate(NodeId),
}

impl Transition {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Enter(id) | Self::Reveal(id) | Self::Narrate(id) => *id,
        }
    }
}

/// Handle to one scheduled transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

#[derive(Debug)]
struct Fired {
    handle: ScheduleHandle,
    transition: Transition,
}

/// Owns the live set of scheduled transitions for one session.
#[derive(Debug)]
pub struct TransitionScheduler {
    tx: mpsc::UnboundedSender<Fired>,
    rx: mpsc::UnboundedReceiver<Fired>,
    next_id: u64,
    pending: HashMap<ScheduleHandle, JoinHandle<()>>,
}

impl Default for TransitionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            next_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Fire `transition` after `delay`. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, transition: Transition, delay: Duration) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_id);
        self.next_id += 1;

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Fired { handle, transition });
        });
        self.pending.insert(handle, task);

        tracing::trace!(?transition, ?delay, "Scheduled transition");
        handle
    }

    /// Cancel one transition. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, handle: ScheduleHandle) -> bool {
        match self.pending.remove(&handle) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending transition, returning how many were live.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, task) in self.pending.drain() {
            task.abort();
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled scheduled transitions");
        }
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Wait for the next live transition. Returns `None` once nothing is
    /// pending.
    pub async fn next_fired(&mut self) -> Option<Transition> {
        loop {
            let fired = match self.rx.try_recv() {
                Ok(fired) => fired,
                Err(_) if self.pending.is_empty() => return None,
                Err(_) => self.rx.recv().await?,
            };
            if self.pending.remove(&fired.handle).is_some() {
                return Some(fired.transition);
            }
        }
    }
}

impl Drop for TransitionScheduler {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}
