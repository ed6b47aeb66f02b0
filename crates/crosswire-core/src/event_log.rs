//! Append-only, multi-reader event log with deadline-bounded waiters.
//!
//! The engine emits state-changed events on its own schedule, possibly
//! before any caller is watching. A single-consumer channel would lose those
//! events, so the log buffers everything from the moment it is created and
//! gives every waiter an independent read cursor over the same sequence
//! (replay-then-filter). One log is created per protocol type per test
//! session; replay depth is unbounded for the session's lifetime.
//!
//! The producer never blocks on a slow waiter: `publish` appends under a
//! briefly-held mutex and bumps a version counter. Waiters rescan from their
//! private cursor whenever the version changes, so no event is consumed or
//! hidden from another waiter.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until, timeout_at};

use crate::error::WaitError;
use crate::event::CorrelatedEvent;

struct Shared<E> {
    events: Mutex<Vec<E>>,
    version: watch::Sender<u64>,
}

/// Buffered log of state-changed events for one protocol type.
///
/// Cloning the log produces another handle to the same buffer; the engine
/// pump holds one clone as the producer, command handlers hold others as
/// consumers. Buffering starts at construction, so the log must exist before
/// any command that could trigger an awaited transition is issued.
pub struct EventLog<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EventLog<E> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<E> Default for EventLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventLog<E> {
    /// Create an empty log and start the buffering window.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self { shared: Arc::new(Shared { events: Mutex::new(Vec::new()), version }) }
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    /// Whether no event has been published yet.
    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    fn lock_events(&self) -> std::sync::MutexGuard<'_, Vec<E>> {
        // A poisoned lock only means another thread panicked mid-push; the
        // buffer itself is still a valid Vec.
        self.shared.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: CorrelatedEvent> EventLog<E> {
    /// Append an event and wake all parked waiters.
    pub fn publish(&self, event: E) {
        let mut events = self.lock_events();
        events.push(event);
        let sequence = events.len();
        drop(events);

        tracing::trace!(sequence, "event appended to log");
        self.shared.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Snapshot of every buffered event, in emission order.
    pub fn snapshot(&self) -> Vec<E> {
        self.lock_events().clone()
    }

    /// Block until an event for `correlation_id` with state `target` is
    /// observed, replaying events buffered before the call.
    ///
    /// Scans the event sequence in emission order and returns the first
    /// event that correlates with the id (by primary or alias id, per
    /// [`CorrelatedEvent::correlates_with`]) and whose state equals the
    /// target. Later events for the same record do not disturb the result,
    /// and a record that passed through the target state before this call
    /// is still matched.
    ///
    /// # Errors
    ///
    /// [`WaitError::Timeout`] if no matching event arrives within `timeout`.
    /// There is no cross-state satisfaction: a record that reaches a
    /// different terminal state still times out.
    pub async fn wait_for(
        &self,
        correlation_id: &str,
        target: E::State,
        timeout: Duration,
    ) -> Result<E, WaitError> {
        let deadline = Instant::now() + timeout;
        // Subscribe before the first scan so a publish between scan and park
        // is observed as a version change.
        let mut version = self.shared.version.subscribe();
        let mut cursor = 0;

        loop {
            {
                let events = self.lock_events();
                while cursor < events.len() {
                    let event = &events[cursor];
                    cursor += 1;
                    if event.correlates_with(correlation_id) && *event.state() == target {
                        return Ok(event.clone());
                    }
                }
            }

            match timeout_at(deadline, version.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    // Producer side dropped; no further events can arrive.
                    sleep_until(deadline).await;
                    return Err(self.timeout_error(correlation_id, &target, timeout));
                }
                Err(_) => return Err(self.timeout_error(correlation_id, &target, timeout)),
            }
        }
    }

    fn timeout_error(&self, correlation_id: &str, target: &E::State, timeout: Duration) -> WaitError {
        WaitError::Timeout {
            correlation_id: correlation_id.to_string(),
            target_state: target.to_string(),
            timeout,
        }
    }
}
