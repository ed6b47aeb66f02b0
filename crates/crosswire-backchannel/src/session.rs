//! Per-test-session event-log lifecycle.
//!
//! A [`Session`] must be started before the test suite issues any command
//! that could trigger an awaited transition: subscription happens at
//! construction, so every event from that moment on is buffered and
//! replayable. Logs are scoped to the session and dropped with it; a new
//! session gets fresh logs rather than inheriting stale events.

use std::sync::Arc;
use std::time::Duration;

use crosswire_core::error::WaitError;
use crosswire_core::event::{
    ConnectionStateChangedEvent, CorrelatedEvent, ProofStateChangedEvent,
};
use crosswire_core::event_log::EventLog;
use crosswire_core::record::{DidExchangeState, ProofState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::engine::ProtocolEngine;

/// Deadline applied when a command does not specify its own.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20);

/// One test session over one engine instance.
///
/// Owns the per-protocol event logs and the pump tasks that feed them from
/// the engine's broadcast streams. Dropping the session aborts the pumps.
pub struct Session<E> {
    engine: Arc<E>,
    connection_events: EventLog<ConnectionStateChangedEvent>,
    proof_events: EventLog<ProofStateChangedEvent>,
    pumps: Vec<JoinHandle<()>>,
}

impl<E: ProtocolEngine> Session<E> {
    /// Start a session: create fresh logs and subscribe the engine's event
    /// streams into them.
    ///
    /// The broadcast receivers are taken synchronously here, before this
    /// function returns, so an event emitted by the very next command is
    /// already buffered for the pump even if its task has not polled yet.
    pub fn start(engine: Arc<E>) -> Self {
        let connection_events = EventLog::new();
        let proof_events = EventLog::new();

        let pumps = vec![
            spawn_pump("connection", engine.connection_events(), connection_events.clone()),
            spawn_pump("proof", engine.proof_events(), proof_events.clone()),
        ];

        Self { engine, connection_events, proof_events, pumps }
    }

    /// The engine this session drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The session's connection event log.
    pub fn connection_events(&self) -> &EventLog<ConnectionStateChangedEvent> {
        &self.connection_events
    }

    /// The session's proof event log.
    pub fn proof_events(&self) -> &EventLog<ProofStateChangedEvent> {
        &self.proof_events
    }

    /// Block until the connection addressed by `id` (connection id or
    /// out-of-band id) reaches `state`, replaying buffered events.
    ///
    /// # Errors
    ///
    /// [`WaitError::Timeout`] if the transition is not observed in time.
    pub async fn await_connection_state(
        &self,
        id: &str,
        state: DidExchangeState,
        timeout: Duration,
    ) -> Result<ConnectionStateChangedEvent, WaitError> {
        self.connection_events.wait_for(id, state, timeout).await
    }

    /// Block until the proof exchange with `thread_id` reaches `state`.
    ///
    /// # Errors
    ///
    /// [`WaitError::Timeout`] if the transition is not observed in time.
    pub async fn await_proof_state(
        &self,
        thread_id: &str,
        state: ProofState,
        timeout: Duration,
    ) -> Result<ProofStateChangedEvent, WaitError> {
        self.proof_events.wait_for(thread_id, state, timeout).await
    }
}

impl<E> Drop for Session<E> {
    fn drop(&mut self) {
        for pump in &self.pumps {
            pump.abort();
        }
    }
}

fn spawn_pump<Ev: CorrelatedEvent>(
    stream: &'static str,
    mut receiver: broadcast::Receiver<Ev>,
    log: EventLog<Ev>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log.publish(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Replay depth of the log is unbounded, but the broadcast
                    // channel between engine and pump is not. Losing events
                    // here breaks waiters, so make it visible.
                    tracing::warn!(stream, skipped, "event pump lagged, events lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
