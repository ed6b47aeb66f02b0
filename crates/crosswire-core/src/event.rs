//! State-changed event snapshots.
//!
//! The engine emits one event per record state transition. Each event is an
//! immutable snapshot of the record at emission time; events for the same
//! record are ordered by emission and never reordered by the log.

use serde::{Deserialize, Serialize};

use crate::record::{ConnectionRecord, DidExchangeState, ProofExchangeRecord, ProofState};

/// An event that can be matched against a caller-supplied correlation id and
/// a target state.
///
/// This is the seam between the event log and the concrete protocol types:
/// the log replays and filters events without knowing which protocol they
/// belong to. `correlates_with` must accept every id field a caller could
/// legitimately hold for the record (primary id or alias).
pub trait CorrelatedEvent: Clone + Send + Sync + 'static {
    /// Protocol state enumeration carried by the event.
    type State: PartialEq + Clone + Send + Sync + std::fmt::Display;

    /// Whether this event's record is addressed by the given id.
    fn correlates_with(&self, correlation_id: &str) -> bool;

    /// The record's state at emission time.
    fn state(&self) -> &Self::State;
}

/// Snapshot of a connection record at a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStateChangedEvent {
    /// The connection as of this transition
    pub connection: ConnectionRecord,
    /// State before the transition, `None` for the first event of a record
    pub previous_state: Option<DidExchangeState>,
}

impl CorrelatedEvent for ConnectionStateChangedEvent {
    type State = DidExchangeState;

    /// Matches the connection's own id or the out-of-band id it was spawned
    /// from. Callers that issued an invitation only hold the out-of-band id
    /// until a request message materializes the connection.
    fn correlates_with(&self, correlation_id: &str) -> bool {
        self.connection.connection_id == correlation_id
            || self.connection.out_of_band_id.as_deref() == Some(correlation_id)
    }

    fn state(&self) -> &DidExchangeState {
        &self.connection.state
    }
}

/// Snapshot of a proof exchange record at a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStateChangedEvent {
    /// The proof exchange as of this transition
    pub proof: ProofExchangeRecord,
    /// State before the transition, `None` for the first event of a record
    pub previous_state: Option<ProofState>,
}

impl CorrelatedEvent for ProofStateChangedEvent {
    type State = ProofState;

    /// Proof exchanges are addressed by thread id only.
    fn correlates_with(&self, correlation_id: &str) -> bool {
        self.proof.thread_id == correlation_id
    }

    fn state(&self) -> &ProofState {
        &self.proof.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_event(connection_id: &str, out_of_band_id: Option<&str>) -> ConnectionStateChangedEvent {
        ConnectionStateChangedEvent {
            connection: ConnectionRecord {
                connection_id: connection_id.to_string(),
                out_of_band_id: out_of_band_id.map(str::to_string),
                state: DidExchangeState::RequestReceived,
                legacy_state: None,
                created_at: 0,
            },
            previous_state: None,
        }
    }

    #[test]
    fn connection_event_matches_either_id() {
        let event = connection_event("conn-1", Some("oob-1"));
        assert!(event.correlates_with("conn-1"));
        assert!(event.correlates_with("oob-1"));
        assert!(!event.correlates_with("oob-2"));
    }

    #[test]
    fn connection_event_without_oob_matches_primary_only() {
        let event = connection_event("conn-1", None);
        assert!(event.correlates_with("conn-1"));
        assert!(!event.correlates_with("oob-1"));
    }

    #[test]
    fn proof_event_matches_thread_id_only() {
        let event = ProofStateChangedEvent {
            proof: ProofExchangeRecord {
                proof_id: "proof-1".into(),
                thread_id: "thread-1".into(),
                state: ProofState::RequestReceived,
                verified: None,
            },
            previous_state: None,
        };
        assert!(event.correlates_with("thread-1"));
        assert!(!event.correlates_with("proof-1"));
    }
}
