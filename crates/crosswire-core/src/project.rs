//! Projection of internal record states onto the harness status vocabulary.
//!
//! Under auto-acceptance the engine advances a connection past the state a
//! caller's poll was meant to observe before the caller's own request even
//! returns, so intermediate states are unassertable. The projector reports
//! the `N/A` sentinel for them and only commits to a concrete status once
//! the exchange has completed, at which point the legacy-protocol alias is
//! reported because the completion event of the legacy and modern protocol
//! variants is otherwise indistinguishable to the caller.
//!
//! With auto-acceptance disabled there is no race and the true state is
//! reported unchanged.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::record::{
    ConnectionRecord, DidExchangeState, LegacyConnectionState, ProofExchangeRecord, ProofState,
};

/// Whether the engine advances records without explicit accept commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAccept {
    /// Engine auto-advances; intermediate states are race-prone
    Enabled,
    /// Every transition requires an explicit command
    Disabled,
}

/// Externally reported connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatusState {
    /// Sentinel for states hidden because of auto-acceptance races
    NotApplicable,
    /// Legacy-protocol alias, reported once the exchange completed
    Legacy(LegacyConnectionState),
    /// True DID-exchange state, reported only without auto-acceptance
    Exchange(DidExchangeState),
}

impl fmt::Display for ConnectionStatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("N/A"),
            Self::Legacy(state) => state.fmt(f),
            Self::Exchange(state) => state.fmt(f),
        }
    }
}

impl Serialize for ConnectionStatusState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Harness-visible status of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Projected state (possibly the `N/A` sentinel)
    pub state: ConnectionStatusState,
    /// Canonical connection id
    pub connection_id: String,
}

/// Harness-visible status of a proof exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofStatus {
    /// Presentation exchange state, reported unchanged
    pub state: ProofState,
    /// Thread id shared by both parties
    pub thread_id: String,
    /// Verification outcome, present only once the exchange is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// Project a connection record onto the harness vocabulary.
pub fn project_connection(record: &ConnectionRecord, auto_accept: AutoAccept) -> ConnectionStatus {
    let state = match (record.state, auto_accept) {
        (DidExchangeState::Completed, _) => ConnectionStatusState::Legacy(
            record.legacy_state.unwrap_or(LegacyConnectionState::Complete),
        ),
        (_, AutoAccept::Enabled) => ConnectionStatusState::NotApplicable,
        (state, AutoAccept::Disabled) => ConnectionStatusState::Exchange(state),
    };

    ConnectionStatus { state, connection_id: record.connection_id.clone() }
}

/// Project a proof exchange record onto the harness vocabulary.
///
/// The state enumeration passes through unchanged; the verification result
/// is withheld until the exchange is done, even if the engine populated it
/// early.
pub fn project_proof(record: &ProofExchangeRecord) -> ProofStatus {
    ProofStatus {
        state: record.state,
        thread_id: record.thread_id.clone(),
        verified: if record.state == ProofState::Done { record.verified } else { None },
    }
}
