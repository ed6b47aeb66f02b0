//! Record snapshots owned by the protocol engine.
//!
//! The engine creates and mutates these records through its own state
//! machines; the coordination core only ever reads them. Identifiers are
//! deliberately untyped strings: a caller-supplied id may be a connection id,
//! an out-of-band id, or an invitation id depending on how far the exchange
//! has progressed, and the resolution cascade exists precisely to interpret
//! them (see [`crate::resolve`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// DID exchange protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DidExchangeState {
    /// Invitation created and published, no response yet
    InvitationSent,
    /// Invitation received from the other party
    InvitationReceived,
    /// Exchange request sent to the inviter
    RequestSent,
    /// Exchange request received from the invitee
    RequestReceived,
    /// Exchange response sent to the invitee
    ResponseSent,
    /// Exchange response received from the inviter
    ResponseReceived,
    /// Exchange complete, connection usable
    Completed,
    /// Exchange terminated before completion
    Abandoned,
}

impl fmt::Display for DidExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvitationSent => "invitation-sent",
            Self::InvitationReceived => "invitation-received",
            Self::RequestSent => "request-sent",
            Self::RequestReceived => "request-received",
            Self::ResponseSent => "response-sent",
            Self::ResponseReceived => "response-received",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

/// Legacy connection-protocol state alias (RFC 0160 vocabulary).
///
/// The completion event of the legacy and modern exchange variants is
/// indistinguishable to the test suite, so completed connections report this
/// alias instead of the DID-exchange state name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyConnectionState {
    /// Invitation exchanged
    Invited,
    /// Connection request exchanged
    Requested,
    /// Connection response exchanged
    Responded,
    /// Connection established
    Complete,
}

impl fmt::Display for LegacyConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Invited => "invited",
            Self::Requested => "requested",
            Self::Responded => "responded",
            Self::Complete => "complete",
        };
        f.write_str(label)
    }
}

/// A connection in progress or established.
///
/// Created by the engine when an exchange request is processed (never at
/// invitation time), mutated only by the engine's state machine, and never
/// deleted during a harness session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Canonical connection identifier
    pub connection_id: String,
    /// Out-of-band record this connection was spawned from, if any
    pub out_of_band_id: Option<String>,
    /// Current DID exchange state
    pub state: DidExchangeState,
    /// Legacy-protocol alias, meaningful only once `state` is `Completed`
    pub legacy_state: Option<LegacyConnectionState>,
    /// Monotone creation sequence number assigned by the engine.
    ///
    /// Orders connections spawned from the same out-of-band record so the
    /// resolution cascade can break ties deterministically.
    pub created_at: u64,
}

/// Which side of the invitation this out-of-band record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfBandRole {
    /// We created and published the invitation
    Sender,
    /// We received the invitation from the other party
    Receiver,
}

/// Provisional record for an issued or received invitation.
///
/// Exists from invitation creation or receipt until a connection supersedes
/// it. Note the two distinct identifiers: the record's own id and the id of
/// the invitation message it was created from. Callers may hold either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfBandRecord {
    /// The out-of-band record's own identifier
    pub out_of_band_id: String,
    /// Identifier of the invitation message this record was created from
    pub invitation_id: String,
    /// The spawned connection, once an exchange request has been processed
    pub connection_id: Option<String>,
    /// Whether we issued or received the invitation
    pub role: OutOfBandRole,
}

/// Presentation exchange protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProofState {
    /// Presentation request sent to the prover
    RequestSent,
    /// Presentation request received from the verifier
    RequestReceived,
    /// Presentation sent to the verifier
    PresentationSent,
    /// Presentation received from the prover
    PresentationReceived,
    /// Exchange finished, verification result available
    Done,
    /// Exchange terminated before completion
    Abandoned,
}

impl fmt::Display for ProofState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RequestSent => "request-sent",
            Self::RequestReceived => "request-received",
            Self::PresentationSent => "presentation-sent",
            Self::PresentationReceived => "presentation-received",
            Self::Done => "done",
            Self::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

/// A presentation exchange between verifier and prover.
///
/// Both parties correlate the exchange by `thread_id`, which is shared
/// across all messages of one proof exchange. Immutable once `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofExchangeRecord {
    /// Local record identifier
    pub proof_id: String,
    /// Thread identifier shared by both parties
    pub thread_id: String,
    /// Current presentation exchange state
    pub state: ProofState,
    /// Verification outcome, set only once `state` is `Done`
    pub verified: Option<bool>,
}
