//! Harness-visible response shapes.
//!
//! Field names follow the backchannel protocol the conformance suite
//! expects. Connection and proof statuses reuse the projector's output
//! types from [`crosswire_core::project`].

use crosswire_core::record::DidExchangeState;
use serde::Serialize;

use crate::engine::InvitationMessage;

/// Response to creating an out-of-band invitation.
///
/// No connection exists at invitation time, so the out-of-band id stands in
/// for the connection id; later commands run it through the resolution
/// cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvitationResponse {
    /// Always `invitation-sent`
    pub state: DidExchangeState,
    /// The out-of-band id standing in for the not-yet-assigned connection id
    pub connection_id: String,
    /// The invitation message to hand to the other agent
    pub invitation: InvitationMessage,
}

/// Response to receiving an out-of-band invitation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveInvitationResponse {
    /// Always `invitation-received`
    pub state: DidExchangeState,
    /// The out-of-band id standing in for the not-yet-assigned connection id
    pub connection_id: String,
}

/// Response naming the connection a resolvable-DID exchange produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionIdResponse {
    /// Connection id, or the out-of-band id if no request has been
    /// processed yet
    pub connection_id: String,
}

/// Response naming the thread of a created presentation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofThreadResponse {
    /// Thread id correlating the proof exchange across both parties
    pub thread_id: String,
}
