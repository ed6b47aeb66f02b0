//! Interface the protocol engine must expose to the backchannel.
//!
//! The engine is a black box: it owns the record stores, runs the DID
//! exchange and presentation state machines, and emits a state-changed
//! event for every transition. The backchannel only needs the operations
//! below plus the read-only lookups from [`crosswire_core::resolve`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use crosswire_core::event::{ConnectionStateChangedEvent, ProofStateChangedEvent};
use crosswire_core::project::AutoAccept;
use crosswire_core::record::{ConnectionRecord, OutOfBandRecord, ProofExchangeRecord};
use crosswire_core::resolve::{ConnectionLookup, OutOfBandLookup, ProofLookup};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// An out-of-band invitation message as exchanged between agents.
///
/// The message id is distinct from the id of the out-of-band record an
/// engine creates when issuing or receiving it; callers may later address
/// the exchange by either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationMessage {
    /// Identifier of the invitation message itself
    pub invitation_id: String,
    /// Human-readable label for the inviter
    pub label: String,
    /// Service endpoints or resolvable DIDs to reach the inviter
    pub services: Vec<String>,
}

/// Whether the engine should respond to a received invitation on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAcceptance {
    /// Send the exchange request immediately on receipt
    Auto,
    /// Hold until an explicit accept command
    Manual,
}

/// One requested attribute of a presentation request, keyed by referent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name the prover must reveal
    pub name: String,
}

/// One requested predicate of a presentation request, keyed by referent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    /// Attribute name the predicate ranges over
    pub name: String,
    /// Predicate operator, e.g. `>=`
    pub predicate: String,
    /// Threshold value
    pub threshold: i64,
}

/// A presentation request as supplied by the test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    /// Request name
    pub name: String,
    /// Request version string
    pub version: String,
    /// Requested attributes by referent
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    /// Requested predicates by referent
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,
}

/// A credential the engine holds that could satisfy one referent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCandidate {
    /// Identifier of the credential in the holder's wallet
    pub credential_id: String,
    /// Whether the credential has been revoked. Revoked candidates are
    /// still offered: some conformance tests present a revoked credential
    /// and expect verification to fail.
    pub revoked: bool,
}

/// Candidate credentials per referent, as retrieved from the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedCredentials {
    /// Attribute referent -> candidates
    pub attributes: BTreeMap<String, Vec<CredentialCandidate>>,
    /// Predicate referent -> candidates
    pub predicates: BTreeMap<String, Vec<CredentialCandidate>>,
}

/// The resolved credential selection handed back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedCredentials {
    /// Attribute referent -> the one chosen candidate
    pub attributes: BTreeMap<String, CredentialCandidate>,
    /// Predicate referent -> the one chosen candidate
    pub predicates: BTreeMap<String, CredentialCandidate>,
    /// Self-attested attribute values by referent
    pub self_attested: BTreeMap<String, String>,
}

/// Failures reported by the engine's own operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The operation referenced a record the engine does not hold
    #[error("engine has no record {id}")]
    RecordNotFound {
        /// The unknown record id
        id: String,
    },

    /// The record exists but its state machine forbids the operation
    #[error("operation {operation} not allowed in state {state}")]
    InvalidState {
        /// The attempted operation
        operation: &'static str,
        /// The record's current state
        state: String,
    },

    /// The engine refused the operation outright
    #[error("engine rejected operation: {reason}")]
    Rejected {
        /// Engine-supplied reason
        reason: String,
    },
}

/// Operations and event streams of the protocol engine.
///
/// The lookup supertraits give the resolution cascade its read-only view of
/// the engine's stores; all mutation goes through the async operations,
/// whose effects the backchannel observes via the event streams.
#[async_trait]
pub trait ProtocolEngine:
    ConnectionLookup + OutOfBandLookup + ProofLookup + Send + Sync + 'static
{
    /// Create and publish an out-of-band invitation.
    async fn create_invitation(
        &self,
        label: &str,
    ) -> Result<(OutOfBandRecord, InvitationMessage), EngineError>;

    /// Process a received invitation into an out-of-band record.
    async fn receive_invitation(
        &self,
        invitation: InvitationMessage,
        acceptance: InvitationAcceptance,
    ) -> Result<OutOfBandRecord, EngineError>;

    /// Accept a previously received invitation, sending the exchange
    /// request.
    async fn accept_invitation(&self, out_of_band_id: &str) -> Result<OutOfBandRecord, EngineError>;

    /// Accept a received exchange request, sending the exchange response.
    async fn accept_connection_request(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, EngineError>;

    /// Create a connection-less presentation request.
    async fn create_proof_request(
        &self,
        request: ProofRequest,
    ) -> Result<ProofExchangeRecord, EngineError>;

    /// Send a presentation request over an established connection.
    async fn request_proof(
        &self,
        connection_id: &str,
        request: ProofRequest,
        comment: Option<String>,
    ) -> Result<ProofExchangeRecord, EngineError>;

    /// Candidate credentials that could satisfy a received presentation
    /// request.
    async fn credentials_for_proof(
        &self,
        proof_id: &str,
    ) -> Result<RetrievedCredentials, EngineError>;

    /// Accept a received presentation request with the given selection,
    /// sending the presentation.
    async fn accept_proof_request(
        &self,
        proof_id: &str,
        credentials: SelectedCredentials,
        comment: Option<String>,
    ) -> Result<ProofExchangeRecord, EngineError>;

    /// Accept and verify a received presentation.
    async fn accept_presentation(
        &self,
        proof_id: &str,
    ) -> Result<ProofExchangeRecord, EngineError>;

    /// Whether this engine auto-advances records without explicit accepts.
    /// Drives the state projection sentinel.
    fn auto_accept(&self) -> AutoAccept;

    /// Subscribe to connection state-changed events. Every transition from
    /// the moment of subscription onward is delivered.
    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChangedEvent>;

    /// Subscribe to proof state-changed events.
    fn proof_events(&self) -> broadcast::Receiver<ProofStateChangedEvent>;
}
