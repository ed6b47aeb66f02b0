//! In-memory protocol engine for deterministic tests.
//!
//! Implements the full [`ProtocolEngine`] surface over plain vectors and a
//! seeded RNG. Inbound traffic from the (nonexistent) other agent is
//! injected through the `deliver_*` methods, which advance the relevant
//! record and emit the same state-changed events a real engine would.
//!
//! Auto-accept mode mirrors the real engine's race behavior: delivering an
//! exchange request immediately advances the record past `request-received`
//! without any caller involvement, which is exactly the situation the
//! status projector's `N/A` sentinel exists for.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use crosswire_backchannel::engine::{
    EngineError, InvitationAcceptance, InvitationMessage, ProofRequest, ProtocolEngine,
    RetrievedCredentials, SelectedCredentials,
};
use crosswire_core::event::{ConnectionStateChangedEvent, ProofStateChangedEvent};
use crosswire_core::project::AutoAccept;
use crosswire_core::record::{
    ConnectionRecord, DidExchangeState, LegacyConnectionState, OutOfBandRecord, OutOfBandRole,
    ProofExchangeRecord, ProofState,
};
use crosswire_core::resolve::{ConnectionLookup, OutOfBandLookup, ProofLookup};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

/// Event channel depth between engine and session pumps.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct EngineState {
    connections: Vec<ConnectionRecord>,
    out_of_band: Vec<OutOfBandRecord>,
    proofs: Vec<ProofExchangeRecord>,
    presented: Vec<(String, SelectedCredentials)>,
    next_sequence: u64,
    ids: ChaCha8Rng,
}

impl EngineState {
    fn mint_id(&mut self, prefix: &str) -> String {
        format!("{prefix}-{:016x}", self.ids.next_u64())
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// Configuration for a [`SimEngine`].
pub struct SimEngineBuilder {
    seed: u64,
    auto_accept: AutoAccept,
    verification_outcome: bool,
    credentials: RetrievedCredentials,
}

impl SimEngineBuilder {
    /// RNG seed for id minting; identical seeds produce identical ids.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Require explicit accept commands for every transition.
    pub fn manual_accept(mut self) -> Self {
        self.auto_accept = AutoAccept::Disabled;
        self
    }

    /// Outcome reported when a presentation is verified.
    pub fn verification_outcome(mut self, verified: bool) -> Self {
        self.verification_outcome = verified;
        self
    }

    /// Candidate credentials the engine offers for any presentation
    /// request.
    pub fn credentials(mut self, credentials: RetrievedCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Build the engine.
    pub fn build(self) -> SimEngine {
        SimEngine {
            state: Mutex::new(EngineState {
                connections: Vec::new(),
                out_of_band: Vec::new(),
                proofs: Vec::new(),
                presented: Vec::new(),
                next_sequence: 0,
                ids: ChaCha8Rng::seed_from_u64(self.seed),
            }),
            connection_tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            proof_tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            auto_accept: self.auto_accept,
            verification_outcome: self.verification_outcome,
            credentials: self.credentials,
        }
    }
}

/// Deterministic in-memory engine.
pub struct SimEngine {
    state: Mutex<EngineState>,
    connection_tx: broadcast::Sender<ConnectionStateChangedEvent>,
    proof_tx: broadcast::Sender<ProofStateChangedEvent>,
    auto_accept: AutoAccept,
    verification_outcome: bool,
    credentials: RetrievedCredentials,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    /// Auto-accepting engine with seed 0 and successful verification.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an engine.
    pub fn builder() -> SimEngineBuilder {
        SimEngineBuilder {
            seed: 0,
            auto_accept: AutoAccept::Enabled,
            verification_outcome: true,
            credentials: RetrievedCredentials::default(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_connection(&self, record: &ConnectionRecord, previous: Option<DidExchangeState>) {
        tracing::trace!(
            connection_id = %record.connection_id,
            state = %record.state,
            "connection state changed"
        );
        // No receiver just means no session is watching yet.
        let _ = self.connection_tx.send(ConnectionStateChangedEvent {
            connection: record.clone(),
            previous_state: previous,
        });
    }

    fn emit_proof(&self, record: &ProofExchangeRecord, previous: Option<ProofState>) {
        tracing::trace!(thread_id = %record.thread_id, state = %record.state, "proof state changed");
        let _ = self
            .proof_tx
            .send(ProofStateChangedEvent { proof: record.clone(), previous_state: previous });
    }

    /// Advance a connection to a new state and return the event snapshot.
    fn transition_connection(
        state: &mut EngineState,
        connection_id: &str,
        to: DidExchangeState,
    ) -> Result<(ConnectionRecord, DidExchangeState), EngineError> {
        let connection = state
            .connections
            .iter_mut()
            .find(|c| c.connection_id == connection_id)
            .ok_or_else(|| EngineError::RecordNotFound { id: connection_id.to_string() })?;

        let previous = connection.state;
        connection.state = to;
        if to == DidExchangeState::Completed {
            connection.legacy_state = Some(LegacyConnectionState::Complete);
        }
        Ok((connection.clone(), previous))
    }

    fn spawn_connection(
        state: &mut EngineState,
        out_of_band_id: &str,
        initial: DidExchangeState,
    ) -> ConnectionRecord {
        let connection = ConnectionRecord {
            connection_id: state.mint_id("conn"),
            out_of_band_id: Some(out_of_band_id.to_string()),
            state: initial,
            legacy_state: None,
            created_at: state.next_sequence(),
        };
        state.connections.push(connection.clone());

        if let Some(record) =
            state.out_of_band.iter_mut().find(|o| o.out_of_band_id == out_of_band_id)
        {
            record.connection_id.get_or_insert_with(|| connection.connection_id.clone());
        }

        connection
    }

    /// Inject the other agent's exchange request for one of our
    /// invitations.
    ///
    /// Creates the connection in `request-received`. With auto-accept the
    /// engine races ahead and sends its response immediately, landing in
    /// `response-sent` before any caller can poll.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if no out-of-band record matches.
    pub fn deliver_connection_request(
        &self,
        out_of_band_id: &str,
    ) -> Result<ConnectionRecord, EngineError> {
        let (connection, auto_advanced) = {
            let mut state = self.lock();
            if !state.out_of_band.iter().any(|o| o.out_of_band_id == out_of_band_id) {
                return Err(EngineError::RecordNotFound { id: out_of_band_id.to_string() });
            }

            let connection = Self::spawn_connection(
                &mut state,
                out_of_band_id,
                DidExchangeState::RequestReceived,
            );

            let auto_advanced = match self.auto_accept {
                AutoAccept::Enabled => Some(Self::transition_connection(
                    &mut state,
                    &connection.connection_id,
                    DidExchangeState::ResponseSent,
                )?),
                AutoAccept::Disabled => None,
            };
            (connection, auto_advanced)
        };

        self.emit_connection(&connection, None);
        let mut latest = connection;
        if let Some((advanced, previous)) = auto_advanced {
            self.emit_connection(&advanced, Some(previous));
            latest = advanced;
        }
        Ok(latest)
    }

    /// Inject the inviter's exchange response for our pending request.
    ///
    /// With auto-accept the engine sends its complete message on receipt
    /// and the connection finishes immediately.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for an unknown connection, `InvalidState` if no
    /// request is outstanding.
    pub fn deliver_connection_response(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, EngineError> {
        let transitions = {
            let mut state = self.lock();
            let current = state
                .connections
                .iter()
                .find(|c| c.connection_id == connection_id)
                .map(|c| c.state)
                .ok_or_else(|| EngineError::RecordNotFound { id: connection_id.to_string() })?;
            if current != DidExchangeState::RequestSent {
                return Err(EngineError::InvalidState {
                    operation: "deliver_connection_response",
                    state: current.to_string(),
                });
            }

            let mut transitions = vec![Self::transition_connection(
                &mut state,
                connection_id,
                DidExchangeState::ResponseReceived,
            )?];
            if self.auto_accept == AutoAccept::Enabled {
                transitions.push(Self::transition_connection(
                    &mut state,
                    connection_id,
                    DidExchangeState::Completed,
                )?);
            }
            transitions
        };

        let mut latest = None;
        for (record, previous) in transitions {
            self.emit_connection(&record, Some(previous));
            latest = Some(record);
        }
        latest.ok_or_else(|| EngineError::RecordNotFound { id: connection_id.to_string() })
    }

    /// Inject the invitee's complete message, finishing the exchange.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for an unknown connection, `InvalidState` unless a
    /// response has been sent.
    pub fn deliver_connection_complete(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, EngineError> {
        let (record, previous) = {
            let mut state = self.lock();
            let current = state
                .connections
                .iter()
                .find(|c| c.connection_id == connection_id)
                .map(|c| c.state)
                .ok_or_else(|| EngineError::RecordNotFound { id: connection_id.to_string() })?;
            if current != DidExchangeState::ResponseSent {
                return Err(EngineError::InvalidState {
                    operation: "deliver_connection_complete",
                    state: current.to_string(),
                });
            }
            Self::transition_connection(&mut state, connection_id, DidExchangeState::Completed)?
        };

        self.emit_connection(&record, Some(previous));
        Ok(record)
    }

    /// Inject a presentation request from a verifier, creating the
    /// prover-side proof record under the verifier's thread id.
    pub fn deliver_proof_request(&self, thread_id: &str) -> ProofExchangeRecord {
        let proof = {
            let mut state = self.lock();
            let proof = ProofExchangeRecord {
                proof_id: state.mint_id("proof"),
                thread_id: thread_id.to_string(),
                state: ProofState::RequestReceived,
                verified: None,
            };
            state.proofs.push(proof.clone());
            proof
        };

        self.emit_proof(&proof, None);
        proof
    }

    /// Inject the prover's presentation for one of our requests.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` for an unknown thread, `InvalidState` unless the
    /// request is outstanding.
    pub fn deliver_presentation(&self, thread_id: &str) -> Result<ProofExchangeRecord, EngineError> {
        let (proof, previous) = {
            let mut state = self.lock();
            let proof = state
                .proofs
                .iter_mut()
                .find(|p| p.thread_id == thread_id)
                .ok_or_else(|| EngineError::RecordNotFound { id: thread_id.to_string() })?;
            if proof.state != ProofState::RequestSent {
                return Err(EngineError::InvalidState {
                    operation: "deliver_presentation",
                    state: proof.state.to_string(),
                });
            }
            let previous = proof.state;
            proof.state = ProofState::PresentationReceived;
            (proof.clone(), previous)
        };

        self.emit_proof(&proof, Some(previous));
        Ok(proof)
    }

    /// Credentials the engine recorded when a presentation was sent, by
    /// proof id. Oracle helper.
    pub fn presented_credentials(&self, proof_id: &str) -> Option<SelectedCredentials> {
        self.lock()
            .presented
            .iter()
            .find(|(id, _)| id == proof_id)
            .map(|(_, credentials)| credentials.clone())
    }
}

#[async_trait]
impl ConnectionLookup for SimEngine {
    async fn connection_by_id(&self, connection_id: &str) -> Option<ConnectionRecord> {
        self.lock().connections.iter().find(|c| c.connection_id == connection_id).cloned()
    }

    async fn connections_by_out_of_band_id(&self, out_of_band_id: &str) -> Vec<ConnectionRecord> {
        // Push order is creation order.
        self.lock()
            .connections
            .iter()
            .filter(|c| c.out_of_band_id.as_deref() == Some(out_of_band_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OutOfBandLookup for SimEngine {
    async fn out_of_band_by_id(&self, out_of_band_id: &str) -> Option<OutOfBandRecord> {
        self.lock().out_of_band.iter().find(|o| o.out_of_band_id == out_of_band_id).cloned()
    }

    async fn out_of_band_by_invitation_id(&self, invitation_id: &str) -> Option<OutOfBandRecord> {
        self.lock().out_of_band.iter().find(|o| o.invitation_id == invitation_id).cloned()
    }
}

#[async_trait]
impl ProofLookup for SimEngine {
    async fn proofs(&self) -> Vec<ProofExchangeRecord> {
        self.lock().proofs.clone()
    }
}

#[async_trait]
impl ProtocolEngine for SimEngine {
    async fn create_invitation(
        &self,
        label: &str,
    ) -> Result<(OutOfBandRecord, InvitationMessage), EngineError> {
        let (record, invitation) = {
            let mut state = self.lock();
            let out_of_band_id = state.mint_id("oob");
            let invitation_id = state.mint_id("invite");

            let record = OutOfBandRecord {
                out_of_band_id,
                invitation_id: invitation_id.clone(),
                connection_id: None,
                role: OutOfBandRole::Sender,
            };
            state.out_of_band.push(record.clone());

            let invitation = InvitationMessage {
                invitation_id,
                label: label.to_string(),
                services: vec![format!("sim://{}", record.out_of_band_id)],
            };
            (record, invitation)
        };

        Ok((record, invitation))
    }

    async fn receive_invitation(
        &self,
        invitation: InvitationMessage,
        acceptance: InvitationAcceptance,
    ) -> Result<OutOfBandRecord, EngineError> {
        let (record, connection) = {
            let mut state = self.lock();
            let out_of_band_id = state.mint_id("oob");
            let mut record = OutOfBandRecord {
                out_of_band_id: out_of_band_id.clone(),
                invitation_id: invitation.invitation_id,
                connection_id: None,
                role: OutOfBandRole::Receiver,
            };
            state.out_of_band.push(record.clone());

            let connection = match acceptance {
                InvitationAcceptance::Auto => {
                    let connection = Self::spawn_connection(
                        &mut state,
                        &out_of_band_id,
                        DidExchangeState::RequestSent,
                    );
                    record.connection_id = Some(connection.connection_id.clone());
                    Some(connection)
                }
                InvitationAcceptance::Manual => None,
            };
            (record, connection)
        };

        if let Some(connection) = &connection {
            self.emit_connection(connection, None);
        }
        Ok(record)
    }

    async fn accept_invitation(&self, out_of_band_id: &str) -> Result<OutOfBandRecord, EngineError> {
        let (record, connection) = {
            let mut state = self.lock();
            let record = state
                .out_of_band
                .iter()
                .find(|o| o.out_of_band_id == out_of_band_id)
                .cloned()
                .ok_or_else(|| EngineError::RecordNotFound { id: out_of_band_id.to_string() })?;

            if record.connection_id.is_some() {
                // Already accepted; nothing to do.
                (record, None)
            } else {
                let connection = Self::spawn_connection(
                    &mut state,
                    out_of_band_id,
                    DidExchangeState::RequestSent,
                );
                let mut record = record;
                record.connection_id = Some(connection.connection_id.clone());
                (record, Some(connection))
            }
        };

        if let Some(connection) = &connection {
            self.emit_connection(connection, None);
        }
        Ok(record)
    }

    async fn accept_connection_request(
        &self,
        connection_id: &str,
    ) -> Result<ConnectionRecord, EngineError> {
        let (record, previous) = {
            let mut state = self.lock();
            let current = state
                .connections
                .iter()
                .find(|c| c.connection_id == connection_id)
                .map(|c| c.state)
                .ok_or_else(|| EngineError::RecordNotFound { id: connection_id.to_string() })?;
            if current != DidExchangeState::RequestReceived {
                return Err(EngineError::InvalidState {
                    operation: "accept_connection_request",
                    state: current.to_string(),
                });
            }
            Self::transition_connection(&mut state, connection_id, DidExchangeState::ResponseSent)?
        };

        self.emit_connection(&record, Some(previous));
        Ok(record)
    }

    async fn create_proof_request(
        &self,
        request: ProofRequest,
    ) -> Result<ProofExchangeRecord, EngineError> {
        tracing::debug!(name = %request.name, "creating connection-less proof request");
        let proof = {
            let mut state = self.lock();
            let proof = ProofExchangeRecord {
                proof_id: state.mint_id("proof"),
                thread_id: state.mint_id("thread"),
                state: ProofState::RequestSent,
                verified: None,
            };
            state.proofs.push(proof.clone());
            proof
        };

        self.emit_proof(&proof, None);
        Ok(proof)
    }

    async fn request_proof(
        &self,
        connection_id: &str,
        request: ProofRequest,
        comment: Option<String>,
    ) -> Result<ProofExchangeRecord, EngineError> {
        tracing::debug!(connection_id, name = %request.name, ?comment, "sending proof request");
        let proof = {
            let mut state = self.lock();
            if !state.connections.iter().any(|c| c.connection_id == connection_id) {
                return Err(EngineError::RecordNotFound { id: connection_id.to_string() });
            }
            let proof = ProofExchangeRecord {
                proof_id: state.mint_id("proof"),
                thread_id: state.mint_id("thread"),
                state: ProofState::RequestSent,
                verified: None,
            };
            state.proofs.push(proof.clone());
            proof
        };

        self.emit_proof(&proof, None);
        Ok(proof)
    }

    async fn credentials_for_proof(
        &self,
        proof_id: &str,
    ) -> Result<RetrievedCredentials, EngineError> {
        let known = self.lock().proofs.iter().any(|p| p.proof_id == proof_id);
        if !known {
            return Err(EngineError::RecordNotFound { id: proof_id.to_string() });
        }
        Ok(self.credentials.clone())
    }

    async fn accept_proof_request(
        &self,
        proof_id: &str,
        credentials: SelectedCredentials,
        comment: Option<String>,
    ) -> Result<ProofExchangeRecord, EngineError> {
        tracing::debug!(proof_id, ?comment, "accepting proof request");
        let (proof, previous) = {
            let mut state = self.lock();
            let proof = state
                .proofs
                .iter_mut()
                .find(|p| p.proof_id == proof_id)
                .ok_or_else(|| EngineError::RecordNotFound { id: proof_id.to_string() })?;
            if proof.state != ProofState::RequestReceived {
                return Err(EngineError::InvalidState {
                    operation: "accept_proof_request",
                    state: proof.state.to_string(),
                });
            }
            let previous = proof.state;
            proof.state = ProofState::PresentationSent;
            let proof = proof.clone();
            state.presented.push((proof_id.to_string(), credentials));
            (proof, previous)
        };

        self.emit_proof(&proof, Some(previous));
        Ok(proof)
    }

    async fn accept_presentation(&self, proof_id: &str) -> Result<ProofExchangeRecord, EngineError> {
        let (proof, previous) = {
            let mut state = self.lock();
            let proof = state
                .proofs
                .iter_mut()
                .find(|p| p.proof_id == proof_id)
                .ok_or_else(|| EngineError::RecordNotFound { id: proof_id.to_string() })?;
            if proof.state != ProofState::PresentationReceived {
                return Err(EngineError::InvalidState {
                    operation: "accept_presentation",
                    state: proof.state.to_string(),
                });
            }
            let previous = proof.state;
            proof.state = ProofState::Done;
            proof.verified = Some(self.verification_outcome);
            (proof.clone(), previous)
        };

        self.emit_proof(&proof, Some(previous));
        Ok(proof)
    }

    fn auto_accept(&self) -> AutoAccept {
        self.auto_accept
    }

    fn connection_events(&self) -> broadcast::Receiver<ConnectionStateChangedEvent> {
        self.connection_tx.subscribe()
    }

    fn proof_events(&self) -> broadcast::Receiver<ProofStateChangedEvent> {
        self.proof_tx.subscribe()
    }
}
