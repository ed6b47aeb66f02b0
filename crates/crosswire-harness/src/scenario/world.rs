//! World state accumulated while a scenario runs.

use crosswire_core::project::{ConnectionStatus, ProofStatus};

/// Everything a scenario observed, handed to the oracle at the end.
///
/// Ids are filled in as steps discover them; every recorded status is kept
/// in order so oracles can assert on intermediate projections, not just the
/// final one.
#[derive(Debug, Default)]
pub struct World {
    out_of_band_id: Option<String>,
    invitation_id: Option<String>,
    connection_id: Option<String>,
    thread_id: Option<String>,
    connection_statuses: Vec<ConnectionStatus>,
    proof_statuses: Vec<ProofStatus>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// The out-of-band id of the invitation this agent created.
    pub fn out_of_band_id(&self) -> Option<&str> {
        self.out_of_band_id.as_deref()
    }

    /// The invitation id inside the created invitation message.
    pub fn invitation_id(&self) -> Option<&str> {
        self.invitation_id.as_deref()
    }

    /// The connection id, once an exchange request has been processed.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// The thread id of the open proof exchange.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// The id later steps use to address the connection. The out-of-band
    /// id stays valid for the whole exchange, so it is preferred when
    /// known.
    pub fn correlation_id(&self) -> Option<&str> {
        self.out_of_band_id.as_deref().or(self.connection_id.as_deref())
    }

    /// Every connection status recorded, in step order.
    pub fn connection_statuses(&self) -> &[ConnectionStatus] {
        &self.connection_statuses
    }

    /// Every proof status recorded, in step order.
    pub fn proof_statuses(&self) -> &[ProofStatus] {
        &self.proof_statuses
    }

    /// The most recently recorded connection status.
    pub fn last_connection_status(&self) -> Option<&ConnectionStatus> {
        self.connection_statuses.last()
    }

    /// The most recently recorded proof status.
    pub fn last_proof_status(&self) -> Option<&ProofStatus> {
        self.proof_statuses.last()
    }

    pub(crate) fn set_out_of_band_id(&mut self, id: String) {
        self.out_of_band_id = Some(id);
    }

    pub(crate) fn set_invitation_id(&mut self, id: String) {
        self.invitation_id = Some(id);
    }

    pub(crate) fn set_connection_id(&mut self, id: String) {
        self.connection_id = Some(id);
    }

    pub(crate) fn set_thread_id(&mut self, id: String) {
        self.thread_id = Some(id);
    }

    pub(crate) fn record_connection_status(&mut self, status: ConnectionStatus) {
        self.connection_statuses.push(status);
    }

    pub(crate) fn record_proof_status(&mut self, status: ProofStatus) {
        self.proof_statuses.push(status);
    }
}
