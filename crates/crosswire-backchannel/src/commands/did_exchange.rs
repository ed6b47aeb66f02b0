//! DID exchange commands.

use crosswire_core::error::ResolveError;
use crosswire_core::project::{ConnectionStatus, ConnectionStatusState, project_connection};
use crosswire_core::record::DidExchangeState;
use crosswire_core::resolve::resolve_connection;

use crate::engine::{InvitationAcceptance, InvitationMessage, ProtocolEngine};
use crate::error::CommandError;
use crate::response::ConnectionIdResponse;
use crate::session::{DEFAULT_WAIT_TIMEOUT, Session};

/// Handlers for the DID exchange command family.
pub struct DidExchangeCommands<'a, E> {
    session: &'a Session<E>,
}

impl<'a, E: ProtocolEngine> DidExchangeCommands<'a, E> {
    /// Bind the handlers to a session.
    pub fn new(session: &'a Session<E>) -> Self {
        Self { session }
    }

    /// Status of the connection addressed by any correlation id.
    pub async fn get_connection(&self, id: &str) -> Result<ConnectionStatus, CommandError> {
        let engine = self.session.engine();
        let connection = resolve_connection(engine, id).await?;
        Ok(project_connection(&connection, engine.auto_accept()))
    }

    /// Status for the responding side, tolerating the pre-connection phase.
    ///
    /// Before any exchange request arrives there is no connection to
    /// resolve, only an out-of-band record; that phase is reported as
    /// `invitation-sent` under the caller's own id.
    pub async fn get_connection_or_invitation(
        &self,
        id: &str,
    ) -> Result<ConnectionStatus, CommandError> {
        match self.get_connection(id).await {
            Err(CommandError::NotFound(_)) => {
                let engine = self.session.engine();
                let record = match engine.out_of_band_by_id(id).await {
                    Some(record) => Some(record),
                    None => engine.out_of_band_by_invitation_id(id).await,
                };

                match record {
                    Some(_) => Ok(ConnectionStatus {
                        state: ConnectionStatusState::Exchange(DidExchangeState::InvitationSent),
                        connection_id: id.to_string(),
                    }),
                    None => Err(ResolveError::NotFound { id: id.to_string() }.into()),
                }
            }
            other => other,
        }
    }

    /// Start an exchange against a resolvable DID.
    ///
    /// A public DID acts as an implicit invitation: the DID itself is the
    /// invitation id, and accepting it immediately sends the exchange
    /// request, so a connection exists when this returns.
    pub async fn create_request_resolvable_did(
        &self,
        their_did: Option<&str>,
        their_public_did: Option<&str>,
    ) -> Result<ConnectionIdResponse, CommandError> {
        let did = their_did.or(their_public_did).ok_or(CommandError::MissingTheirDid)?;

        let invitation = implicit_invitation(did);
        let record = self
            .session
            .engine()
            .receive_invitation(invitation, InvitationAcceptance::Auto)
            .await?;

        Ok(ConnectionIdResponse {
            connection_id: record.connection_id.unwrap_or(record.out_of_band_id),
        })
    }

    /// Receive an implicit exchange request via the requester's DID
    /// document services, without accepting it yet.
    ///
    /// No connection exists at this point; the out-of-band id is returned
    /// and `send_request`/`send_response` can be called with it.
    pub async fn receive_request_resolvable_did(
        &self,
        services: &[String],
    ) -> Result<ConnectionIdResponse, CommandError> {
        let did = services.first().map(String::as_str).ok_or(CommandError::MissingTheirDid)?;

        let mut invitation = implicit_invitation(did);
        invitation.services = services.to_vec();
        let record = self
            .session
            .engine()
            .receive_invitation(invitation, InvitationAcceptance::Manual)
            .await?;

        Ok(ConnectionIdResponse { connection_id: record.out_of_band_id })
    }

    /// Accept a held invitation, sending the exchange request.
    pub async fn send_request(&self, id: &str) -> Result<(), CommandError> {
        self.session.engine().accept_invitation(id).await?;
        Ok(())
    }

    /// Accept a received exchange request, sending the exchange response.
    ///
    /// The request may still be in flight inside the engine when this
    /// command arrives, so the handler parks on the event log until the
    /// connection reports `request-received` before accepting.
    pub async fn send_response(&self, id: &str) -> Result<ConnectionStatus, CommandError> {
        self.session
            .await_connection_state(id, DidExchangeState::RequestReceived, DEFAULT_WAIT_TIMEOUT)
            .await?;

        let engine = self.session.engine();
        let connection = resolve_connection(engine, id).await?;
        let accepted = engine.accept_connection_request(&connection.connection_id).await?;

        Ok(project_connection(&accepted, engine.auto_accept()))
    }
}

fn implicit_invitation(did: &str) -> InvitationMessage {
    InvitationMessage {
        invitation_id: did.to_string(),
        label: "Resolvable DID".to_string(),
        services: vec![did.to_string()],
    }
}
