//! Out-of-band invitation commands.

use crosswire_core::record::{DidExchangeState, OutOfBandRecord};

use crate::engine::{InvitationAcceptance, InvitationMessage, ProtocolEngine};
use crate::error::CommandError;
use crate::response::{InvitationResponse, ReceiveInvitationResponse};
use crate::session::Session;

/// Handlers for the out-of-band command family.
pub struct OutOfBandCommands<'a, E> {
    session: &'a Session<E>,
}

impl<'a, E: ProtocolEngine> OutOfBandCommands<'a, E> {
    /// Bind the handlers to a session.
    pub fn new(session: &'a Session<E>) -> Self {
        Self { session }
    }

    /// Create an invitation and report it as `invitation-sent`.
    ///
    /// The connection id is not assigned until the other agent's exchange
    /// request is processed, so the out-of-band id is reported in its
    /// place; the resolution cascade accepts it everywhere a connection id
    /// is accepted.
    pub async fn send_invitation_message(
        &self,
        label: &str,
    ) -> Result<InvitationResponse, CommandError> {
        let (record, invitation) = self.session.engine().create_invitation(label).await?;
        tracing::debug!(out_of_band_id = %record.out_of_band_id, "invitation created");

        Ok(InvitationResponse {
            state: DidExchangeState::InvitationSent,
            connection_id: record.out_of_band_id,
            invitation,
        })
    }

    /// Receive an invitation and report it as `invitation-received`.
    pub async fn receive_invitation(
        &self,
        invitation: InvitationMessage,
    ) -> Result<ReceiveInvitationResponse, CommandError> {
        let record = self.receive(invitation, InvitationAcceptance::Auto).await?;

        Ok(ReceiveInvitationResponse {
            state: DidExchangeState::InvitationReceived,
            connection_id: record.out_of_band_id,
        })
    }

    pub(crate) async fn receive(
        &self,
        invitation: InvitationMessage,
        acceptance: InvitationAcceptance,
    ) -> Result<OutOfBandRecord, CommandError> {
        let record = self.session.engine().receive_invitation(invitation, acceptance).await?;
        tracing::debug!(
            out_of_band_id = %record.out_of_band_id,
            invitation_id = %record.invitation_id,
            "invitation received"
        );
        Ok(record)
    }
}
