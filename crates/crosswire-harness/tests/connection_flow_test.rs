//! End-to-end connection establishment over the simulated engine.
//!
//! Drives the real command handlers and session event logs against
//! [`SimEngine`], with inbound traffic injected at scripted points. Covers
//! the auto-accept projection race, the manual-accept flow where true
//! states are reported, and the identifier cascade from the test suite's
//! perspective.

use std::sync::Arc;
use std::time::Duration;

use crosswire_backchannel::commands::{DidExchangeCommands, OutOfBandCommands};
use crosswire_backchannel::error::CommandError;
use crosswire_backchannel::session::{DEFAULT_WAIT_TIMEOUT, Session};
use crosswire_core::error::WaitError;
use crosswire_core::project::ConnectionStatusState;
use crosswire_core::record::{DidExchangeState, LegacyConnectionState};
use crosswire_harness::SimEngine;

fn session(engine: SimEngine) -> (Arc<SimEngine>, Session<SimEngine>) {
    let engine = Arc::new(engine);
    let session = Session::start(Arc::clone(&engine));
    (engine, session)
}

#[tokio::test]
async fn auto_accept_hides_intermediate_states_behind_the_sentinel() {
    let (engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    assert_eq!(invitation.state, DidExchangeState::InvitationSent);

    // The remote agent's request arrives and the engine races to
    // response-sent before anyone polls.
    engine.deliver_connection_request(&invitation.connection_id).unwrap();

    let status = did_exchange.get_connection(&invitation.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::NotApplicable);
    assert_eq!(status.state.to_string(), "N/A");
}

#[tokio::test]
async fn completed_connection_reports_the_legacy_alias() {
    let (engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    let connection = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    engine.deliver_connection_complete(&connection.connection_id).unwrap();

    // Queried by out-of-band id, reported under the canonical connection id.
    let status = did_exchange.get_connection(&invitation.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::Legacy(LegacyConnectionState::Complete));
    assert_eq!(status.connection_id, connection.connection_id);
}

#[tokio::test]
async fn manual_accept_reports_true_states_at_every_phase() {
    let (engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    engine.deliver_connection_request(&invitation.connection_id).unwrap();

    let status = did_exchange.get_connection(&invitation.connection_id).await.unwrap();
    assert_eq!(
        status.state,
        ConnectionStatusState::Exchange(DidExchangeState::RequestReceived)
    );

    let responded = did_exchange.send_response(&invitation.connection_id).await.unwrap();
    assert_eq!(
        responded.state,
        ConnectionStatusState::Exchange(DidExchangeState::ResponseSent)
    );

    engine.deliver_connection_complete(&responded.connection_id).unwrap();
    let status = did_exchange.get_connection(&invitation.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::Legacy(LegacyConnectionState::Complete));
}

#[tokio::test]
async fn send_response_parks_until_the_request_arrives() {
    let (engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    let out_of_band_id = invitation.connection_id.clone();

    // The responder's command is issued before the request is delivered;
    // it must park rather than fail.
    let respond = did_exchange.send_response(&out_of_band_id);
    let deliver = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.deliver_connection_request(&out_of_band_id).unwrap();
    };

    let (status, ()) = tokio::join!(respond, deliver);
    let status = status.unwrap();
    assert_eq!(
        status.state,
        ConnectionStatusState::Exchange(DidExchangeState::ResponseSent)
    );
}

#[tokio::test]
async fn the_invitation_id_also_addresses_the_connection() {
    let (engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    let connection = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    engine.deliver_connection_complete(&connection.connection_id).unwrap();

    let status =
        did_exchange.get_connection(&invitation.invitation.invitation_id).await.unwrap();
    assert_eq!(status.connection_id, connection.connection_id);
}

#[tokio::test]
async fn responder_status_before_any_request_is_invitation_sent() {
    let (_engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();

    let status =
        did_exchange.get_connection_or_invitation(&invitation.connection_id).await.unwrap();
    assert_eq!(
        status.state,
        ConnectionStatusState::Exchange(DidExchangeState::InvitationSent)
    );
    assert_eq!(status.connection_id, invitation.connection_id);
}

#[tokio::test]
async fn unknown_identifier_is_reported_not_found() {
    let (_engine, session) = session(SimEngine::new());
    let did_exchange = DidExchangeCommands::new(&session);

    let result = did_exchange.get_connection("no-such-id").await;
    assert!(matches!(result, Err(CommandError::NotFound(_))));

    let result = did_exchange.get_connection_or_invitation("no-such-id").await;
    assert!(matches!(result, Err(CommandError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn awaiting_a_state_that_never_comes_times_out_with_context() {
    let (_engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();

    let result = session
        .await_connection_state(
            &invitation.connection_id,
            DidExchangeState::Completed,
            DEFAULT_WAIT_TIMEOUT,
        )
        .await;

    match result {
        Err(WaitError::Timeout { correlation_id, target_state, timeout }) => {
            assert_eq!(correlation_id, invitation.connection_id);
            assert_eq!(target_state, "completed");
            assert_eq!(timeout, DEFAULT_WAIT_TIMEOUT);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn events_emitted_before_the_wait_are_replayed() {
    let (engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    let connection = engine.deliver_connection_request(&invitation.connection_id).unwrap();

    // Give the pump a chance to drain the broadcast channel, then wait for
    // a transition that already happened.
    tokio::task::yield_now().await;
    let event = session
        .await_connection_state(
            &invitation.connection_id,
            DidExchangeState::RequestReceived,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(event.connection.connection_id, connection.connection_id);
}

#[tokio::test]
async fn resolvable_did_requester_gets_a_connection_immediately() {
    let (_engine, session) = session(SimEngine::new());
    let did_exchange = DidExchangeCommands::new(&session);

    let response = did_exchange
        .create_request_resolvable_did(Some("did:example:issuer"), None)
        .await
        .unwrap();

    let status = did_exchange.get_connection(&response.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::NotApplicable);

    // The implicit invitation is findable by the DID itself.
    let by_did = did_exchange.get_connection("did:example:issuer").await.unwrap();
    assert_eq!(by_did.connection_id, status.connection_id);
}

#[tokio::test]
async fn resolvable_did_responder_accepts_later() {
    let (_engine, session) = session(SimEngine::builder().manual_accept().build());
    let did_exchange = DidExchangeCommands::new(&session);

    let services = vec!["did:example:requester".to_string()];
    let response = did_exchange.receive_request_resolvable_did(&services).await.unwrap();

    // No connection yet; accepting the held invitation sends the request.
    did_exchange.send_request(&response.connection_id).await.unwrap();

    let status = did_exchange.get_connection(&response.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::Exchange(DidExchangeState::RequestSent));
}

#[tokio::test]
async fn invitee_completes_when_the_response_arrives() {
    let (engine, session) = session(SimEngine::new());
    let did_exchange = DidExchangeCommands::new(&session);

    let response = did_exchange
        .create_request_resolvable_did(Some("did:example:issuer"), None)
        .await
        .unwrap();

    // The inviter's response arrives; auto-accept sends the complete
    // message immediately.
    let completed = engine.deliver_connection_response(&response.connection_id).unwrap();
    assert_eq!(completed.state, DidExchangeState::Completed);

    let status = did_exchange.get_connection(&response.connection_id).await.unwrap();
    assert_eq!(status.state, ConnectionStatusState::Legacy(LegacyConnectionState::Complete));
}

#[tokio::test]
async fn missing_did_is_rejected() {
    let (_engine, session) = session(SimEngine::new());
    let did_exchange = DidExchangeCommands::new(&session);

    let result = did_exchange.create_request_resolvable_did(None, None).await;
    assert!(matches!(result, Err(CommandError::MissingTheirDid)));
}
