//! Command-layer behavior that only shows up with multiple records or
//! multiple sessions in play.

use std::sync::Arc;
use std::time::Duration;

use crosswire_backchannel::commands::{DidExchangeCommands, OutOfBandCommands, PresentProofCommands};
use crosswire_backchannel::engine::{InvitationMessage, ProofRequest};
use crosswire_backchannel::session::Session;
use crosswire_core::record::{DidExchangeState, ProofState};
use crosswire_core::resolve::ProofLookup;
use crosswire_harness::SimEngine;

fn session(engine: SimEngine) -> (Arc<SimEngine>, Session<SimEngine>) {
    let engine = Arc::new(engine);
    let session = Session::start(Arc::clone(&engine));
    (engine, session)
}

fn request() -> ProofRequest {
    ProofRequest {
        name: "membership".into(),
        version: "1.0".into(),
        requested_attributes: std::collections::BTreeMap::new(),
        requested_predicates: std::collections::BTreeMap::new(),
    }
}

#[tokio::test]
async fn multi_use_invitation_resolves_to_the_earliest_connection() {
    let (engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();

    // Two agents redeem the same invitation.
    let first = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    let second = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    assert_ne!(first.connection_id, second.connection_id);

    let status = did_exchange.get_connection(&invitation.connection_id).await.unwrap();
    assert_eq!(status.connection_id, first.connection_id);
}

#[tokio::test]
async fn a_connection_id_bypasses_the_cascade() {
    let (engine, session) = session(SimEngine::builder().manual_accept().build());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = oob.send_invitation_message("acme").await.unwrap();
    let first = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    let second = engine.deliver_connection_request(&invitation.connection_id).unwrap();

    // Addressing the later connection directly must not fall back to the
    // earliest one.
    let status = did_exchange.get_connection(&second.connection_id).await.unwrap();
    assert_eq!(status.connection_id, second.connection_id);
    assert_ne!(status.connection_id, first.connection_id);
}

#[tokio::test]
async fn received_invitations_are_tracked_under_their_own_out_of_band_id() {
    let (_engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let did_exchange = DidExchangeCommands::new(&session);

    let invitation = InvitationMessage {
        invitation_id: "invite-from-the-other-agent".into(),
        label: "faber".into(),
        services: vec!["https://faber.example/endpoint".into()],
    };

    let received = oob.receive_invitation(invitation).await.unwrap();
    assert_eq!(received.state, DidExchangeState::InvitationReceived);

    // Auto-acceptance already sent the request, so a connection resolves
    // both through our out-of-band id and the sender's invitation id.
    let by_oob = did_exchange.get_connection(&received.connection_id).await.unwrap();
    let by_invitation =
        did_exchange.get_connection("invite-from-the-other-agent").await.unwrap();
    assert_eq!(by_oob.connection_id, by_invitation.connection_id);
}

#[tokio::test]
async fn proof_threads_do_not_cross_resolve() {
    let (engine, session) = session(SimEngine::new());
    let oob = OutOfBandCommands::new(&session);
    let present_proof = PresentProofCommands::new(&session);

    let invitation = oob.send_invitation_message("verifier").await.unwrap();
    let connection = engine.deliver_connection_request(&invitation.connection_id).unwrap();
    engine.deliver_connection_complete(&connection.connection_id).unwrap();

    let first = present_proof
        .send_request(&invitation.connection_id, request(), None)
        .await
        .unwrap();
    let second = present_proof
        .send_request(&invitation.connection_id, request(), None)
        .await
        .unwrap();
    assert_ne!(first.thread_id, second.thread_id);

    // Completing the second thread leaves the first untouched.
    engine.deliver_presentation(&second.thread_id).unwrap();
    let done = present_proof.verify_presentation(&second.thread_id).await.unwrap();
    assert_eq!(done.thread_id, second.thread_id);
    assert_eq!(done.state, ProofState::Done);

    let proofs = engine.proofs().await;
    let untouched = proofs.iter().find(|p| p.thread_id == first.thread_id).unwrap();
    assert_eq!(untouched.state, ProofState::RequestSent);
}

#[tokio::test(start_paused = true)]
async fn a_new_session_does_not_inherit_buffered_events() {
    let engine = Arc::new(SimEngine::builder().manual_accept().build());

    let first = Session::start(Arc::clone(&engine));
    let invitation = OutOfBandCommands::new(&first)
        .send_invitation_message("acme")
        .await
        .unwrap();
    let connection = engine.deliver_connection_request(&invitation.connection_id).unwrap();

    // The first session buffered the transition and can replay it.
    tokio::task::yield_now().await;
    first
        .await_connection_state(
            &connection.connection_id,
            DidExchangeState::RequestReceived,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    drop(first);

    // A session started afterwards begins with empty logs.
    let second = Session::start(Arc::clone(&engine));
    let result = second
        .await_connection_state(
            &connection.connection_id,
            DidExchangeState::RequestReceived,
            Duration::from_millis(100),
        )
        .await;
    assert!(result.is_err(), "stale events must not leak into a new session");
}
