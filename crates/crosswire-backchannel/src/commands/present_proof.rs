//! Present-proof commands.

use std::collections::BTreeMap;

use crosswire_core::project::{ProofStatus, project_proof};
use crosswire_core::record::ProofState;
use crosswire_core::resolve::{resolve_connection, resolve_proof};
use serde::{Deserialize, Serialize};

use crate::engine::{
    ProofRequest, ProtocolEngine, RetrievedCredentials, SelectedCredentials,
};
use crate::error::CommandError;
use crate::response::ProofThreadResponse;
use crate::session::{DEFAULT_WAIT_TIMEOUT, Session};

/// The credential the test suite wants presented for one referent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialChoice {
    /// Wallet credential id that must match a retrieved candidate
    pub cred_id: String,
}

/// Test-suite instructions for building a presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationSelection {
    /// Attribute referent -> chosen credential
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, CredentialChoice>,
    /// Predicate referent -> chosen credential
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, CredentialChoice>,
    /// Self-attested attribute values by referent
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
    /// Free-form comment forwarded with the presentation
    pub comment: Option<String>,
}

/// Handlers for the present-proof command family.
pub struct PresentProofCommands<'a, E> {
    session: &'a Session<E>,
}

impl<'a, E: ProtocolEngine> PresentProofCommands<'a, E> {
    /// Bind the handlers to a session.
    pub fn new(session: &'a Session<E>) -> Self {
        Self { session }
    }

    /// Create a connection-less presentation request and report its thread.
    pub async fn create_request(
        &self,
        request: ProofRequest,
    ) -> Result<ProofThreadResponse, CommandError> {
        let proof = self.session.engine().create_proof_request(request).await?;
        Ok(ProofThreadResponse { thread_id: proof.thread_id })
    }

    /// Send a presentation request over a connection.
    ///
    /// The connection id runs through the resolution cascade, so the test
    /// suite may still be holding the out-of-band or invitation id.
    pub async fn send_request(
        &self,
        connection_id: &str,
        request: ProofRequest,
        comment: Option<String>,
    ) -> Result<ProofStatus, CommandError> {
        let engine = self.session.engine();
        let connection = resolve_connection(engine, connection_id).await?;
        let proof = engine.request_proof(&connection.connection_id, request, comment).await?;

        Ok(project_proof(&proof))
    }

    /// Answer a presentation request with the selected credentials.
    ///
    /// Parks until the request is actually processed (`request-received`):
    /// the verifier's send and the prover's answer race otherwise. Each
    /// referent must name a retrieved candidate by credential id; a missing
    /// candidate is an error, never an arbitrary substitution.
    pub async fn send_presentation(
        &self,
        thread_id: &str,
        selection: PresentationSelection,
    ) -> Result<ProofStatus, CommandError> {
        self.session
            .await_proof_state(thread_id, ProofState::RequestReceived, DEFAULT_WAIT_TIMEOUT)
            .await?;

        let engine = self.session.engine();
        let proof = resolve_proof(engine, thread_id).await?;
        let retrieved = engine.credentials_for_proof(&proof.proof_id).await?;
        let credentials = select_credentials(&retrieved, &selection)?;

        tracing::debug!(
            thread_id,
            attributes = credentials.attributes.len(),
            predicates = credentials.predicates.len(),
            self_attested = credentials.self_attested.len(),
            "credentials selected for presentation"
        );

        let accepted =
            engine.accept_proof_request(&proof.proof_id, credentials, selection.comment).await?;

        Ok(project_proof(&accepted))
    }

    /// Verify a received presentation and report the outcome.
    pub async fn verify_presentation(&self, thread_id: &str) -> Result<ProofStatus, CommandError> {
        self.session
            .await_proof_state(thread_id, ProofState::PresentationReceived, DEFAULT_WAIT_TIMEOUT)
            .await?;

        let engine = self.session.engine();
        let proof = resolve_proof(engine, thread_id).await?;
        let verified = engine.accept_presentation(&proof.proof_id).await?;

        Ok(project_proof(&verified))
    }
}

/// Match each referent's requested credential id against the retrieved
/// candidates.
///
/// Revoked candidates are eligible on purpose: some conformance tests
/// present a revoked credential and expect verification to fail.
fn select_credentials(
    retrieved: &RetrievedCredentials,
    selection: &PresentationSelection,
) -> Result<SelectedCredentials, CommandError> {
    let mut selected = SelectedCredentials {
        self_attested: selection.self_attested_attributes.clone(),
        ..SelectedCredentials::default()
    };

    for (referent, choice) in &selection.requested_attributes {
        let candidate = find_candidate(retrieved.attributes.get(referent), &choice.cred_id)
            .ok_or_else(|| unknown(referent, &choice.cred_id))?;
        selected.attributes.insert(referent.clone(), candidate);
    }

    for (referent, choice) in &selection.requested_predicates {
        let candidate = find_candidate(retrieved.predicates.get(referent), &choice.cred_id)
            .ok_or_else(|| unknown(referent, &choice.cred_id))?;
        selected.predicates.insert(referent.clone(), candidate);
    }

    Ok(selected)
}

fn find_candidate(
    candidates: Option<&Vec<crate::engine::CredentialCandidate>>,
    cred_id: &str,
) -> Option<crate::engine::CredentialCandidate> {
    candidates?.iter().find(|candidate| candidate.credential_id == cred_id).cloned()
}

fn unknown(referent: &str, cred_id: &str) -> CommandError {
    CommandError::UnknownCredential { referent: referent.to_string(), cred_id: cred_id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CredentialCandidate;

    fn candidate(credential_id: &str, revoked: bool) -> CredentialCandidate {
        CredentialCandidate { credential_id: credential_id.to_string(), revoked }
    }

    fn retrieved_with(referent: &str, candidates: Vec<CredentialCandidate>) -> RetrievedCredentials {
        let mut retrieved = RetrievedCredentials::default();
        retrieved.attributes.insert(referent.to_string(), candidates);
        retrieved
    }

    #[test]
    fn selects_the_named_candidate() {
        let retrieved =
            retrieved_with("attr_1", vec![candidate("cred-a", false), candidate("cred-b", false)]);
        let mut selection = PresentationSelection::default();
        selection
            .requested_attributes
            .insert("attr_1".to_string(), CredentialChoice { cred_id: "cred-b".to_string() });

        let selected = select_credentials(&retrieved, &selection).unwrap();
        assert_eq!(selected.attributes["attr_1"].credential_id, "cred-b");
    }

    #[test]
    fn revoked_candidates_remain_selectable() {
        let retrieved = retrieved_with("attr_1", vec![candidate("cred-revoked", true)]);
        let mut selection = PresentationSelection::default();
        selection
            .requested_attributes
            .insert("attr_1".to_string(), CredentialChoice { cred_id: "cred-revoked".to_string() });

        let selected = select_credentials(&retrieved, &selection).unwrap();
        assert!(selected.attributes["attr_1"].revoked);
    }

    #[test]
    fn missing_candidate_fails_instead_of_substituting() {
        let retrieved = retrieved_with("attr_1", vec![candidate("cred-a", false)]);
        let mut selection = PresentationSelection::default();
        selection
            .requested_attributes
            .insert("attr_1".to_string(), CredentialChoice { cred_id: "cred-z".to_string() });

        let result = select_credentials(&retrieved, &selection);
        assert!(matches!(
            result,
            Err(CommandError::UnknownCredential { referent, cred_id })
                if referent == "attr_1" && cred_id == "cred-z"
        ));
    }

    #[test]
    fn unknown_referent_fails() {
        let retrieved = RetrievedCredentials::default();
        let mut selection = PresentationSelection::default();
        selection
            .requested_attributes
            .insert("attr_1".to_string(), CredentialChoice { cred_id: "cred-a".to_string() });

        assert!(select_credentials(&retrieved, &selection).is_err());
    }

    #[test]
    fn self_attested_values_pass_through() {
        let retrieved = RetrievedCredentials::default();
        let mut selection = PresentationSelection::default();
        selection
            .self_attested_attributes
            .insert("nickname".to_string(), "moss".to_string());

        let selected = select_credentials(&retrieved, &selection).unwrap();
        assert_eq!(selected.self_attested["nickname"], "moss");
    }
}
