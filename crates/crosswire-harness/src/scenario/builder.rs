//! Scenario builder API.
//!
//! Construct a scenario by queuing steps, then call `.oracle()` to get a
//! [`RunnableScenario`]. There is no way to run a scenario without an
//! oracle.

use std::sync::Arc;

use crosswire_backchannel::commands::{
    DidExchangeCommands, OutOfBandCommands, PresentProofCommands,
};
use crosswire_backchannel::engine::ProofRequest;
use crosswire_backchannel::session::{DEFAULT_WAIT_TIMEOUT, Session};
use crosswire_core::project::{ConnectionStatus, ConnectionStatusState};
use crosswire_core::record::DidExchangeState;

use crate::scenario::{OracleFn, ScenarioStep, World};
use crate::sim_engine::SimEngine;

/// Scenario builder.
pub struct Scenario {
    name: String,
    steps: Vec<ScenarioStep>,
    seed: u64,
    manual_accept: bool,
    verification_outcome: bool,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            seed: 0,
            manual_accept: false,
            verification_outcome: true,
        }
    }

    /// RNG seed for the simulated engine's id minting.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the engine without auto-accept.
    pub fn manual_accept(mut self) -> Self {
        self.manual_accept = true;
        self
    }

    /// Verification outcome the engine reports for presentations.
    pub fn verification_outcome(mut self, verified: bool) -> Self {
        self.verification_outcome = verified;
        self
    }

    /// Queue an arbitrary step.
    pub fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Queue creating an out-of-band invitation.
    pub fn send_invitation(self, label: impl Into<String>) -> Self {
        self.step(ScenarioStep::SendInvitation { label: label.into() })
    }

    /// Queue the remote agent's exchange request.
    pub fn deliver_connection_request(self) -> Self {
        self.step(ScenarioStep::DeliverConnectionRequest)
    }

    /// Queue a connection status query.
    pub fn get_connection(self) -> Self {
        self.step(ScenarioStep::GetConnection)
    }

    /// Queue accepting the received exchange request.
    pub fn send_response(self) -> Self {
        self.step(ScenarioStep::SendResponse)
    }

    /// Queue the remote agent's complete message.
    pub fn deliver_connection_complete(self) -> Self {
        self.step(ScenarioStep::DeliverConnectionComplete)
    }

    /// Queue parking until the connection reaches `state`.
    pub fn await_connection_state(self, state: DidExchangeState) -> Self {
        self.step(ScenarioStep::AwaitConnectionState { state })
    }

    /// Queue sending a presentation request.
    pub fn send_proof_request(self, request: ProofRequest) -> Self {
        self.step(ScenarioStep::SendProofRequest { request })
    }

    /// Queue the remote agent's presentation.
    pub fn deliver_presentation(self) -> Self {
        self.step(ScenarioStep::DeliverPresentation)
    }

    /// Queue verifying the received presentation.
    pub fn verify_presentation(self) -> Self {
        self.step(ScenarioStep::VerifyPresentation)
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory; verification is not an afterthought.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every queued step in order, then run the oracle over the
    /// final world.
    ///
    /// # Errors
    ///
    /// A string naming the scenario and the step or oracle check that
    /// failed.
    pub async fn run(self) -> Result<(), String> {
        let name = self.scenario.name;

        let mut builder = SimEngine::builder()
            .seed(self.scenario.seed)
            .verification_outcome(self.scenario.verification_outcome);
        if self.scenario.manual_accept {
            builder = builder.manual_accept();
        }
        let engine = Arc::new(builder.build());
        let session = Session::start(Arc::clone(&engine));

        let mut world = World::new();
        for step in self.scenario.steps {
            execute(&name, &engine, &session, &mut world, step).await?;
        }

        (self.oracle)(&world)
    }
}

async fn execute(
    name: &str,
    engine: &Arc<SimEngine>,
    session: &Session<SimEngine>,
    world: &mut World,
    step: ScenarioStep,
) -> Result<(), String> {
    match step {
        ScenarioStep::SendInvitation { label } => {
            let response = OutOfBandCommands::new(session)
                .send_invitation_message(&label)
                .await
                .map_err(|e| format!("Scenario '{name}': send_invitation failed: {e}"))?;
            world.set_invitation_id(response.invitation.invitation_id.clone());
            world.record_connection_status(ConnectionStatus {
                state: ConnectionStatusState::Exchange(response.state),
                connection_id: response.connection_id.clone(),
            });
            world.set_out_of_band_id(response.connection_id);
        }
        ScenarioStep::DeliverConnectionRequest => {
            let out_of_band_id = world
                .out_of_band_id()
                .ok_or_else(|| format!("Scenario '{name}': no invitation sent yet"))?;
            let connection = engine
                .deliver_connection_request(out_of_band_id)
                .map_err(|e| format!("Scenario '{name}': deliver request failed: {e}"))?;
            world.set_connection_id(connection.connection_id);
        }
        ScenarioStep::GetConnection => {
            let id = world
                .correlation_id()
                .ok_or_else(|| format!("Scenario '{name}': no connection to query"))?
                .to_string();
            let status = DidExchangeCommands::new(session)
                .get_connection(&id)
                .await
                .map_err(|e| format!("Scenario '{name}': get_connection failed: {e}"))?;
            world.record_connection_status(status);
        }
        ScenarioStep::SendResponse => {
            let id = world
                .correlation_id()
                .ok_or_else(|| format!("Scenario '{name}': no connection to respond on"))?
                .to_string();
            let status = DidExchangeCommands::new(session)
                .send_response(&id)
                .await
                .map_err(|e| format!("Scenario '{name}': send_response failed: {e}"))?;
            world.set_connection_id(status.connection_id.clone());
            world.record_connection_status(status);
        }
        ScenarioStep::DeliverConnectionComplete => {
            let connection_id = world
                .connection_id()
                .ok_or_else(|| format!("Scenario '{name}': no connection to complete"))?;
            engine
                .deliver_connection_complete(connection_id)
                .map_err(|e| format!("Scenario '{name}': deliver complete failed: {e}"))?;
        }
        ScenarioStep::AwaitConnectionState { state } => {
            let id = world
                .correlation_id()
                .ok_or_else(|| format!("Scenario '{name}': no connection to await"))?
                .to_string();
            let event = session
                .await_connection_state(&id, state, DEFAULT_WAIT_TIMEOUT)
                .await
                .map_err(|e| format!("Scenario '{name}': await {state} failed: {e}"))?;
            world.set_connection_id(event.connection.connection_id);
        }
        ScenarioStep::SendProofRequest { request } => {
            let id = world
                .correlation_id()
                .ok_or_else(|| format!("Scenario '{name}': no connection for proof request"))?
                .to_string();
            let status = PresentProofCommands::new(session)
                .send_request(&id, request, None)
                .await
                .map_err(|e| format!("Scenario '{name}': send_proof_request failed: {e}"))?;
            world.set_thread_id(status.thread_id.clone());
            world.record_proof_status(status);
        }
        ScenarioStep::DeliverPresentation => {
            let thread_id = world
                .thread_id()
                .ok_or_else(|| format!("Scenario '{name}': no proof thread open"))?;
            engine
                .deliver_presentation(thread_id)
                .map_err(|e| format!("Scenario '{name}': deliver presentation failed: {e}"))?;
        }
        ScenarioStep::VerifyPresentation => {
            let thread_id = world
                .thread_id()
                .ok_or_else(|| format!("Scenario '{name}': no proof thread open"))?
                .to_string();
            let status = PresentProofCommands::new(session)
                .verify_presentation(&thread_id)
                .await
                .map_err(|e| format!("Scenario '{name}': verify_presentation failed: {e}"))?;
            world.record_proof_status(status);
        }
    }
    Ok(())
}
