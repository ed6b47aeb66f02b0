//! Declarative scenario tests with mandatory oracle verification.
//!
//! A scenario scripts one agent under test (a [`Session`] over a
//! [`SimEngine`](crate::SimEngine)) plus the inbound messages the remote
//! agent would send, then hands the final [`World`] to an oracle closure.
//! The oracle is not optional: a scenario without verification cannot be
//! run.
//!
//! [`Session`]: crosswire_backchannel::session::Session

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario};
pub use world::World;

use crosswire_backchannel::engine::ProofRequest;
use crosswire_core::record::DidExchangeState;

/// Oracle function verifying the final world state.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String> + Send>;

/// One scripted action.
///
/// Steps that issue backchannel commands record their responses in the
/// [`World`]; `Deliver*` steps inject the remote agent's traffic directly
/// into the engine.
#[derive(Debug, Clone)]
pub enum ScenarioStep {
    /// Create an out-of-band invitation; records the out-of-band id.
    SendInvitation {
        /// Label carried in the invitation message
        label: String,
    },
    /// Inject the remote agent's exchange request for the held invitation.
    DeliverConnectionRequest,
    /// Query connection status by the current correlation id; records the
    /// projected status.
    GetConnection,
    /// Accept the received exchange request, parking until it lands.
    SendResponse,
    /// Inject the remote agent's complete message.
    DeliverConnectionComplete,
    /// Park until the connection reaches the given state.
    AwaitConnectionState {
        /// Target exchange state
        state: DidExchangeState,
    },
    /// Send a presentation request over the established connection;
    /// records the thread id.
    SendProofRequest {
        /// The request to send
        request: ProofRequest,
    },
    /// Inject the remote agent's presentation for the open thread.
    DeliverPresentation,
    /// Verify the received presentation, parking until it lands.
    VerifyPresentation,
}
