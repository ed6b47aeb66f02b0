//! Crosswire backchannel command layer
//!
//! Everything the conformance suite can ask the agent to do, expressed as
//! async command handlers over a black-box [`engine::ProtocolEngine`]. The
//! handlers themselves are thin: each one resolves the caller's identifier
//! through the cascade, optionally parks on the event log until the record
//! reaches the state the command depends on, invokes the engine operation,
//! and projects the resulting record into the harness vocabulary.
//!
//! A [`session::Session`] scopes the event-log lifecycle to one test
//! session: it subscribes to the engine's event streams before any command
//! can run, so no transition racing ahead of a caller is ever lost, and its
//! logs are discarded with it rather than leaking across sessions.

pub mod commands;
pub mod engine;
pub mod error;
pub mod response;
pub mod session;

pub use commands::{DidExchangeCommands, OutOfBandCommands, PresentProofCommands};
pub use engine::{
    CredentialCandidate, EngineError, InvitationAcceptance, InvitationMessage, ProofRequest,
    ProtocolEngine, RequestedAttribute, RequestedPredicate, RetrievedCredentials,
    SelectedCredentials,
};
pub use error::CommandError;
pub use session::{DEFAULT_WAIT_TIMEOUT, Session};
