//! Crosswire coordination core
//!
//! The layer that bridges a synchronous conformance test suite to an
//! asynchronous identity-exchange engine. The engine advances connection and
//! proof-exchange records on its own schedule; this crate lets a command
//! handler observe and address those records without racing the engine.
//!
//! # Architecture
//!
//! Three components, each independent of the others:
//!
//! - [`event_log`]: an append-only, multi-reader log of state-changed events.
//!   A waiter can block until a record reaches a target state, with replay of
//!   events that fired before the waiter attached and a hard deadline.
//! - [`resolve`]: the identifier resolution cascade. Test suites address
//!   records by whatever id they hold at the time (connection id,
//!   out-of-band id, invitation id, proof thread id); the cascade maps any
//!   of them to the single canonical record.
//! - [`project`]: translation of internal record states into the status
//!   vocabulary the test suite asserts against, including the `N/A` sentinel
//!   that hides intermediate states under auto-acceptance.
//!
//! The engine itself stays behind the read-only lookup traits in [`resolve`];
//! this crate never mutates a record store. All errors here are terminal for
//! the command being served: [`error::ResolveError::NotFound`] and
//! [`error::WaitError::Timeout`] are reported upward, never retried.

pub mod error;
pub mod event;
pub mod event_log;
pub mod project;
pub mod record;
pub mod resolve;

pub use error::{ResolveError, WaitError};
pub use event::{ConnectionStateChangedEvent, CorrelatedEvent, ProofStateChangedEvent};
pub use event_log::EventLog;
pub use project::{
    AutoAccept, ConnectionStatus, ConnectionStatusState, ProofStatus, project_connection,
    project_proof,
};
pub use record::{
    ConnectionRecord, DidExchangeState, LegacyConnectionState, OutOfBandRecord, OutOfBandRole,
    ProofExchangeRecord, ProofState,
};
pub use resolve::{
    ConnectionLookup, OutOfBandLookup, ProofLookup, resolve_connection, resolve_proof,
};
