//! Error taxonomy for the coordination core.
//!
//! Both variants are terminal for the command being served. The core never
//! retries internally; polling with a fresh deadline after a timeout is the
//! caller's decision.

use std::time::Duration;

use thiserror::Error;

/// An identifier did not resolve to any record.
///
/// Definitive: every stage of the resolution cascade was tried. Distinct
/// from [`WaitError::Timeout`], where the record exists but has not reached
/// the awaited state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No record matched the correlation id through any cascade stage
    #[error("no record found for correlation id {id}")]
    NotFound {
        /// The id that failed to resolve
        id: String,
    },
}

/// A waiter's deadline elapsed before the awaited event arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The awaited record/state pair was not observed within the deadline
    #[error("timed out after {timeout:?} waiting for {correlation_id} to reach {target_state}")]
    Timeout {
        /// Correlation id the waiter was matching against
        correlation_id: String,
        /// Target state that was never observed
        target_state: String,
        /// The configured deadline
        timeout: Duration,
    },
}
