//! Command-level error type.

use crosswire_core::error::{ResolveError, WaitError};
use thiserror::Error;

use crate::engine::EngineError;

/// Terminal failure of one backchannel command.
///
/// The variants preserve the distinction the test suite relies on:
/// `NotFound` means the identifier resolves to nothing, `Timeout` means the
/// record exists but never reached the awaited state. Neither is retried
/// here; polling again with a fresh deadline is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The supplied identifier did not resolve through any cascade stage
    #[error(transparent)]
    NotFound(#[from] ResolveError),

    /// The awaited state transition never arrived within the deadline
    #[error(transparent)]
    Timeout(#[from] WaitError),

    /// The engine itself refused or failed the operation
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The requested credential id matches no candidate for the referent.
    /// Selecting an arbitrary candidate instead would mask wallet state
    /// drift, so this fails loudly.
    #[error("no candidate credential {cred_id} for referent {referent}")]
    UnknownCredential {
        /// Referent key from the presentation request
        referent: String,
        /// Credential id the test suite asked for
        cred_id: String,
    },

    /// A resolvable-DID exchange was requested without a DID
    #[error("their DID is not specified")]
    MissingTheirDid,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn not_found_and_timeout_stay_distinguishable() {
        let not_found = CommandError::from(ResolveError::NotFound { id: "x".into() });
        let timeout = CommandError::from(WaitError::Timeout {
            correlation_id: "x".into(),
            target_state: "done".into(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(not_found, CommandError::NotFound(_)));
        assert!(matches!(timeout, CommandError::Timeout(_)));
    }
}
