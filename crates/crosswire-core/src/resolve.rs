//! Identifier resolution cascade.
//!
//! A test suite addresses a connection by whatever identifier it holds: the
//! connection id once a request message has been processed, but before that
//! only the out-of-band id or the invitation id, because the engine does not
//! materialize a connection at invitation time. The cascade hides that
//! timing detail: every interpretation is tried in order and the first hit
//! wins. Proof exchanges have no intermediate record type and resolve by
//! thread id alone.
//!
//! The lookup traits are the read-only view of the engine's record stores.
//! Implementations must never be mutated through this module; all record
//! mutation happens through the engine's own operations.

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::record::{ConnectionRecord, OutOfBandRecord, ProofExchangeRecord};

/// Read-only view of the engine's connection store.
#[async_trait]
pub trait ConnectionLookup: Send + Sync {
    /// Point lookup by canonical connection id.
    async fn connection_by_id(&self, connection_id: &str) -> Option<ConnectionRecord>;

    /// All connections spawned from an out-of-band record, in creation
    /// order. An out-of-band id can be reused, so this may return more than
    /// one record.
    async fn connections_by_out_of_band_id(&self, out_of_band_id: &str) -> Vec<ConnectionRecord>;
}

/// Read-only view of the engine's out-of-band store.
#[async_trait]
pub trait OutOfBandLookup: Send + Sync {
    /// Point lookup by the out-of-band record's own id.
    async fn out_of_band_by_id(&self, out_of_band_id: &str) -> Option<OutOfBandRecord>;

    /// Lookup by the id of the invitation message the record was created
    /// from. Distinct from the record's own id.
    async fn out_of_band_by_invitation_id(&self, invitation_id: &str)
    -> Option<OutOfBandRecord>;
}

/// Read-only view of the engine's proof exchange store.
#[async_trait]
pub trait ProofLookup: Send + Sync {
    /// All proof exchange records known to the engine.
    async fn proofs(&self) -> Vec<ProofExchangeRecord>;
}

/// Resolve a caller-supplied id to the one canonical connection record.
///
/// Interpretations are tried in order, first success wins:
///
/// 1. as a connection id (direct lookup);
/// 2. as an out-of-band id (earliest-created spawned connection);
/// 3. as an invitation id (resolve to the out-of-band record, then its
///    earliest-created spawned connection).
///
/// # Errors
///
/// [`ResolveError::NotFound`] when all three interpretations fail. An empty
/// spawned-connection list is a failure, never an empty success.
pub async fn resolve_connection<S>(store: &S, id: &str) -> Result<ConnectionRecord, ResolveError>
where
    S: ConnectionLookup + OutOfBandLookup + ?Sized,
{
    if let Some(connection) = store.connection_by_id(id).await {
        return Ok(connection);
    }

    let mut spawned = store.connections_by_out_of_band_id(id).await;
    if spawned.is_empty() {
        tracing::trace!(id, "no connection for out-of-band id, trying invitation id");
        if let Some(out_of_band) = store.out_of_band_by_invitation_id(id).await {
            spawned = store.connections_by_out_of_band_id(&out_of_band.out_of_band_id).await;
        }
    }

    earliest_created(spawned).ok_or_else(|| ResolveError::NotFound { id: id.to_string() })
}

/// Resolve a thread id to the one proof exchange record carrying it.
///
/// # Errors
///
/// [`ResolveError::NotFound`] when no known proof exchange matches.
pub async fn resolve_proof<S>(store: &S, thread_id: &str) -> Result<ProofExchangeRecord, ResolveError>
where
    S: ProofLookup + ?Sized,
{
    store
        .proofs()
        .await
        .into_iter()
        .find(|proof| proof.thread_id == thread_id)
        .ok_or_else(|| ResolveError::NotFound { id: thread_id.to_string() })
}

/// Deterministic tie-break for a reused out-of-band id: the earliest-created
/// connection wins on every call.
fn earliest_created(connections: Vec<ConnectionRecord>) -> Option<ConnectionRecord> {
    // Two connections sharing a creation sequence number would make the
    // tie-break ambiguous; the engine assigns them monotonically.
    debug_assert!(
        {
            let mut seen = connections.iter().map(|c| c.created_at).collect::<Vec<_>>();
            seen.sort_unstable();
            seen.windows(2).all(|pair| pair[0] != pair[1])
        },
        "duplicate creation sequence numbers in candidate set"
    );

    connections.into_iter().min_by_key(|connection| connection.created_at)
}
