//! Property tests for the event log's replay and ordering guarantees.
//!
//! For arbitrary emission sequences, a waiter must observe exactly the first
//! matching event of its record/state pair, and must time out (never hang,
//! never cross-satisfy) when the pair is absent.

use std::time::Duration;

use crosswire_core::error::WaitError;
use crosswire_core::event::ConnectionStateChangedEvent;
use crosswire_core::event_log::EventLog;
use crosswire_core::record::{ConnectionRecord, DidExchangeState};
use proptest::prelude::*;

const STATES: [DidExchangeState; 4] = [
    DidExchangeState::RequestReceived,
    DidExchangeState::ResponseSent,
    DidExchangeState::Completed,
    DidExchangeState::Abandoned,
];

fn runtime() -> tokio::runtime::Runtime {
    // Paused time makes the timeout cases complete immediately.
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("current-thread runtime")
}

fn event(record_index: usize, state: DidExchangeState, sequence: u64) -> ConnectionStateChangedEvent {
    ConnectionStateChangedEvent {
        connection: ConnectionRecord {
            connection_id: format!("conn-{record_index}"),
            out_of_band_id: None,
            state,
            legacy_state: None,
            // Reused as an emission marker so tests can identify which
            // event a waiter observed.
            created_at: sequence,
        },
        previous_state: None,
    }
}

proptest! {
    #[test]
    fn waiter_sees_first_match_or_times_out(
        emissions in proptest::collection::vec((0usize..3, 0usize..STATES.len()), 0..24),
        record_index in 0usize..3,
        state_index in 0usize..STATES.len(),
    ) {
        let target = STATES[state_index];
        let correlation_id = format!("conn-{record_index}");

        let expected = emissions
            .iter()
            .position(|&(record, state)| record == record_index && STATES[state] == target);

        runtime().block_on(async {
            let log = EventLog::new();
            for (sequence, &(record, state)) in emissions.iter().enumerate() {
                log.publish(event(record, STATES[state], sequence as u64));
            }

            let result = log.wait_for(&correlation_id, target, Duration::from_millis(10)).await;

            match expected {
                Some(sequence) => {
                    let observed = result.expect("matching event must be replayed");
                    prop_assert_eq!(observed.connection.created_at, sequence as u64);
                    prop_assert_eq!(observed.connection.state, target);
                }
                None => {
                    prop_assert!(
                        matches!(result, Err(WaitError::Timeout { .. })),
                        "expected WaitError::Timeout"
                    );
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn waiters_never_hide_events_from_each_other(
        emissions in proptest::collection::vec((0usize..2, 0usize..STATES.len()), 1..16),
    ) {
        runtime().block_on(async {
            let log = EventLog::new();
            for (sequence, &(record, state)) in emissions.iter().enumerate() {
                log.publish(event(record, STATES[state], sequence as u64));
            }

            // Every waiter over every pair present in the sequence succeeds,
            // regardless of how many waiters came before it.
            for &(record, state) in &emissions {
                let observed = log
                    .wait_for(&format!("conn-{record}"), STATES[state], Duration::from_millis(10))
                    .await
                    .expect("published pair must satisfy its waiter");
                prop_assert_eq!(observed.connection.state, STATES[state]);
            }
            prop_assert_eq!(log.len(), emissions.len());
            Ok(())
        })?;
    }
}
