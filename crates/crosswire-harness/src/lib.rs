//! Deterministic simulation harness for backchannel testing.
//!
//! [`SimEngine`] is an in-memory stand-in for the real protocol engine:
//! same record stores, same event streams, but the wire is replaced by
//! scripted delivery methods so tests control exactly when an inbound
//! message "arrives". Ids are minted from a seeded RNG for reproducible
//! runs.
//!
//! The [`scenario`] module layers a declarative step list with mandatory
//! oracle verification on top, for whole-flow tests.

pub mod scenario;
pub mod sim_engine;

pub use scenario::{OracleFn, RunnableScenario, Scenario, ScenarioStep, World};
pub use sim_engine::{SimEngine, SimEngineBuilder};
