//! Command handlers, one module per backchannel protocol family.

pub mod did_exchange;
pub mod out_of_band;
pub mod present_proof;

pub use did_exchange::DidExchangeCommands;
pub use out_of_band::OutOfBandCommands;
pub use present_proof::{CredentialChoice, PresentProofCommands, PresentationSelection};
