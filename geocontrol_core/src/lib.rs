// geocontrol_core/src/lib.rs

// The pure control library: no transport, no scheduling, no I/O.
pub mod control;
pub mod errors;
pub mod frames;
pub mod messages;
pub mod mixing;
pub mod prelude;
pub mod state_store;
pub mod types;
pub mod utils;
