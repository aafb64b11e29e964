// geocontrol_node/src/lib.rs

// This prelude is for convenience for the binary and the integration tests.
pub mod prelude;

// Startup, configuration and the command line.
pub mod app;
pub mod cli;
pub mod config;
pub mod errors;

// The running node: transport in and out, the fixed-rate loop and the tick itself.
pub mod node;
pub mod scheduling;
pub mod transport;
