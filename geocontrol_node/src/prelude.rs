// geocontrol_node/src/prelude.rs

// Re-export the entire geocontrol_core prelude so the pure types
// (`StateStore`, `GeometricController`, `ActuatorMixer`, ...) are one import away.
pub use geocontrol_core::prelude::*;

pub use crate::app::{init_logging, run, run_with_config};
pub use crate::cli::Cli;
pub use crate::config::NodeConfig;
pub use crate::errors::{ConfigError, NodeError, TickError};
pub use crate::node::{ControllerNode, NodeStats, NodeSummary, TickOutcome};
pub use crate::scheduling::{FixedRateScheduler, SchedulerStats, TickInfo, TickScheduler};
pub use crate::transport::{
    run_feed, spawn_feed, ChannelSink, FeedMessage, FeedStats, JsonLinesSink, RecordingSink,
    RotorCommandSink, DEFAULT_QUEUE_CAPACITY,
};
