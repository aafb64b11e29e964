// geocontrol_node/src/node.rs

//! The control tick: snapshot -> control law -> mixer -> sink.

use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use geocontrol_core::prelude::{
    ActuatorMixer, ControlError, ControlLaw, FeedHealth, RotorSpeedCommand, StateStore,
    StoreHealth,
};
use tracing::{error, info, trace, warn};

use crate::errors::TickError;
use crate::scheduling::{SchedulerStats, TickInfo, TickScheduler};
use crate::transport::{RotorCommandSink, CURRENT_STATE_TOPIC, DESIRED_STATE_TOPIC};

/// Result of a tick that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Published(RotorSpeedCommand),
    /// At least one feed has not delivered a valid message yet. Nothing is published.
    AwaitingState,
}

/// Per-node counters, reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub ticks: u64,
    pub published: u64,
    pub awaiting_state: u64,
    pub control_failures: u64,
    pub mixer_failures: u64,
    pub sink_failures: u64,
}

impl NodeStats {
    pub fn skipped(&self) -> u64 {
        self.control_failures + self.mixer_failures + self.sink_failures
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSummary {
    pub node: NodeStats,
    pub scheduler: SchedulerStats,
}

/// Owns one control law, the mixer and the output sink, and reads state from a
/// shared [`StateStore`] that the feed threads write into.
pub struct ControllerNode<L: ControlLaw, S: RotorCommandSink> {
    store: Arc<StateStore>,
    law: L,
    mixer: ActuatorMixer,
    sink: S,
    stale_after: Duration,
    health: StoreHealth,
    stats: NodeStats,
    /// Length of the current run of failed ticks; failures are logged once per run.
    failure_streak: u64,
}

impl<L: ControlLaw, S: RotorCommandSink> ControllerNode<L, S> {
    pub fn new(
        store: Arc<StateStore>,
        law: L,
        mixer: ActuatorMixer,
        sink: S,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            law,
            mixer,
            sink,
            stale_after,
            health: StoreHealth {
                current: FeedHealth::Waiting,
                desired: FeedHealth::Waiting,
            },
            stats: NodeStats::default(),
            failure_streak: 0,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn health(&self) -> &StoreHealth {
        &self.health
    }

    /// One evaluation of the control pipeline on the latest snapshots.
    ///
    /// The store locks are only held while the snapshots are copied out.
    /// Any error leaves the sink untouched.
    pub fn tick(&mut self) -> Result<TickOutcome, TickError> {
        let snapshot = self.store.snapshot();
        let Some((current, desired)) = snapshot.ready() else {
            return Ok(TickOutcome::AwaitingState);
        };

        let output = self.law.compute(current, desired)?;
        let command = self.mixer.allocate(&output.wrench)?;
        self.sink.publish(&command)?;

        trace!(
            ex = output.errors.ex.norm(),
            ev = output.errors.ev.norm(),
            er = output.errors.er.norm(),
            thrust = output.wrench.thrust,
            "published {:?}",
            command.speeds()
        );
        Ok(TickOutcome::Published(command))
    }

    /// Re-evaluates feed liveness and logs transitions.
    pub fn check_health(&mut self, now: Instant) {
        let health = self.store.health(now, self.stale_after);
        log_transition(CURRENT_STATE_TOPIC, self.health.current, health.current);
        log_transition(DESIRED_STATE_TOPIC, self.health.desired, health.desired);
        self.health = health;
    }

    /// Scheduler callback: health check, tick, bookkeeping.
    /// Breaks the loop only when the output stream is gone for good.
    pub fn step(&mut self, info: TickInfo) -> ControlFlow<()> {
        self.check_health(Instant::now());
        let result = self.tick();
        self.stats.ticks += 1;

        match result {
            Ok(TickOutcome::Published(_)) => {
                self.stats.published += 1;
                if self.failure_streak > 0 {
                    info!(
                        "Publishing resumed at tick {} after {} skipped tick(s).",
                        info.index, self.failure_streak
                    );
                    self.failure_streak = 0;
                }
                ControlFlow::Continue(())
            }
            Ok(TickOutcome::AwaitingState) => {
                if self.stats.awaiting_state == 0 {
                    info!(
                        "Waiting for `{}` and `{}` before publishing.",
                        CURRENT_STATE_TOPIC, DESIRED_STATE_TOPIC
                    );
                }
                self.stats.awaiting_state += 1;
                ControlFlow::Continue(())
            }
            Err(e) => self.record_failure(info, e),
        }
    }

    fn record_failure(&mut self, info: TickInfo, e: TickError) -> ControlFlow<()> {
        match &e {
            TickError::Control(_) => self.stats.control_failures += 1,
            TickError::Mixer(_) => self.stats.mixer_failures += 1,
            TickError::Sink(_) => self.stats.sink_failures += 1,
        }

        if let TickError::Sink(io_err) = &e {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                error!("Rotor command output closed at tick {}: {}. Stopping.", info.index, io_err);
                return ControlFlow::Break(());
            }
        }

        if self.failure_streak == 0 {
            match &e {
                TickError::Control(ControlError::DegenerateThrust { .. })
                | TickError::Control(ControlError::DegenerateHeading { .. }) => warn!(
                    "Tick {} skipped, reference cannot be tracked: {}",
                    info.index, e
                ),
                _ => warn!("Tick {} skipped: {}", info.index, e),
            }
        }
        self.failure_streak += 1;
        ControlFlow::Continue(())
    }

    /// Drives the node with `scheduler` until it stops, then logs a summary.
    pub fn run(&mut self, scheduler: &mut dyn TickScheduler) -> NodeSummary {
        let scheduler_stats = scheduler.run(&mut |info| self.step(info));
        let summary = NodeSummary {
            node: self.stats,
            scheduler: scheduler_stats,
        };
        info!(
            "Controller stopped after {} tick(s): {} published, {} awaiting state, {} skipped, {} overrun(s).",
            summary.node.ticks,
            summary.node.published,
            summary.node.awaiting_state,
            summary.node.skipped(),
            summary.scheduler.overruns
        );
        summary
    }
}

fn log_transition(topic: &str, before: FeedHealth, after: FeedHealth) {
    match (before, after) {
        (FeedHealth::Waiting, FeedHealth::Fresh) => {
            info!("First `{}` message received.", topic)
        }
        (FeedHealth::Waiting | FeedHealth::Fresh, FeedHealth::Stale { age }) => warn!(
            "`{}` feed is stale: no valid message for {:?}. Holding the last good state.",
            topic, age
        ),
        (FeedHealth::Stale { age }, FeedHealth::Fresh) => {
            info!("`{}` feed recovered after {:?}.", topic, age)
        }
        _ => {}
    }
}
