// geocontrol_node/src/scheduling.rs

use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

/// What the scheduler hands to every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Zero-based tick counter.
    pub index: u64,
    /// The deadline this tick was scheduled for.
    pub scheduled_at: Instant,
    pub period: Duration,
}

/// Bookkeeping reported when a scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    /// Ticks that started late or ran for longer than one period.
    pub overruns: u64,
    /// Deadlines dropped because the loop fell more than a full period behind.
    pub skipped_deadlines: u64,
}

/// The contract for anything that drives the control tick.
/// The tick returns `ControlFlow::Break` to stop the loop early.
pub trait TickScheduler {
    fn run(&mut self, tick: &mut dyn FnMut(TickInfo) -> ControlFlow<()>) -> SchedulerStats;
}

/// Calls the tick at a fixed rate on the calling thread, sleeping until each deadline.
///
/// Deadlines are absolute (`start + n * period`), so the rate does not drift
/// with the tick duration. When the loop falls more than one whole period
/// behind, the missed deadlines are dropped rather than run back-to-back.
#[derive(Debug, Clone)]
pub struct FixedRateScheduler {
    period: Duration,
    tick_limit: Option<u64>,
}

impl FixedRateScheduler {
    /// `None` when `rate_hz` is not a positive finite number or its period does
    /// not fit in a non-zero [`Duration`].
    pub fn from_rate(rate_hz: f64) -> Option<Self> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return None;
        }
        let period = Duration::try_from_secs_f64(1.0 / rate_hz).ok()?;
        if period.is_zero() {
            return None;
        }
        Some(Self {
            period,
            tick_limit: None,
        })
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            tick_limit: None,
        }
    }

    /// Stop after `limit` ticks.
    pub fn with_tick_limit(mut self, limit: Option<u64>) -> Self {
        self.tick_limit = limit;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn tick_limit(&self) -> Option<u64> {
        self.tick_limit
    }
}

impl TickScheduler for FixedRateScheduler {
    fn run(&mut self, tick: &mut dyn FnMut(TickInfo) -> ControlFlow<()>) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut deadline = Instant::now();

        loop {
            if self.tick_limit.is_some_and(|limit| stats.ticks >= limit) {
                break;
            }

            let now = Instant::now();
            if now < deadline {
                thread::sleep(deadline - now);
            }

            let started = Instant::now();
            let info = TickInfo {
                index: stats.ticks,
                scheduled_at: deadline,
                period: self.period,
            };
            let flow = tick(info);
            stats.ticks += 1;

            let finished = Instant::now();
            deadline += self.period;
            if finished > deadline {
                stats.overruns += 1;
                let behind = finished - deadline;
                if behind > self.period {
                    let missed = (behind.as_nanos() / self.period.as_nanos().max(1)) as u64;
                    if stats.skipped_deadlines == 0 {
                        warn!(
                            "Tick {} took {:?} (period {:?}); dropping {} missed deadline(s).",
                            info.index,
                            finished - started,
                            self.period,
                            missed
                        );
                    }
                    stats.skipped_deadlines += missed;
                    deadline = finished;
                }
            }

            if flow.is_break() {
                break;
            }
        }

        stats
    }
}
