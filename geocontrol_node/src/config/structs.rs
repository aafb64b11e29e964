// geocontrol_node/src/config/structs.rs

use std::path::PathBuf;
use std::time::Duration;

use geocontrol_core::prelude::{Gains, MixerConfig, ParamsError, PhysicalParams};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Node Config ==
// =========================================================================

/// Everything the controller node needs at startup. Loaded once; the rate and
/// the gains are fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,

    /// Feedback gains. Required; there are no sensible defaults.
    pub gains: Gains,

    #[serde(default)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    pub mixer: MixerConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

// --- Node ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSection {
    /// Control tick frequency in Hz.
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// A feed with no valid message for this long is reported as stale.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    /// Stop after this many seconds. Runs until shutdown when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_for_seconds: Option<f64>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            stale_after_ms: default_stale_after_ms(),
            run_for_seconds: None,
        }
    }
}

impl NodeSection {
    /// `None` when `rate_hz` does not give a representable, non-zero period.
    pub fn period(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(1.0 / self.rate_hz)
            .ok()
            .filter(|period| !period.is_zero())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Number of ticks that fit in `run_for_seconds`, if set. A duration shorter
    /// than one period still runs a single tick.
    pub fn tick_limit(&self) -> Option<u64> {
        self.run_for_seconds
            .map(|seconds| ((seconds * self.rate_hz).round() as u64).max(1))
    }
}

fn default_rate_hz() -> f64 {
    1000.0
}

fn default_stale_after_ms() -> u64 {
    500
}

// --- Vehicle ---

/// Airframe constants. Every field defaults to the reference quadrotor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VehicleConfig {
    /// [kg]
    pub mass: f64,
    /// [m/s^2]
    pub gravity: f64,
    /// Rotor hub to body center [m].
    pub arm_length: f64,
    pub lift_coefficient: f64,
    pub drag_coefficient: f64,
    /// Body-frame inertia tensor, row major [kg m^2].
    pub inertia: [[f64; 3]; 3],
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let params = PhysicalParams::default();
        Self {
            mass: params.mass,
            gravity: params.gravity,
            arm_length: params.arm_length,
            lift_coefficient: params.lift_coefficient,
            drag_coefficient: params.drag_coefficient,
            inertia: [
                [params.inertia[(0, 0)], params.inertia[(0, 1)], params.inertia[(0, 2)]],
                [params.inertia[(1, 0)], params.inertia[(1, 1)], params.inertia[(1, 2)]],
                [params.inertia[(2, 0)], params.inertia[(2, 1)], params.inertia[(2, 2)]],
            ],
        }
    }
}

impl VehicleConfig {
    /// Converts into validated physical parameters.
    pub fn to_params(&self) -> Result<PhysicalParams, ParamsError> {
        PhysicalParams::new(
            self.mass,
            self.gravity,
            self.arm_length,
            self.lift_coefficient,
            self.drag_coefficient,
            Matrix3::from_fn(|r, c| self.inertia[r][c]),
        )
    }
}

// --- Transport ---

/// Where the JSON-lines feeds come from and where rotor commands go.
/// `"-"` means the standard streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TransportConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(STDIO),
            output: PathBuf::from(STDIO),
        }
    }
}

/// Placeholder path for stdin / stdout.
pub const STDIO: &str = "-";

impl TransportConfig {
    pub fn input_is_stdin(&self) -> bool {
        self.input.as_os_str() == STDIO
    }

    pub fn output_is_stdout(&self) -> bool {
        self.output.as_os_str() == STDIO
    }
}
