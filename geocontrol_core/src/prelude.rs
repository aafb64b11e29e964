// geocontrol_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::control::{ControlLaw, ControlOutput, TrackingErrors};
pub use crate::errors::{ControlError, MessageError, MixerError, ParamsError};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::messages::{Actuators, Odometry, TrajectoryPoint};
pub use crate::state_store::{FeedHealth, StateSnapshot, StateStore, StoreHealth};
pub use crate::types::{
    CurrentState, DesiredState, Gains, PhysicalParams, RotorSpeedCommand, WrenchCommand,
};

// --- Concrete Implementations (Export common ones for convenience) ---
pub use crate::control::{compute_wrench, GeometricController};
pub use crate::mixing::{ActuatorMixer, MixerConfig};
pub use crate::utils::so3::{hat, signed_sqrt, vee};
