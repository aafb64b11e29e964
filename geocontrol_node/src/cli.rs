// geocontrol_node/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// geocontrol: geometric SE(3) tracking controller for a quadrotor.
///
/// Reads `current_state` and `desired_state` messages as JSON lines and
/// publishes `rotor_speed_cmds` at a fixed rate.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the controller TOML file.
    #[arg(short, long, default_value = "assets/config/controller.toml")]
    pub config: PathBuf,

    /// Stop after this many seconds. Overrides `node.run_for_seconds`.
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Print the effective configuration (file + environment) and exit.
    #[arg(long, default_value_t = false)]
    pub print_config: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
