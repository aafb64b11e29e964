// geocontrol_node/src/app.rs

//! Startup wiring: config -> controller + mixer -> feeds -> scheduler loop.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use geocontrol_core::prelude::{ActuatorMixer, GeometricController, StateStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{NodeConfig, TransportConfig};
use crate::errors::{ConfigError, NodeError};
use crate::node::{ControllerNode, NodeSummary};
use crate::scheduling::FixedRateScheduler;
use crate::transport::{
    spawn_feed, ChannelSink, JsonLinesSink, DEFAULT_QUEUE_CAPACITY, ROTOR_SPEED_TOPIC,
};

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over `default_filter`.
/// Logs go to stderr; stdout is reserved for rotor commands.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Loads the configuration and applies command-line overrides.
pub fn load_config(cli: &Cli) -> Result<NodeConfig, NodeError> {
    let mut config = NodeConfig::load(&cli.config)?;
    if let Some(seconds) = cli.duration {
        config.node.run_for_seconds = Some(seconds);
        config.validate()?;
    }
    Ok(config)
}

/// Runs the node described by `cli` until the configured duration elapses or
/// the output closes. Returns `None` when only the configuration was printed.
pub fn run(cli: &Cli) -> Result<Option<NodeSummary>, NodeError> {
    let config = load_config(cli)?;

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(None);
    }

    let summary = run_with_config(&config)?;
    Ok(Some(summary))
}

/// Builds every component from `config` and runs the control loop on the
/// calling thread. Feed input is read on one background thread and rotor
/// commands are written on another; the output is drained before returning.
pub fn run_with_config(config: &NodeConfig) -> Result<NodeSummary, NodeError> {
    let params = config.vehicle.to_params()?;
    let controller = GeometricController::new(config.gains, params)?;
    let mixer = ActuatorMixer::new(&params, config.mixer)?;

    let store = Arc::new(StateStore::new());
    start_feed(&config.transport, Arc::clone(&store))?;
    let sink = open_sink(&config.transport)?;

    let mut scheduler = FixedRateScheduler::from_rate(config.node.rate_hz)
        .ok_or(ConfigError::InvalidRate(config.node.rate_hz))?
        .with_tick_limit(config.node.tick_limit());

    info!(
        "Controller running at {} Hz (stale after {} ms), publishing `{}`{}.",
        config.node.rate_hz,
        config.node.stale_after_ms,
        ROTOR_SPEED_TOPIC,
        match config.node.run_for_seconds {
            Some(s) => format!(" for {} s", s),
            None => String::new(),
        }
    );

    let mut node = ControllerNode::new(
        store,
        controller,
        mixer,
        sink,
        config.node.stale_after(),
    );
    let summary = node.run(&mut scheduler);

    let sink = node.into_sink();
    let dropped = sink.dropped();
    match sink.finish() {
        Ok(written) => info!(
            "Wrote {} rotor command(s), {} dropped on a full queue.",
            written, dropped
        ),
        Err(e) => error!("Rotor command output ended with an error: {}", e),
    }
    Ok(summary)
}

// The feed thread is detached: a blocking read on stdin cannot be interrupted,
// and the process exit tears it down.
fn start_feed(transport: &TransportConfig, store: Arc<StateStore>) -> Result<(), NodeError> {
    if transport.input_is_stdin() {
        info!("Reading feeds from stdin.");
        spawn_feed(BufReader::new(io::stdin()), store)?;
    } else {
        let file = File::open(&transport.input).map_err(open_error(&transport.input))?;
        info!("Reading feeds from {}.", transport.input.display());
        spawn_feed(BufReader::new(file), store)?;
    }
    Ok(())
}

fn open_sink(transport: &TransportConfig) -> Result<ChannelSink, NodeError> {
    let writer: Box<dyn Write + Send> = if transport.output_is_stdout() {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&transport.output).map_err(open_error(&transport.output))?;
        Box::new(BufWriter::new(file))
    };
    Ok(ChannelSink::spawn(
        JsonLinesSink::new(writer),
        DEFAULT_QUEUE_CAPACITY,
    )?)
}

fn open_error(path: &Path) -> impl FnOnce(io::Error) -> NodeError + '_ {
    move |source| NodeError::Open {
        path: path.to_path_buf(),
        source,
    }
}
