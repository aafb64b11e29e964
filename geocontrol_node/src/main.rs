// geocontrol_node/src/main.rs

use std::process::ExitCode;

use clap::Parser;
use geocontrol_node::prelude::*;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);

    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
