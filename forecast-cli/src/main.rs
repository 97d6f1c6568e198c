//! Binary crate for the `forecast` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Persisting history and city counts between runs
//! - Human-friendly output and error messages

use std::process::ExitCode;

use clap::Parser;
use forecast_core::{ClientSignal, ForecastError};
use tracing_subscriber::EnvFilter;

mod cli;
mod render;
mod store;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn exit_code(signal: ClientSignal) -> ExitCode {
    match signal {
        ClientSignal::BadRequest => ExitCode::from(2),
        ClientSignal::NotFound => ExitCode::from(3),
        ClientSignal::TryAgainLater => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cmd = cli::Cli::parse();
    init_logging(cmd.verbose);

    match cmd.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ForecastError>() {
            Some(forecast_err) => {
                tracing::debug!("{:?}", err);
                eprintln!("{}", forecast_err.user_message());
                exit_code(forecast_err.signal())
            }
            None => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
