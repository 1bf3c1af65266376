use std::io;
use std::process::ExitCode;

use anyhow::Result;
use integresql_client::{ClientError, ErrorKind, IntegreSql};
use tracing::debug;

mod commands;
mod config;

use config::{
    cli::{self, Parser},
    trace,
};

fn main() -> ExitCode {
    // parses from cli or environment var
    let config = cli::Config::parse();
    let trace_config = match trace::Config::parse(&config.integresql_log, config.log_format) {
        Ok(trace_config) => trace_config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            return ExitCode::from(2);
        }
    };
    debug!(?config, ?trace_config);

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(&err)
        }
    }
}

fn run(config: cli::Config) -> Result<()> {
    let mut session = IntegreSql::new(config.client_config())?;
    let mut out = io::stdout().lock();
    commands::execute(&mut session, config.command, &mut out)?;
    session.close();
    Ok(())
}

/// 2 for bad input, 1 for everything the service or network rejected.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<ClientError>().map(ClientError::kind) {
        Some(ErrorKind::Precondition) | None => ExitCode::from(2),
        Some(_) => ExitCode::from(1),
    }
}
