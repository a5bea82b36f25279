use std::process::ExitCode;

use abacus::{ErrorKind, SessionError};
use anyhow::Context;
use log::{error, info};

mod cli;

use crate::cli::{ParseOutcome, parse_args};

const LOG_ENV: &str = "ABACUS_LOG";

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SessionError>().map(SessionError::kind) {
        Some(ErrorKind::Config) => ExitCode::from(2),
        Some(ErrorKind::Io) => ExitCode::from(3),
        Some(ErrorKind::Network) => ExitCode::from(4),
        None => ExitCode::FAILURE,
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let params = match parse_args(std::env::args_os())? {
        ParseOutcome::Help(text) => {
            println!("{text}");
            return Ok(ExitCode::FAILURE);
        }
        ParseOutcome::Run(params) => params,
    };

    let results = abacus::run(&params, |_, result| {
        println!("Result from server: {result}");
    })
    .with_context(|| {
        format!(
            "session with {}:{} did not complete",
            params.address, params.port
        )
    })?;
    info!(
        "Wrote {} results to {}",
        results.len(),
        params.result.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let env = env_logger::Env::new().filter_or(LOG_ENV, "warn");
    env_logger::Builder::from_env(env).init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    }
}
