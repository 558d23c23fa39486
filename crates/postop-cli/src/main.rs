//! `postop` binary entry point.

use clap::Parser;
use postop_cli::{CliArgs, describe_error, run};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Keys may live in a local .env file.
    dotenv::dotenv().ok();

    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}
