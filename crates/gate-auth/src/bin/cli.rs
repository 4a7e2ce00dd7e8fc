//! Standalone user administration binary.

use std::process::ExitCode;

use clap::Parser;
use gate_auth::{UserArgs, cli};

#[tokio::main]
async fn main() -> ExitCode {
    let args = UserArgs::parse();

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
