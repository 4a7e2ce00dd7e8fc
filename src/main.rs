//! Unified quota-gate CLI.
//!
//! This binary provides a unified interface to all quota-gate components:
//! - `quota-gate serve` - Run the admission server
//! - `quota-gate user` - Inspect and adjust user quota and VIP state
//!
//! Each subcommand can also be run as a standalone binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// quota-gate unified CLI.
#[derive(Parser)]
#[command(
    name = "quota-gate",
    version,
    about = "Admission control for multi-tenant API gateways",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the admission server.
    #[command(name = "serve", alias = "server")]
    Serve(Box<gate_server::ServeArgs>),

    /// Inspect and adjust users in the store.
    #[command(name = "user")]
    User(gate_auth::UserArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => gate_server::cli::run(*args).await,
        Commands::User(args) => gate_auth::cli::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
