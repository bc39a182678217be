//! `vigil` — terminal client for the gateway's HTTP API.
//!
//! Mirrors `vigil-gateway`'s own `Cli`/`Command` shape: an optional
//! subcommand that defaults to the interactive REPL.

mod client;
mod repl;
mod session;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Terminal client for the Vigil web-change monitor")]
struct Cli {
    /// Base URL of the gateway, e.g. http://127.0.0.1:4180
    #[arg(long, global = true, default_value = "http://127.0.0.1:4180")]
    url: String,

    /// Username whose saved session should be resumed, if any.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the interactive REPL (default when no subcommand is given).
    Shell,
    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => repl::run(cli.url, cli.user).await,
        Command::Version => {
            println!("vigil {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
