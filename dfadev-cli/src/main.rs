//! dfadev-cli - Command-line interface for dfadev hosts

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use dfadev_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dfadev-cli")]
#[command(about = "Command-line interface for the dfadev byte-stream automaton")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7411", env = "DFADEV_SERVER")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the server
    Ping,

    /// Show host and automaton info
    Info,

    /// Return the automaton to state 0
    Reset,

    /// Add a transition STATE --SYMBOL--> NEXT
    ///
    /// Bytes are decimal (97), hex (0x61) or a single character ('a').
    Add {
        state: String,
        symbol: String,
        next: String,
    },

    /// Mark a state as accepting
    Accept { state: String },

    /// Mark a state as rejecting
    Reject { state: String },

    /// Feed symbols to the automaton
    Feed {
        /// Input text, or hex when --hex is given
        input: String,

        /// Treat the input as hex-encoded bytes
        #[arg(long)]
        hex: bool,
    },

    /// Read the current verdict
    Poll {
        /// Number of verdict bytes to read
        #[arg(short = 'n', long, default_value = "1")]
        size: usize,
    },

    /// Send a raw control code
    Control {
        /// Control code (decimal or 0x-prefixed hex)
        code: String,

        /// Hex-encoded payload
        #[arg(default_value = "")]
        payload: String,
    },

    /// Publish the automaton for a new host version and stop the host
    Handoff,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ping => "ping",
            Commands::Info => "info",
            Commands::Reset => "reset",
            Commands::Add { .. } => "add",
            Commands::Accept { .. } => "accept",
            Commands::Reject { .. } => "reject",
            Commands::Feed { .. } => "feed",
            Commands::Poll { .. } => "poll",
            Commands::Control { .. } => "control",
            Commands::Handoff => "handoff",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ConnectionConfig::new(cli.server)
        .with_request_timeout(Duration::from_secs(cli.timeout));
    let client = Client::new(config);

    tracing::debug!("Connecting to {}", cli.server);
    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    let name = cli.command.name();
    tracing::debug!("Executing {}", name);
    match commands::execute(&client, cli.command).await {
        Ok(output) => {
            tracing::debug!("{} succeeded", name);
            println!("{}", output)
        }
        Err(e) => {
            tracing::debug!("{} failed: {}", name, e);
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["dfadev-cli", "feed", "--hex", "6162"]).unwrap();
        assert_eq!(cli.server.port(), 7411);
        assert_eq!(cli.command.name(), "feed");
        assert!(matches!(cli.command, Commands::Feed { hex: true, .. }));

        let cli = Cli::try_parse_from(["dfadev-cli", "-s", "10.0.0.1:9000", "poll", "-n", "4"])
            .unwrap();
        assert_eq!(cli.server.port(), 9000);
        assert!(matches!(cli.command, Commands::Poll { size: 4 }));

        assert!(Cli::try_parse_from(["dfadev-cli", "add", "0", "a"]).is_err());
    }
}
