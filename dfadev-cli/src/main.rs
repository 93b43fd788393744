//! dfadev-cli - Command-line interface for dfadev
//!
//! Edits the automaton, feeds it input and queries acceptance.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use dfadev_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dfadev-cli")]
#[command(about = "Command-line interface for the dfadev automaton device")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, env = "DFADEV_SERVER", default_value = "127.0.0.1:7411")]
    server: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ping the server
    Ping,

    /// Show server and device info
    Info,

    /// Return to the start state
    Reset,

    /// Set a transition.
    ///
    /// SYMBOL is a single character, a 0x-prefixed hex byte or a decimal
    /// byte of two or more digits.
    Add {
        from: u8,
        symbol: String,
        to: u8,
    },

    /// Mark a state accepting
    Accept { state: u8 },

    /// Mark a state rejecting
    Reject { state: u8 },

    /// Feed input symbols to the automaton
    Feed {
        /// Input text, or @path to read bytes from a file
        input: String,

        /// Interpret INPUT as hex bytes (e.g. "30 31 ff")
        #[arg(long)]
        hex: bool,

        /// Print the acceptance answer afterwards
        #[arg(short, long)]
        query: bool,
    },

    /// Ask whether the current state is accepting
    Query,

    /// Read raw device bytes
    Read {
        #[arg(short, long, default_value = "0")]
        position: u64,

        #[arg(short, long, default_value = "4")]
        size: usize,
    },

    /// Issue a raw control request
    Ioctl {
        /// Control code (decimal or 0x-prefixed hex)
        request: String,

        /// Argument bytes as hex
        #[arg(default_value = "")]
        arg: String,
    },

    /// Publish device state for a successor and stop the server
    PrepareUpdate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = ConnectionConfig::new(cli.server).with_client_name("dfadev-cli");
    let client = Client::new(config);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    let conn = client.connection();
    tokio::spawn(async move {
        let _ = conn.read_loop().await;
    });

    // Give read_loop a chance to start
    tokio::task::yield_now().await;

    match commands::execute(&client, cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
