#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mailrelay::{MailRelay, controller::find_config_file};
use mailrelay_common::{EmailAddress, logging};
use tokio::io::AsyncReadExt;

/// A mail transfer agent core: listener pools and outbound SMTP relay
#[derive(Parser, Debug)]
#[command(name = "mailrelay")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured listeners until interrupted
    Serve,
    /// Make a single delivery attempt
    Send {
        /// Envelope sender
        #[arg(long)]
        from: EmailAddress,

        /// Recipient; its domain decides where the message goes
        #[arg(long)]
        to: EmailAddress,

        /// Message to send, headers included (stdin if omitted)
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = find_config_file(cli.config)?;
    let relay = MailRelay::load(&config_path)?;

    logging::init();

    match cli.command {
        Command::Serve => relay.serve().await,
        Command::Send { from, to, file } => {
            let body = match file {
                Some(path) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                    anyhow::anyhow!("Failed to read message from {}: {e}", path.display())
                })?,
                None => {
                    let mut body = String::new();
                    tokio::io::stdin().read_to_string(&mut body).await?;
                    body
                }
            };

            relay.send(from, &to, &body).await
        }
    }
}
