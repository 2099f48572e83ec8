// src/main.rs
// Ground station side: sign and send IORS commands.
mod uplink;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use shared_protocol::{CommandEnvelope, DEFAULT_UPLINK_PORT, SecretStore};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ground_control", about = "Sign and send IORS uplink commands")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Sign a command and send it to the satellite
    Send {
        #[command(flatten)]
        cmd: CommandArgs,
        #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_UPLINK_PORT}"))]
        to: String,
    },
    /// Sign a command and print it as JSON
    Show {
        #[command(flatten)]
        cmd: CommandArgs,
    },
    /// Write a new random keyfile
    Keygen { path: PathBuf },
}

#[derive(Args, Debug)]
struct CommandArgs {
    /// ops, sstv or pacsat
    namespace: String,
    /// Command name (e.g. roll-logs) or number
    command: String,
    /// Up to four 16-bit arguments
    args: Vec<u16>,
    #[arg(long, default_value = "iors_command.key")]
    key_file: PathBuf,
    /// Override the command time (seconds since the epoch)
    #[arg(long)]
    date_time: Option<u32>,
}

impl CommandArgs {
    fn envelope(&self) -> Result<CommandEnvelope> {
        let mut secrets = SecretStore::new();
        if let Err(e) = secrets.load(&self.key_file) {
            warn!(error = %e, "signing with the built-in key");
        }
        let date_time = match self.date_time {
            Some(t) => t,
            None => uplink::now_date_time()?,
        };
        uplink::build_envelope(&secrets, &self.namespace, &self.command, &self.args, date_time)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_control=info".parse().unwrap())
                .add_directive("shared_protocol=info".parse().unwrap()),
        )
        .compact()
        .init();

    match Cli::parse().command {
        Cmd::Send { cmd, to } => {
            let env = cmd.envelope()?;
            uplink::send(&env, &to).await?;
            println!("{}", hex::encode(env.to_bytes()));
        }
        Cmd::Show { cmd } => {
            let env = cmd.envelope()?;
            println!("{}", serde_json::to_string_pretty(&env)?);
        }
        Cmd::Keygen { path } => {
            let key = uplink::fresh_key();
            key.save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), key_checksum = key.checksum(), "keyfile written");
        }
    }
    Ok(())
}
