// src/main.rs
mod commands;
mod config;
mod errors;
mod logging;
mod net;
mod replay;

use anyhow::Result;
use shared_protocol::{KeyError, SecretStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::commands::CommandHandler;
use crate::config::{Command, Config};
use crate::logging::{ActivityLog, ErrorCode, EventCode, LogLevel, LogRecord, alog};
use crate::replay::ReplayGuard;

#[tokio::main]
async fn main() -> Result<()> {
    let (cfg, command) = config::Cli::parse_and_build_config()?;

    // -------- logging ----------
    let _trace_guard = init_tracing(&cfg);

    match command {
        Command::DumpLog { file, raw } => dump_log(&file, raw),
        Command::Run => run(cfg).await,
    }
}

fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env()
        .add_directive("satellite_ocs=info".parse().unwrap())
        .add_directive("shared_protocol=info".parse().unwrap())
        .add_directive("tokio=warn".parse().unwrap());
    let console = fmt::layer().compact();

    match &cfg.trace_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "satellite_ocs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().compact().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}

fn dump_log(file: &Path, raw: bool) -> Result<()> {
    let contents = logging::reader::read_log(file)?;
    if raw {
        for r in &contents.records {
            println!("{}  {}", logging::reader::describe(r), hex::encode(r.to_bytes()));
        }
        if let Some(d) = &contents.damage {
            println!("{d}");
        }
    } else {
        print!("{}", logging::reader::render(&contents));
    }
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    info!(?cfg, "IORS command authentication starting");
    alog::set_level(cfg.log_level);

    // -------- key + replay state ----------
    let mut secrets = SecretStore::new();
    let key_err = secrets.load(&cfg.key_file).err();
    match &key_err {
        None => info!(key_checksum = secrets.checksum(), "command key loaded"),
        Some(KeyError::NotFound(_)) => {}
        Some(e) => warn!(error = %e, "keyfile not usable"),
    }
    let (guard, watermark_err) = ReplayGuard::open(&cfg.command_time_file);
    info!(
        last_command_time = guard.watermark(),
        tolerance = guard.policy().tolerance,
        path = %guard.path().display(),
        "replay guard ready"
    );

    // -------- activity log ----------
    let log = ActivityLog::open(cfg.log_config())?;
    info!(file = %log.filename().display(), "activity log open");
    let secrets = Arc::new(secrets);
    let handler = Arc::new(CommandHandler::new(
        secrets.clone(),
        guard,
        log,
        cfg.ground_callsign.clone(),
    ));
    handler.record(LogLevel::Error, &LogRecord::alog1(EventCode::Startup, 0));
    if secrets.is_default() {
        warn!(key_checksum = secrets.checksum(), "running on the built-in command key");
        handler.record(LogLevel::Error, &LogRecord::error(ErrorCode::KeyNotLoaded));
    }
    if watermark_err.is_some() {
        handler.record(LogLevel::Error, &LogRecord::error(ErrorCode::CommandTimeNotStored));
    }
    if let Some(rec) = logging::disk::disk_space_record(&cfg.log_folder) {
        handler.record(LogLevel::Info, &rec);
    }

    // -------- uplink ----------
    let rx_sock = Arc::new(net::udp::bind(&cfg).await?);
    info!(addr = %cfg.bind_addr, "listening for uplink commands");
    let receiver = commands::spawn_receiver(handler.clone(), rx_sock).await;

    info!("IORS running. Press Ctrl+C to stop");

    // -------- graceful shutdown ----------
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(?e, "failed to install Ctrl+C handler");
    }
    info!("shutdown signal received");
    receiver.abort();
    let _ = receiver.await;

    handler.record(LogLevel::Error, &LogRecord::alog1(EventCode::ProgramExit, 0));
    if let Some(last) = handler.last_command() {
        info!(
            command = %commands::handler::command_label(&last),
            date_time = last.date_time,
            last_command_time = handler.guard().watermark(),
            "last command"
        );
    }
    match Arc::try_unwrap(handler) {
        Ok(h) => match h.into_log().seal() {
            Ok(Some(sealed)) => info!(file = %sealed.display(), "activity log sealed"),
            Ok(None) => {}
            Err(e) => error!(error = %e, "could not seal activity log"),
        },
        // a command still in flight; the next start seals it
        Err(_) => warn!("activity log left in progress"),
    }
    Ok(())
}
