// Command line interface and optional TOML file.
// Precedence: CLI flag, then file, then built-in default.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use shared_protocol::DEFAULT_UPLINK_PORT;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{LogConfig, LogLevel, LogName};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub key_file: PathBuf,
    pub command_time_file: PathBuf,
    pub log_folder: PathBuf,
    pub log_name: LogName,
    pub log_level: LogLevel,
    pub stamp_on_open: bool,
    pub stamp_on_seal: bool,
    pub ground_callsign: String,
    pub trace_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_UPLINK_PORT}"),
            key_file: PathBuf::from("iors_command.key"),
            command_time_file: PathBuf::from("last_command_time.txt"),
            log_folder: PathBuf::from("queue"),
            log_name: LogName::Log,
            log_level: LogLevel::Error,
            stamp_on_open: true,
            stamp_on_seal: false,
            ground_callsign: String::new(),
            trace_dir: None,
        }
    }
}

impl Config {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            stamp_on_open: self.stamp_on_open,
            stamp_on_seal: self.stamp_on_seal,
            ..LogConfig::new(&self.log_folder, self.log_name)
        }
    }
}

/// Every key is optional; missing ones fall through to the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_addr: Option<String>,
    key_file: Option<PathBuf>,
    command_time_file: Option<PathBuf>,
    log_folder: Option<PathBuf>,
    log_name: Option<LogName>,
    log_level: Option<LogLevel>,
    stamp_on_open: Option<bool>,
    stamp_on_seal: Option<bool>,
    ground_callsign: Option<String>,
    trace_dir: Option<PathBuf>,
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

#[derive(Parser, Debug, Clone)]
#[command(name = "satellite_ocs", about = "IORS uplink command authentication")]
pub struct Cli {
    /// TOML file with any of the settings below
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)] pub bind_addr: Option<String>,
    #[arg(long)] pub key_file: Option<PathBuf>,
    #[arg(long)] pub command_time_file: Option<PathBuf>,
    #[arg(long)] pub log_folder: Option<PathBuf>,
    /// log, wod or err
    #[arg(long, value_enum)]
    pub log_name: Option<LogName>,
    /// none, err, warn or info
    #[arg(long)]
    pub log_level: Option<LogLevel>,
    #[arg(long)] pub stamp_on_open: Option<bool>,
    #[arg(long)] pub stamp_on_seal: Option<bool>,
    #[arg(long)] pub ground_callsign: Option<String>,
    /// Also write diagnostics to a daily file here
    #[arg(long)]
    pub trace_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Authenticate uplink commands (default)
    Run,
    /// Print an activity log file
    DumpLog {
        file: PathBuf,
        /// Also print each record's bytes in hex
        #[arg(long)]
        raw: bool,
    },
}

impl Cli {
    pub fn parse_and_build_config() -> Result<(Config, Command)> {
        let c = <Cli as Parser>::parse();
        let cfg = c.build_config()?;
        Ok((cfg, c.command.unwrap_or(Command::Run)))
    }

    pub fn build_config(&self) -> Result<Config> {
        let file = match &self.config {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };
        let d = Config::default();
        let c = self.clone();
        Ok(Config {
            bind_addr: c.bind_addr.or(file.bind_addr).unwrap_or(d.bind_addr),
            key_file: c.key_file.or(file.key_file).unwrap_or(d.key_file),
            command_time_file: c
                .command_time_file
                .or(file.command_time_file)
                .unwrap_or(d.command_time_file),
            log_folder: c.log_folder.or(file.log_folder).unwrap_or(d.log_folder),
            log_name: c.log_name.or(file.log_name).unwrap_or(d.log_name),
            log_level: c.log_level.or(file.log_level).unwrap_or(d.log_level),
            stamp_on_open: c.stamp_on_open.or(file.stamp_on_open).unwrap_or(d.stamp_on_open),
            stamp_on_seal: c.stamp_on_seal.or(file.stamp_on_seal).unwrap_or(d.stamp_on_seal),
            ground_callsign: c
                .ground_callsign
                .or(file.ground_callsign)
                .unwrap_or(d.ground_callsign),
            trace_dir: c.trace_dir.or(file.trace_dir).or(d.trace_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let cli = Cli::try_parse_from(["satellite_ocs"]).unwrap();
        assert_eq!(cli.build_config().unwrap(), Config::default());
        assert_eq!(cli.command, None);
    }

    #[test]
    fn cli_overrides_file_overrides_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iors.toml");
        fs::write(
            &path,
            r#"
bind_addr = "127.0.0.1:9000"
log_level = "info"
log_name = "wod"
stamp_on_seal = true
"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "satellite_ocs",
            "--config",
            path.to_str().unwrap(),
            "--bind-addr",
            "127.0.0.1:9100",
            "--log-level",
            "warn",
        ])
        .unwrap();
        let cfg = cli.build_config().unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9100");
        assert_eq!(cfg.log_level, LogLevel::Warn);
        assert_eq!(cfg.log_name, LogName::Wod);
        assert!(cfg.stamp_on_seal);
        assert!(cfg.stamp_on_open);
        assert_eq!(cfg.key_file, PathBuf::from("iors_command.key"));

        let log = cfg.log_config();
        assert_eq!(log.prefix, "wod");
        assert!(log.stamp_on_seal);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "bind_adr = \"x\"\n").unwrap();
        let cli =
            Cli::try_parse_from(["satellite_ocs", "--config", path.to_str().unwrap()]).unwrap();
        assert!(cli.build_config().is_err());
    }

    #[test]
    fn dump_log_subcommand() {
        let cli = Cli::try_parse_from(["satellite_ocs", "dump-log", "queue/log24060215"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::DumpLog {
                file: PathBuf::from("queue/log24060215"),
                raw: false,
            })
        );
        assert!(Cli::try_parse_from(["satellite_ocs", "--log-level", "loud"]).is_err());
        assert!(Cli::try_parse_from(["satellite_ocs", "--log-name", "audit"]).is_err());
        let cli = Cli::try_parse_from(["satellite_ocs", "--log-name", "err"]).unwrap();
        assert_eq!(cli.build_config().unwrap().log_config().prefix, "err");
    }
}
