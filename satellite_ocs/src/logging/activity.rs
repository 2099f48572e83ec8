//! Activity log file lifecycle.
//!
//! A log is written to `<folder>/<prefix>[yymmddhh].tmp` while in progress. Each
//! append opens the file, writes one whole record and closes it again, so
//! nothing is buffered across a crash. Sealing renames the file to its final
//! name, which hands it to the archival queue watching the folder; a writer
//! never touches a sealed file again.
//!
//! On open, in-progress files left behind by an earlier run with the same
//! prefix are sealed first. The file matching the name this run will use is
//! left alone and appended to.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::alog::{self, LogLevel, LogRecord};
use crate::errors::LogError;

/// Suffix of a log that is still being written.
pub const FILE_TMP: &str = ".tmp";

/// The three activity logs kept on board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogName {
    Log,
    /// whole-orbit data
    Wod,
    Err,
}

impl LogName {
    pub fn prefix(self) -> &'static str {
        match self {
            LogName::Log => "log",
            LogName::Wod => "wod",
            LogName::Err => "err",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub folder: PathBuf,
    pub prefix: String,
    /// Add the generation hour to the file name (`log24060215`).
    pub stamp_on_open: bool,
    /// Add the seal time to the sealed name (`log24060215_240602153012`).
    pub stamp_on_seal: bool,
}

impl LogConfig {
    pub fn new(folder: impl Into<PathBuf>, name: LogName) -> Self {
        Self {
            folder: folder.into(),
            prefix: name.prefix().to_string(),
            stamp_on_open: true,
            stamp_on_seal: false,
        }
    }

    fn target_name(&self, now: DateTime<Utc>) -> PathBuf {
        let mut name = self.prefix.clone();
        if self.stamp_on_open {
            name.push_str(&now.format("%y%m%d%H").to_string());
        }
        self.folder.join(name)
    }

    /// `base`, plus `_yymmddhhMMSS` when sealed names carry the seal time.
    fn sealed_name(&self, base: &Path, now: DateTime<Utc>) -> PathBuf {
        let mut target = base.as_os_str().to_owned();
        if self.stamp_on_seal {
            target.push(format!("_{}", now.format("%y%m%d%H%M%S")));
        }
        PathBuf::from(target)
    }
}

/// `<filename>.tmp`
pub fn tmp_filename(filename: &Path) -> PathBuf {
    let mut s = filename.as_os_str().to_owned();
    s.push(FILE_TMP);
    PathBuf::from(s)
}

#[derive(Debug)]
pub struct ActivityLog {
    config: LogConfig,
    filename: PathBuf,
}

impl ActivityLog {
    pub fn open(config: LogConfig) -> Result<Self, LogError> {
        Self::open_at(config, Utc::now())
    }

    pub fn open_at(config: LogConfig, now: DateTime<Utc>) -> Result<Self, LogError> {
        fs::create_dir_all(&config.folder).map_err(|e| LogError::io(&config.folder, e))?;
        let filename = config.target_name(now);

        let recovered = seal_orphans(&config, &filename, now)?;
        if !recovered.is_empty() {
            info!(count = recovered.len(), "sealed logs left by a previous run");
        }

        debug!(file = %filename.display(), "opening log");
        Ok(Self { config, filename })
    }

    /// Final (sealed) name of the current log.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn in_progress_path(&self) -> PathBuf {
        tmp_filename(&self.filename)
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Write `record` if `requested` passes the process-wide threshold.
    ///
    /// Returns whether it was written.
    pub fn append(&self, requested: LogLevel, record: &LogRecord) -> Result<bool, LogError> {
        if !alog::enabled(requested) {
            return Ok(false);
        }
        self.append_bytes(&record.to_bytes())?;
        Ok(true)
    }

    /// Append raw bytes to the in-progress file, opening and closing it.
    pub fn append_bytes(&self, data: &[u8]) -> Result<(), LogError> {
        let tmp = self.in_progress_path();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&tmp)
            .map_err(|e| LogError::io(&tmp, e))?;
        f.write_all(data).map_err(|e| LogError::io(&tmp, e))?;
        f.flush().map_err(|e| LogError::io(&tmp, e))?;
        Ok(())
    }

    /// Seal the log. `None` if nothing was ever appended.
    pub fn seal(self) -> Result<Option<PathBuf>, LogError> {
        self.seal_current(Utc::now())
    }

    /// Seal the current log and continue in a freshly named one.
    pub fn roll(&mut self) -> Result<Option<PathBuf>, LogError> {
        let now = Utc::now();
        let sealed = self.seal_current(now)?;
        self.filename = self.config.target_name(now);
        Ok(sealed)
    }

    fn seal_current(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>, LogError> {
        let tmp = self.in_progress_path();
        if !tmp.exists() {
            debug!(file = %tmp.display(), "nothing to seal");
            return Ok(None);
        }
        let sealed = seal_file(&tmp, &self.config.sealed_name(&self.filename, now))?;
        info!(file = %sealed.display(), "log sealed");
        Ok(Some(sealed))
    }
}

/// Rename `tmp` to `target`, or to `target.N` if a sealed file of that name is
/// still waiting for archival.
fn seal_file(tmp: &Path, target: &Path) -> Result<PathBuf, LogError> {
    let mut dest = target.to_path_buf();
    let mut n = 1u32;
    while dest.exists() {
        let mut s = target.as_os_str().to_owned();
        s.push(format!(".{n}"));
        dest = PathBuf::from(s);
        n += 1;
    }
    fs::rename(tmp, &dest).map_err(|e| LogError::io(tmp, e))?;
    Ok(dest)
}

/// Seal every `<prefix>*.tmp` in the log folder except the one for `current`.
fn seal_orphans(
    config: &LogConfig,
    current: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, LogError> {
    let folder = config.folder.as_path();
    let current_tmp = tmp_filename(current);
    let mut sealed = Vec::new();

    let entries = fs::read_dir(folder).map_err(|e| LogError::io(folder, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LogError::io(folder, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&config.prefix) || !name.ends_with(FILE_TMP) {
            continue;
        }
        let path = entry.path();
        if path == current_tmp {
            debug!(file = name, "leaving current log");
            continue;
        }
        let base = folder.join(&name[..name.len() - FILE_TMP.len()]);
        match seal_file(&path, &config.sealed_name(&base, now)) {
            Ok(dest) => {
                info!(from = name, to = %dest.display(), "processing old log file");
                sealed.push(dest);
            }
            Err(e) => warn!(error = %e, "could not seal old log"),
        }
    }
    Ok(sealed)
}
