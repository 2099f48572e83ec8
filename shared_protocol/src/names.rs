// names.rs: namespace and command numbering shared with the ground station.
//
// The numeric values are on the wire. New entries go at the end.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Namespace {
    Reserved = 0,
    Ops = 1,
    Sstv = 2,
    Pacsat = 3,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Reserved,
        Namespace::Ops,
        Namespace::Sstv,
        Namespace::Pacsat,
    ];

    pub fn from_u8(n: u8) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Namespace::Reserved => "reserved",
            Namespace::Ops => "ops",
            Namespace::Sstv => "sstv",
            Namespace::Pacsat => "pacsat",
        }
    }

    /// Human-readable name of `code` in this namespace, if it has one.
    pub fn command_name(self, code: u16) -> Option<&'static str> {
        match self {
            Namespace::Ops => OpsCommand::from_code(code).map(OpsCommand::name),
            Namespace::Pacsat => PacsatCommand::from_code(code).map(PacsatCommand::name),
            Namespace::Reserved | Namespace::Sstv => None,
        }
    }

    /// Look up a command code by name. Numeric strings are accepted as-is.
    pub fn command_from_str(self, cmd: &str) -> Result<u16, NameError> {
        if let Ok(code) = cmd.parse::<u16>() {
            return Ok(code);
        }
        let unknown = || NameError::UnknownCommand {
            namespace: self.name().to_string(),
            name: cmd.to_string(),
        };
        match self {
            Namespace::Ops => cmd.parse::<OpsCommand>().map(|c| c as u16).map_err(|_| unknown()),
            Namespace::Pacsat => cmd
                .parse::<PacsatCommand>()
                .map(|c| c as u16)
                .map_err(|_| unknown()),
            Namespace::Reserved | Namespace::Sstv => {
                Err(NameError::NoCommands(self.name().to_string()))
            }
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Namespace {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ns| ns.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| NameError::UnknownNamespace(s.to_string()))
    }
}

// ================================ Ops =======================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpsCommand {
    Reserved = 0,
    Pm1 = 1,
    XBandRepeaterMode = 2,
    AprsMode = 3,
    CrewMode = 4,
    SafeMode = 5,
    PacsatMode = 6,
    TelemMode = 7,
    AntSelect = 8,
    Time = 9,
    ResetComputer = 10,
    ResetRadio = 11,
    EnableTelemetry = 12,
    EnableTimePkts = 13,
    EnableStatusPkts = 14,
    ResetIors = 15,
    SymbolRate = 16,
    RollLogs = 17,
    EnableWod = 18,
    EnableErrorCollection = 19,
    SstvSetMode = 20,
    SstvLoop = 21,
    SstvStop = 22,
    SstvPreProcess = 23,
    NoOp = 24,
    ChangeCommandKey = 25,
    HdmiImageDisplay = 26,
    LogsLevel = 27,
}

impl OpsCommand {
    pub const ALL: [OpsCommand; 28] = [
        OpsCommand::Reserved,
        OpsCommand::Pm1,
        OpsCommand::XBandRepeaterMode,
        OpsCommand::AprsMode,
        OpsCommand::CrewMode,
        OpsCommand::SafeMode,
        OpsCommand::PacsatMode,
        OpsCommand::TelemMode,
        OpsCommand::AntSelect,
        OpsCommand::Time,
        OpsCommand::ResetComputer,
        OpsCommand::ResetRadio,
        OpsCommand::EnableTelemetry,
        OpsCommand::EnableTimePkts,
        OpsCommand::EnableStatusPkts,
        OpsCommand::ResetIors,
        OpsCommand::SymbolRate,
        OpsCommand::RollLogs,
        OpsCommand::EnableWod,
        OpsCommand::EnableErrorCollection,
        OpsCommand::SstvSetMode,
        OpsCommand::SstvLoop,
        OpsCommand::SstvStop,
        OpsCommand::SstvPreProcess,
        OpsCommand::NoOp,
        OpsCommand::ChangeCommandKey,
        OpsCommand::HdmiImageDisplay,
        OpsCommand::LogsLevel,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            OpsCommand::Reserved => "reserved",
            OpsCommand::Pm1 => "pm1",
            OpsCommand::XBandRepeaterMode => "xband-repeater-mode",
            OpsCommand::AprsMode => "aprs-mode",
            OpsCommand::CrewMode => "crew-mode",
            OpsCommand::SafeMode => "safe-mode",
            OpsCommand::PacsatMode => "pacsat-mode",
            OpsCommand::TelemMode => "telem-mode",
            OpsCommand::AntSelect => "ant-select",
            OpsCommand::Time => "time",
            OpsCommand::ResetComputer => "reset-computer",
            OpsCommand::ResetRadio => "reset-radio",
            OpsCommand::EnableTelemetry => "enable-telemetry",
            OpsCommand::EnableTimePkts => "enable-time-pkts",
            OpsCommand::EnableStatusPkts => "enable-status-pkts",
            OpsCommand::ResetIors => "reset-iors",
            OpsCommand::SymbolRate => "symbol-rate",
            OpsCommand::RollLogs => "roll-logs",
            OpsCommand::EnableWod => "enable-wod",
            OpsCommand::EnableErrorCollection => "enable-error-collection",
            OpsCommand::SstvSetMode => "sstv-set-mode",
            OpsCommand::SstvLoop => "sstv-loop",
            OpsCommand::SstvStop => "sstv-stop",
            OpsCommand::SstvPreProcess => "sstv-pre-process",
            OpsCommand::NoOp => "no-op",
            OpsCommand::ChangeCommandKey => "change-command-key",
            OpsCommand::HdmiImageDisplay => "hdmi-image-display",
            OpsCommand::LogsLevel => "logs-level",
        }
    }
}

impl FromStr for OpsCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(&wanted))
            .ok_or(())
    }
}

// =============================== Pacsat =====================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacsatCommand {
    Reserved = 0,
    EnablePb = 1,
    EnableUplink = 2,
    InstallFile = 3,
    DeleteFile = 4,
    DeleteFolder = 5,
    DefaultFileExpiryPeriod = 6, // days
    FileExpiryPeriod = 7,        // days
    DirMaintPeriod = 8,          // seconds, one node per period
    Ftl0MaintPeriod = 9,         // seconds, whole upload queue per period
    FileQueueCheckPeriod = 10,   // seconds
    MaxFileSize = 11,            // kb
    MaxUploadAge = 12,
    ExecuteFile = 13,
}

impl PacsatCommand {
    pub const ALL: [PacsatCommand; 14] = [
        PacsatCommand::Reserved,
        PacsatCommand::EnablePb,
        PacsatCommand::EnableUplink,
        PacsatCommand::InstallFile,
        PacsatCommand::DeleteFile,
        PacsatCommand::DeleteFolder,
        PacsatCommand::DefaultFileExpiryPeriod,
        PacsatCommand::FileExpiryPeriod,
        PacsatCommand::DirMaintPeriod,
        PacsatCommand::Ftl0MaintPeriod,
        PacsatCommand::FileQueueCheckPeriod,
        PacsatCommand::MaxFileSize,
        PacsatCommand::MaxUploadAge,
        PacsatCommand::ExecuteFile,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            PacsatCommand::Reserved => "reserved",
            PacsatCommand::EnablePb => "enable-pb",
            PacsatCommand::EnableUplink => "enable-uplink",
            PacsatCommand::InstallFile => "install-file",
            PacsatCommand::DeleteFile => "delete-file",
            PacsatCommand::DeleteFolder => "delete-folder",
            PacsatCommand::DefaultFileExpiryPeriod => "default-file-expiry-period",
            PacsatCommand::FileExpiryPeriod => "file-expiry-period",
            PacsatCommand::DirMaintPeriod => "dir-maint-period",
            PacsatCommand::Ftl0MaintPeriod => "ftl0-maint-period",
            PacsatCommand::FileQueueCheckPeriod => "file-queue-check-period",
            PacsatCommand::MaxFileSize => "max-file-size",
            PacsatCommand::MaxUploadAge => "max-upload-age",
            PacsatCommand::ExecuteFile => "execute-file",
        }
    }
}

impl FromStr for PacsatCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(&wanted))
            .ok_or(())
    }
}
