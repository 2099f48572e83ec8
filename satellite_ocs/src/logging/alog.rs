// logging/alog.rs: binary activity-log records, compatible with the PACSAT ALOG decoder.
//
// Every record starts with the same 9-byte header:
//   event u8 | len u8 | tstamp u32 | serial_no u16 | rxchan u8
// and `len` is the full size of the record, so a reader can step over records
// it does not understand. All integers are little-endian.
use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

pub const ALOG_1_LEN: usize = 9;
pub const ALOG_2_LEN: usize = ALOG_1_LEN + CALLSIGN_LEN + 1;
pub const ALOG_1F_LEN: usize = ALOG_1_LEN + VARS_LEN;
pub const ALOG_2F_LEN: usize = ALOG_2_LEN + VARS_LEN;

pub const CALLSIGN_LEN: usize = 6;
const VARS_LEN: usize = 6 * 4;

/// Receive channel recorded in every header.
const RX_CHANNEL: u8 = 1;

// ============================== Severity ====================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LogLevel {
    /// As a threshold: write nothing.
    #[serde(alias = "none", alias = "no")]
    Off = 0,
    #[serde(alias = "err")]
    Error = 1,
    #[serde(alias = "warning")]
    Warn = 2,
    Info = 3,
}

impl LogLevel {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(LogLevel::Off),
            1 => Some(LogLevel::Error),
            2 => Some(LogLevel::Warn),
            3 => Some(LogLevel::Info),
            _ => None,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "no" | "off" => Ok(LogLevel::Off),
            "err" | "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Error as u8);

/// Process-wide threshold; applies to every log from the next call on.
pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::SeqCst)).unwrap_or(LogLevel::Error)
}

/// Would a record of `requested` severity be written right now?
pub fn enabled(requested: LogLevel) -> bool {
    let threshold = level();
    threshold != LogLevel::Off && requested != LogLevel::Off && requested <= threshold
}

// =============================== Events =====================================

/// Event codes. Values are fixed; new events are added after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventCode {
    Startup = 1,
    /// serial_no carries an `ErrorCode`
    IorsErr = 2,
    /// serial_no carries the exit code
    ProgramExit = 3,
    /// ground station call plus namespace/command/args
    Command = 4,
    DiskSpace = 5,
    FsStartup = 6,
    FsShutdown = 7,
    /// serial_no carries the new level
    IorsLogLevel = 8,
    /// serial_no carries a `RejectCode`
    CommandRejected = 9,
}

/// Codes at or above this are unknown to this build.
pub const NUMBER_OF_EVENTS: u8 = 10;

impl EventCode {
    /// Known events in code order, starting at 1.
    pub const ALL: [EventCode; NUMBER_OF_EVENTS as usize - 1] = [
        EventCode::Startup,
        EventCode::IorsErr,
        EventCode::ProgramExit,
        EventCode::Command,
        EventCode::DiskSpace,
        EventCode::FsStartup,
        EventCode::FsShutdown,
        EventCode::IorsLogLevel,
        EventCode::CommandRejected,
    ];

    pub fn from_u8(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            EventCode::Startup => "STARTUP",
            EventCode::IorsErr => "IORS_ERR",
            EventCode::ProgramExit => "EXIT",
            EventCode::Command => "COMMAND",
            EventCode::DiskSpace => "FREE DISK",
            EventCode::FsStartup => "FS START",
            EventCode::FsShutdown => "FS STOP",
            EventCode::IorsLogLevel => "LOG LEVEL",
            EventCode::CommandRejected => "CMD REJECT",
        }
    }
}

/// Errors worth a log record. Repeating faults belong in error telemetry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Unknown = 0,
    RemovingPidFile = 1,
    CouldNotStoreWod = 2,
    SendingPkt = 3,
    SettingTime = 4,
    MaxRadioRetries = 5,
    MaxTncRetries = 6,
    SstvFailure = 7,
    PacsatFailure = 8,
    DirewolfFailure = 9,
    PttFailure = 10,
    TncFailure = 11,
    CrewIntFailure = 12,
    SettingRadioMode = 13,
    CheckingDiskSpace = 14,
    FsDirLoadFailure = 15,
    FsTncFailure = 16,
    CommandTimeNotStored = 17,
    KeyNotLoaded = 18,
}

/// Why a command was refused, stored in `serial_no` of `CommandRejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RejectCode {
    BadMac = 1,
    Stale = 2,
    Malformed = 3,
}

// =============================== Records ====================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Alog1,
    Alog1F,
    Alog2,
    Alog2F,
}

impl RecordKind {
    pub fn len(self) -> usize {
        match self {
            RecordKind::Alog1 => ALOG_1_LEN,
            RecordKind::Alog1F => ALOG_1F_LEN,
            RecordKind::Alog2 => ALOG_2_LEN,
            RecordKind::Alog2F => ALOG_2F_LEN,
        }
    }

    /// The variant is identified by its length alone.
    pub fn from_len(len: u8) -> Option<Self> {
        match len as usize {
            ALOG_1_LEN => Some(RecordKind::Alog1),
            ALOG_1F_LEN => Some(RecordKind::Alog1F),
            ALOG_2_LEN => Some(RecordKind::Alog2),
            ALOG_2F_LEN => Some(RecordKind::Alog2F),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw event code; may be one this build does not know.
    pub event: u8,
    pub tstamp: u32,
    pub serial_no: u16,
    pub rxchan: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    pub call: [u8; CALLSIGN_LEN],
    pub ssid: u8,
}

impl Station {
    /// First six bytes of `callsign`, NUL padded.
    pub fn new(callsign: &str, ssid: u8) -> Self {
        let mut call = [0u8; CALLSIGN_LEN];
        for (dst, src) in call.iter_mut().zip(callsign.bytes()) {
            *dst = src;
        }
        Self { call, ssid }
    }

    pub fn callsign(&self) -> String {
        let end = self.call.iter().position(|&b| b == 0).unwrap_or(CALLSIGN_LEN);
        String::from_utf8_lossy(&self.call[..end]).into_owned()
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.callsign(), self.ssid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Alog1 { header: Header },
    Alog1F { header: Header, vars: [u32; 6] },
    Alog2 { header: Header, station: Station },
    Alog2F { header: Header, station: Station, vars: [u32; 6] },
}

fn now_tstamp() -> u32 {
    u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX)
}

fn header(event: EventCode, serial_no: u16) -> Header {
    Header {
        event: event as u8,
        tstamp: now_tstamp(),
        serial_no,
        rxchan: RX_CHANNEL,
    }
}

impl LogRecord {
    pub fn alog1(event: EventCode, serial_no: u16) -> Self {
        LogRecord::Alog1 {
            header: header(event, serial_no),
        }
    }

    pub fn alog1f(event: EventCode, vars: [u32; 6]) -> Self {
        LogRecord::Alog1F {
            header: header(event, 0),
            vars,
        }
    }

    pub fn alog2(event: EventCode, callsign: &str, ssid: u8, serial_no: u16) -> Self {
        LogRecord::Alog2 {
            header: header(event, serial_no),
            station: Station::new(callsign, ssid),
        }
    }

    pub fn alog2f(event: EventCode, callsign: &str, ssid: u8, vars: [u32; 6]) -> Self {
        LogRecord::Alog2F {
            header: header(event, 0),
            station: Station::new(callsign, ssid),
            vars,
        }
    }

    /// `IORS_ERR` with the code in `serial_no`.
    pub fn error(code: ErrorCode) -> Self {
        Self::alog1(EventCode::IorsErr, code as u16)
    }

    /// Same record with a fixed timestamp.
    #[cfg(test)]
    pub fn at(mut self, tstamp: u32) -> Self {
        self.header_mut().tstamp = tstamp;
        self
    }

    pub fn header(&self) -> &Header {
        match self {
            LogRecord::Alog1 { header }
            | LogRecord::Alog1F { header, .. }
            | LogRecord::Alog2 { header, .. }
            | LogRecord::Alog2F { header, .. } => header,
        }
    }

    #[cfg(test)]
    fn header_mut(&mut self) -> &mut Header {
        match self {
            LogRecord::Alog1 { header }
            | LogRecord::Alog1F { header, .. }
            | LogRecord::Alog2 { header, .. }
            | LogRecord::Alog2F { header, .. } => header,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            LogRecord::Alog1 { .. } => RecordKind::Alog1,
            LogRecord::Alog1F { .. } => RecordKind::Alog1F,
            LogRecord::Alog2 { .. } => RecordKind::Alog2,
            LogRecord::Alog2F { .. } => RecordKind::Alog2F,
        }
    }

    /// Value of the `len` byte.
    pub fn len(&self) -> usize {
        self.kind().len()
    }

    /// `None` for codes this build does not know.
    pub fn event_code(&self) -> Option<EventCode> {
        EventCode::from_u8(self.header().event)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let h = self.header();
        let mut out = Vec::with_capacity(self.len());
        out.push(h.event);
        out.push(self.len() as u8);
        out.extend_from_slice(&h.tstamp.to_le_bytes());
        out.extend_from_slice(&h.serial_no.to_le_bytes());
        out.push(h.rxchan);

        let push_station = |out: &mut Vec<u8>, s: &Station| {
            out.extend_from_slice(&s.call);
            out.push(s.ssid);
        };
        let push_vars = |out: &mut Vec<u8>, vars: &[u32; 6]| {
            for v in vars {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };
        match self {
            LogRecord::Alog1 { .. } => {}
            LogRecord::Alog1F { vars, .. } => push_vars(&mut out, vars),
            LogRecord::Alog2 { station, .. } => push_station(&mut out, station),
            LogRecord::Alog2F { station, vars, .. } => {
                push_station(&mut out, station);
                push_vars(&mut out, vars);
            }
        }
        debug_assert_eq!(out.len(), self.len());
        out
    }

    /// Decode one complete record. `buf` must be exactly one record long and its
    /// `len` byte must name a known variant.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < ALOG_1_LEN || buf[1] as usize != buf.len() {
            return None;
        }
        let kind = RecordKind::from_len(buf[1])?;
        let header = Header {
            event: buf[0],
            tstamp: u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]),
            serial_no: u16::from_le_bytes([buf[6], buf[7]]),
            rxchan: buf[8],
        };
        let station_at = |at: usize| {
            let mut call = [0u8; CALLSIGN_LEN];
            call.copy_from_slice(&buf[at..at + CALLSIGN_LEN]);
            Station {
                call,
                ssid: buf[at + CALLSIGN_LEN],
            }
        };
        let vars_at = |at: usize| {
            let mut vars = [0u32; 6];
            for (i, v) in vars.iter_mut().enumerate() {
                let o = at + i * 4;
                *v = u32::from_le_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
            }
            vars
        };
        Some(match kind {
            RecordKind::Alog1 => LogRecord::Alog1 { header },
            RecordKind::Alog1F => LogRecord::Alog1F {
                header,
                vars: vars_at(ALOG_1_LEN),
            },
            RecordKind::Alog2 => LogRecord::Alog2 {
                header,
                station: station_at(ALOG_1_LEN),
            },
            RecordKind::Alog2F => LogRecord::Alog2F {
                header,
                station: station_at(ALOG_1_LEN),
                vars: vars_at(ALOG_2_LEN),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_sizes_match_the_ground_decoder() {
        assert_eq!(ALOG_1_LEN, 9);
        assert_eq!(ALOG_2_LEN, 16);
        assert_eq!(ALOG_1F_LEN, 33);
        assert_eq!(ALOG_2F_LEN, 40);

        let records = [
            LogRecord::alog1(EventCode::Startup, 0),
            LogRecord::alog1f(EventCode::DiskSpace, [1, 2, 3, 4, 5, 6]),
            LogRecord::alog2(EventCode::Command, "G0KLA", 3, 7),
            LogRecord::alog2f(EventCode::Command, "VE2TCP", 0, [9; 6]),
        ];
        for r in &records {
            let bytes = r.to_bytes();
            assert_eq!(bytes.len(), r.len());
            assert_eq!(bytes[1] as usize, bytes.len());
        }
    }

    #[test]
    fn error_record_layout() {
        let r = LogRecord::error(ErrorCode::CommandTimeNotStored).at(0x6553_F100);
        assert_eq!(
            r.to_bytes(),
            vec![2, 9, 0x00, 0xF1, 0x53, 0x65, 17, 0, RX_CHANNEL]
        );
        assert_eq!(r.event_code(), Some(EventCode::IorsErr));
    }

    #[test]
    fn alog2f_places_station_before_vars() {
        let r = LogRecord::alog2f(EventCode::Command, "G0KLA", 2, [0x0102_0304, 0, 0, 0, 0, 0xFF])
            .at(1);
        let b = r.to_bytes();
        assert_eq!(&b[9..15], b"G0KLA\0");
        assert_eq!(b[15], 2);
        assert_eq!(&b[16..20], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&b[36..40], &[0xFF, 0, 0, 0]);
        assert_eq!(LogRecord::decode(&b), Some(r));
    }

    #[test]
    fn long_callsigns_are_cut_to_six() {
        let s = Station::new("VERYLONGCALL", 15);
        assert_eq!(&s.call, b"VERYLO");
        assert_eq!(s.to_string(), "VERYLO-15");
    }

    #[test]
    fn decode_refuses_bad_lengths() {
        let mut b = LogRecord::alog1(EventCode::Startup, 0).to_bytes();
        assert!(LogRecord::decode(&b[..8]).is_none());
        b[1] = 10;
        assert!(LogRecord::decode(&b).is_none());
    }

    #[test]
    fn event_codes_are_stable() {
        for (i, ev) in EventCode::ALL.iter().enumerate() {
            assert_eq!(*ev as usize, i + 1);
            assert_eq!(EventCode::from_u8(*ev as u8), Some(*ev));
        }
        assert_eq!(EventCode::from_u8(0), None);
        assert_eq!(EventCode::from_u8(NUMBER_OF_EVENTS), None);
        assert_eq!(EventCode::from_u8(2), Some(EventCode::IorsErr));
    }

    #[test]
    fn unknown_event_codes_decode() {
        let mut b = LogRecord::alog1(EventCode::Startup, 0).to_bytes();
        b[0] = NUMBER_OF_EVENTS + 40;
        let r = LogRecord::decode(&b).unwrap();
        assert_eq!(r.event_code(), None);
        assert_eq!(r.header().event, 50);
    }

    #[test]
    fn threshold_filtering() {
        let _lvl = crate::logging::test_support::level_guard(LogLevel::Warn);
        assert!(enabled(LogLevel::Error));
        assert!(enabled(LogLevel::Warn));
        assert!(!enabled(LogLevel::Info));
        set_level(LogLevel::Off);
        assert!(!enabled(LogLevel::Error));
        assert!(!enabled(LogLevel::Off));
        set_level(LogLevel::Error);
        assert_eq!(level(), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
    }
}
