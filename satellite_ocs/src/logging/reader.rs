// logging/reader.rs: walk a log file record by record using the `len` byte.
//
// There is no resync marker: parsing stops at the first record whose length is
// unknown or that runs past the end of the file.
use chrono::DateTime;
use std::fmt;
use std::fs;
use std::path::Path;

use super::alog::{LogRecord, RecordKind};
use crate::errors::LogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damage {
    /// `len` byte names no known variant.
    UnknownLength { offset: usize, len: u8 },
    /// File ends part way through a record.
    Truncated { offset: usize, have: usize, need: usize },
}

impl fmt::Display for Damage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Damage::UnknownLength { offset, len } => {
                write!(f, "file is damaged at byte {offset}: record length {len}")
            }
            Damage::Truncated { offset, have, need } => write!(
                f,
                "file is truncated at byte {offset}: {have} of {need} bytes"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContents {
    pub records: Vec<LogRecord>,
    pub damage: Option<Damage>,
}

pub fn parse_log(bytes: &[u8]) -> LogContents {
    let mut out = LogContents::default();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < 2 {
            out.damage = Some(Damage::Truncated {
                offset,
                have: rest.len(),
                need: 2,
            });
            break;
        }
        let len = rest[1];
        let Some(kind) = RecordKind::from_len(len) else {
            out.damage = Some(Damage::UnknownLength { offset, len });
            break;
        };
        let need = kind.len();
        if rest.len() < need {
            out.damage = Some(Damage::Truncated {
                offset,
                have: rest.len(),
                need,
            });
            break;
        }
        match LogRecord::decode(&rest[..need]) {
            Some(r) => out.records.push(r),
            None => {
                out.damage = Some(Damage::UnknownLength { offset, len });
                break;
            }
        }
        offset += need;
    }
    out
}

pub fn read_log(path: impl AsRef<Path>) -> Result<LogContents, LogError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| LogError::io(path, e))?;
    Ok(parse_log(&bytes))
}

/// One line per record: time, event label, then the payload fields.
pub fn describe(record: &LogRecord) -> String {
    let h = record.header();
    let when = DateTime::from_timestamp(i64::from(h.tstamp), 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| h.tstamp.to_string());
    let event = match record.event_code() {
        Some(code) => code.label().to_string(),
        None => format!("Unknown Event: {}", h.event),
    };
    let detail = match record {
        LogRecord::Alog1 { .. } => format!("{}", h.serial_no),
        LogRecord::Alog1F { vars, .. } => format!("{} {:?}", h.serial_no, vars),
        LogRecord::Alog2 { station, .. } => format!("{station} {}", h.serial_no),
        LogRecord::Alog2F { station, vars, .. } => format!("{station} {vars:?}"),
    };
    format!("{when}  {event:<10} {detail}")
}

/// Human-readable listing, as printed by `dump-log`.
pub fn render(contents: &LogContents) -> String {
    let mut out = String::from("IORS Activity Log\nTimestamp            Event      Data\n");
    for r in &contents.records {
        out.push_str(&describe(r));
        out.push('\n');
    }
    if let Some(d) = &contents.damage {
        out.push_str(&d.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::alog::{ALOG_2F_LEN, ErrorCode, EventCode};

    fn mixed() -> Vec<LogRecord> {
        vec![
            LogRecord::alog1(EventCode::Startup, 0).at(1_717_341_012),
            LogRecord::alog1f(EventCode::DiskSpace, [100, 200, 0, 0, 0, 0]).at(1_717_341_013),
            LogRecord::alog2(EventCode::Command, "G0KLA", 1, 5).at(1_717_341_014),
            LogRecord::alog2f(EventCode::Command, "VE2TCP", 11, [1, 17, 0, 0, 0, 0])
                .at(1_717_341_015),
            LogRecord::error(ErrorCode::KeyNotLoaded).at(1_717_341_016),
        ]
    }

    #[test]
    fn reads_back_mixed_variants() {
        let records = mixed();
        let bytes: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
        let got = parse_log(&bytes);
        assert_eq!(got.damage, None);
        assert_eq!(got.records, records);
    }

    #[test]
    fn truncated_tail_keeps_earlier_records() {
        let records = mixed();
        let mut bytes: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
        let full = bytes.len();
        let cut = LogRecord::alog2f(EventCode::Command, "X", 0, [0; 6]).to_bytes();
        bytes.extend_from_slice(&cut[..20]);

        let got = parse_log(&bytes);
        assert_eq!(got.records.len(), records.len());
        assert_eq!(
            got.damage,
            Some(Damage::Truncated {
                offset: full,
                have: 20,
                need: ALOG_2F_LEN
            })
        );
    }

    #[test]
    fn corrupt_len_stops_parsing() {
        let records = mixed();
        let mut bytes: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
        bytes[9 + 1] = 200; // second record's len byte
        let got = parse_log(&bytes);
        assert_eq!(got.records.len(), 1);
        assert_eq!(got.damage, Some(Damage::UnknownLength { offset: 9, len: 200 }));
    }

    #[test]
    fn empty_file_is_clean() {
        assert_eq!(parse_log(&[]), LogContents::default());
        assert!(matches!(
            parse_log(&[1]).damage,
            Some(Damage::Truncated { have: 1, .. })
        ));
    }

    #[test]
    fn listing_names_events() {
        let rec = LogRecord::alog2(EventCode::Command, "G0KLA", 1, 5).at(0);
        let contents = parse_log(&rec.to_bytes());
        let text = render(&contents);
        assert!(text.contains("1970-01-01 00:00:00"));
        assert!(text.contains("COMMAND"));
        assert!(text.contains("G0KLA-1 5"));

        let mut unknown = LogRecord::alog1(EventCode::Startup, 0).to_bytes();
        unknown[0] = 77;
        assert!(render(&parse_log(&unknown)).contains("Unknown Event: 77"));
    }
}
