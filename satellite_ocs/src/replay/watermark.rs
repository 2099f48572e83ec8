// replay/watermark.rs
// The command-time file holds one decimal line and is replaced atomically.
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::WatermarkError;

/// `<path>.tmp`, the staging file for an atomic replace.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// `atol`-style parse: leading blanks, optional sign, digits up to the first
/// non-digit. Anything unparsable reads as 0; out-of-range values wrap to
/// 32 bits and are caught later by the sanity window.
pub fn parse_watermark(line: &[u8]) -> u32 {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let s = &line[start..];
    let (neg, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut v: i64 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        v = v.saturating_mul(10).saturating_add(i64::from(b - b'0'));
    }
    if neg {
        v = -v;
    }
    v as u32
}

/// Current durable value, or `None` if the file does not exist.
///
/// Only the leading number counts; whatever follows it, text or not, is ignored.
pub fn read_watermark(path: &Path) -> Result<Option<u32>, WatermarkError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(parse_watermark(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(WatermarkError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write to `<path>.tmp`, sync, then rename over `path`.
///
/// A crash before the rename leaves the previous file untouched.
pub fn write_watermark(path: &Path, value: u32) -> Result<(), WatermarkError> {
    let tmp = tmp_path(path);
    let write_err = |source| WatermarkError::Write {
        path: tmp.clone(),
        source,
    };

    let mut f = File::create(&tmp).map_err(write_err)?;
    writeln!(f, "{value}").map_err(write_err)?;
    f.flush().map_err(write_err)?;
    f.sync_all().map_err(write_err)?;
    drop(f);

    fs::rename(&tmp, path).map_err(|source| WatermarkError::Rename {
        path: path.to_path_buf(),
        source,
    })?;

    // best-effort durability of the rename itself
    #[cfg(unix)]
    {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Ok(dir_fd) = File::open(dir) {
                let _ = dir_fd.sync_all();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_like_atol() {
        assert_eq!(parse_watermark(b"1700000000"), 1_700_000_000);
        assert_eq!(parse_watermark(b"  42abc"), 42);
        assert_eq!(parse_watermark(b"+7"), 7);
        assert_eq!(parse_watermark(b""), 0);
        assert_eq!(parse_watermark(b"garbage"), 0);
        assert_eq!(parse_watermark(b"-5"), (-5i64) as u32);
        assert_eq!(parse_watermark(b"\n\t1700000000\n\xff\xfe"), 1_700_000_000);
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_command_time.txt");
        assert_eq!(read_watermark(&path).unwrap(), None);

        write_watermark(&path, 1_700_000_000).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1700000000\n");
        assert_eq!(read_watermark(&path).unwrap(), Some(1_700_000_000));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn bytes_after_the_number_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmd_time");
        fs::write(&path, b"1700000000\n\xff\xfe").unwrap();
        assert_eq!(read_watermark(&path).unwrap(), Some(1_700_000_000));
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("/var/iors/cmd_time")),
            PathBuf::from("/var/iors/cmd_time.tmp")
        );
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("cmd_time");
        assert!(matches!(
            write_watermark(&path, 1),
            Err(WatermarkError::Write { .. })
        ));
    }
}
