// logging/disk.rs: free space on the volume holding the log queue.
use std::path::Path;
use sysinfo::Disks;

use super::alog::{EventCode, LogRecord};

/// `(available, total)` bytes for the mount point that contains `folder`.
pub fn disk_space(folder: &Path) -> Option<(u64, u64)> {
    let folder = folder.canonicalize().ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| folder.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| (d.available_space(), d.total_space()))
}

/// `DISKSPACE` record: var1 available KiB, var2 total KiB.
pub fn disk_space_record(folder: &Path) -> Option<LogRecord> {
    let (available, total) = disk_space(folder)?;
    let kib = |b: u64| u32::try_from(b / 1024).unwrap_or(u32::MAX);
    Some(LogRecord::alog1f(
        EventCode::DiskSpace,
        [kib(available), kib(total), 0, 0, 0, 0],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_is_well_formed_when_the_volume_is_known() {
        let dir = tempdir().unwrap();
        // some sandboxes expose no mount table; nothing to check then
        if let Some(LogRecord::Alog1F { header, vars }) = disk_space_record(dir.path()) {
            assert_eq!(header.event, EventCode::DiskSpace as u8);
            assert!(vars[0] <= vars[1]);
            assert_eq!(&vars[2..], &[0; 4]);
        }
    }

    #[test]
    fn missing_folder_has_no_record() {
        let dir = tempdir().unwrap();
        assert!(disk_space_record(&dir.path().join("absent")).is_none());
    }
}
