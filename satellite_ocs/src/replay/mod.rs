//! Replay protection for authenticated uplink commands.
//!
//! The only state is the watermark: the `date_time` of the last accepted
//! command, kept in a one-line file so it survives a reboot. A command is
//! judged against it as follows:
//!
//! * watermark outside the sane mission window → treat it as 0 for this check
//! * `date_time == watermark` → duplicate, acknowledge but do not re-apply
//! * `date_time + tolerance <= watermark` → stale, reject
//! * otherwise accept and make `date_time` the new watermark
//!
//! The last rule also accepts a command up to `tolerance` seconds older than
//! the watermark and moves the watermark back to it. Ground retransmission
//! relies on this.

pub mod watermark;

use parking_lot::Mutex;
use shared_protocol::{
    AuthResult, COMMAND_TIME_TOLERANCE, MAX_COMMAND_TIME, MIN_COMMAND_TIME, RejectReason,
    ReplayCheck, ReplayVerdict,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::errors::WatermarkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPolicy {
    pub min_time: u32,
    pub max_time: u32,
    pub tolerance: u32,
}

impl Default for ReplayPolicy {
    fn default() -> Self {
        Self {
            min_time: MIN_COMMAND_TIME,
            max_time: MAX_COMMAND_TIME,
            tolerance: COMMAND_TIME_TOLERANCE,
        }
    }
}

#[derive(Debug)]
pub struct ReplayGuard {
    path: PathBuf,
    policy: ReplayPolicy,
    // read, compare and persist all happen under this lock
    last: Mutex<u32>,
}

impl ReplayGuard {
    /// Load the watermark from `path`, creating it at 0 if absent.
    ///
    /// Never fails: a problem reading or creating the file is returned beside
    /// a guard that starts from 0 in memory.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Option<WatermarkError>) {
        Self::with_policy(path, ReplayPolicy::default())
    }

    pub fn with_policy(
        path: impl Into<PathBuf>,
        policy: ReplayPolicy,
    ) -> (Self, Option<WatermarkError>) {
        let path = path.into();
        let (last, err) = match watermark::read_watermark(&path) {
            Ok(Some(v)) => {
                debug!(last_command_time = v, "loaded command time");
                (v, None)
            }
            Ok(None) => {
                info!(path = %path.display(), "no command time file, starting from 0");
                (0, watermark::write_watermark(&path, 0).err())
            }
            Err(e) => (0, Some(e)),
        };
        if let Some(e) = &err {
            warn!(error = %e, "command time not durable; replay window restarts after reboot");
        }
        let guard = Self {
            path,
            policy,
            last: Mutex::new(last),
        };
        (guard, err)
    }

    /// In-memory watermark.
    pub fn watermark(&self) -> u32 {
        *self.last.lock()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ReplayPolicy {
        self.policy
    }
}

impl ReplayCheck for ReplayGuard {
    fn check_and_advance(&self, date_time: u32) -> ReplayVerdict {
        let mut last = self.last.lock();

        if *last > self.policy.max_time || *last < self.policy.min_time {
            // likely corrupt; judge this command as if nothing came before
            debug!(last_command_time = *last, "command time out of range, using 0");
            *last = 0;
        }

        if date_time == *last {
            debug!(date_time, "duplicate command");
            return ReplayVerdict::new(AuthResult::Duplicate);
        }

        if u64::from(date_time) + u64::from(self.policy.tolerance) <= u64::from(*last) {
            warn!(date_time, last_command_time = *last, "stale command time");
            return ReplayVerdict::new(AuthResult::Rejected(RejectReason::Stale));
        }

        *last = date_time;
        match watermark::write_watermark(&self.path, date_time) {
            Ok(()) => ReplayVerdict::new(AuthResult::Accepted),
            Err(e) => {
                error!(error = %e, date_time, "could not store command time");
                ReplayVerdict {
                    result: AuthResult::Accepted,
                    persist_error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    const T: u32 = 1_700_000_000;

    fn guard_at(value: u32) -> (TempDir, ReplayGuard) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_command_time.txt");
        watermark::write_watermark(&path, value).unwrap();
        let (g, err) = ReplayGuard::open(&path);
        assert!(err.is_none());
        (dir, g)
    }

    fn on_disk(g: &ReplayGuard) -> u32 {
        watermark::read_watermark(g.path()).unwrap().unwrap()
    }

    #[test]
    fn creates_missing_file_at_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmd_time");
        let (g, err) = ReplayGuard::open(&path);
        assert!(err.is_none());
        assert_eq!(g.watermark(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "0\n");
    }

    #[test]
    fn same_time_is_duplicate_and_not_persisted() {
        let (_d, g) = guard_at(T);
        let modified = fs::metadata(g.path()).unwrap().modified().unwrap();
        assert_eq!(g.check_and_advance(T).result, AuthResult::Duplicate);
        assert_eq!(g.watermark(), T);
        assert_eq!(on_disk(&g), T);
        assert_eq!(fs::metadata(g.path()).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn within_tolerance_is_accepted_and_moves_back() {
        let (_d, g) = guard_at(T);
        let v = g.check_and_advance(T - 25);
        assert_eq!(v.result, AuthResult::Accepted);
        assert_eq!(v.persist_error, None);
        assert_eq!(g.watermark(), T - 25);
        assert_eq!(on_disk(&g), T - 25);
    }

    #[test]
    fn stale_is_rejected_and_unchanged() {
        let (_d, g) = guard_at(T);
        assert_eq!(
            g.check_and_advance(T - 35).result,
            AuthResult::Rejected(RejectReason::Stale)
        );
        // exactly tolerance old is also stale
        assert_eq!(
            g.check_and_advance(T - 30).result,
            AuthResult::Rejected(RejectReason::Stale)
        );
        assert_eq!(g.watermark(), T);
        assert_eq!(on_disk(&g), T);
        assert_eq!(g.check_and_advance(T - 29).result, AuthResult::Accepted);
    }

    #[test]
    fn newer_and_far_future_are_accepted() {
        let (_d, g) = guard_at(T);
        assert_eq!(g.check_and_advance(T + 1).result, AuthResult::Accepted);
        assert_eq!(g.check_and_advance(u32::MAX).result, AuthResult::Accepted);
        assert_eq!(on_disk(&g), u32::MAX);
        // out of the sane window now, so the next check starts from 0
        assert_eq!(g.check_and_advance(T).result, AuthResult::Accepted);
        assert_eq!(g.watermark(), T);
    }

    #[test]
    fn corrupt_watermark_behaves_as_zero() {
        for bad in [5u32, 3_000_000_000] {
            let (_d, g) = guard_at(bad);
            assert_eq!(g.check_and_advance(0).result, AuthResult::Duplicate);
            // the reset alone is not written back
            assert_eq!(on_disk(&g), bad);
            assert_eq!(g.check_and_advance(T - 1000).result, AuthResult::Accepted);
            assert_eq!(on_disk(&g), T - 1000);
        }
    }

    #[test]
    fn trailing_bytes_do_not_reset_the_watermark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmd_time");
        fs::write(&path, b"1700000000\n\xff\xfe").unwrap();

        let (g, err) = ReplayGuard::open(&path);
        assert!(err.is_none());
        assert_eq!(g.watermark(), T);
        assert_eq!(
            g.check_and_advance(T - 600).result,
            AuthResult::Rejected(RejectReason::Stale)
        );
        assert_eq!(g.watermark(), T);
    }

    #[test]
    fn crash_before_rename_keeps_previous_value() {
        let (dir, g) = guard_at(T);
        let path = g.path().to_path_buf();
        drop(g);

        // half-written staging file from an interrupted persist
        fs::write(watermark::tmp_path(&path), b"17000").unwrap();

        let (g, err) = ReplayGuard::open(&path);
        assert!(err.is_none());
        assert_eq!(g.watermark(), T);
        assert_eq!(g.check_and_advance(T).result, AuthResult::Duplicate);
        assert_eq!(g.check_and_advance(T + 10).result, AuthResult::Accepted);
        assert_eq!(on_disk(&g), T + 10);
        drop(dir);
    }

    #[test]
    fn persist_failure_is_reported_but_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone").join("cmd_time");
        let (g, err) = ReplayGuard::open(&path);
        assert!(err.is_some());

        let v = g.check_and_advance(T);
        assert_eq!(v.result, AuthResult::Accepted);
        assert!(v.persist_error.is_some());
        assert_eq!(g.watermark(), T);
        assert_eq!(g.check_and_advance(T).result, AuthResult::Duplicate);
    }

    #[test]
    fn concurrent_retransmissions_accept_once() {
        let (_d, g) = guard_at(T);
        let g = Arc::new(g);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = g.clone();
                std::thread::spawn(move || g.check_and_advance(T + 60).result)
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let accepted = results.iter().filter(|r| r.is_accepted()).count();
        assert_eq!(accepted, 1);
        assert!(
            results
                .iter()
                .all(|r| matches!(r, AuthResult::Accepted | AuthResult::Duplicate))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn matches_the_window_rule(
            start in MIN_COMMAND_TIME..MAX_COMMAND_TIME,
            delta in -100i64..100,
        ) {
            let (_d, g) = guard_at(start);
            let dt = (i64::from(start) + delta) as u32;
            let v = g.check_and_advance(dt);
            if delta == 0 {
                prop_assert_eq!(v.result, AuthResult::Duplicate);
                prop_assert_eq!(g.watermark(), start);
            } else if delta <= -i64::from(COMMAND_TIME_TOLERANCE) {
                prop_assert_eq!(v.result, AuthResult::Rejected(RejectReason::Stale));
                prop_assert_eq!(on_disk(&g), start);
            } else {
                prop_assert_eq!(v.result, AuthResult::Accepted);
                prop_assert_eq!(on_disk(&g), dt);
            }
        }
    }
}
