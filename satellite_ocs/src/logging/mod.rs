// logging/mod.rs: binary activity log (telemetry product, not diagnostics)
pub mod activity;
pub mod alog;
pub mod disk;
pub mod reader;

pub use activity::{ActivityLog, LogConfig, LogName};
pub use alog::{ErrorCode, EventCode, LogLevel, LogRecord, RejectCode};

#[cfg(test)]
pub(crate) mod test_support {
    use super::alog::{self, LogLevel};
    use std::sync::{Mutex, MutexGuard};

    static LEVEL_LOCK: Mutex<()> = Mutex::new(());

    /// Serialises tests that depend on the process-wide log level.
    pub(crate) fn level_guard(level: LogLevel) -> MutexGuard<'static, ()> {
        let g = LEVEL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        alog::set_level(level);
        g
    }
}
