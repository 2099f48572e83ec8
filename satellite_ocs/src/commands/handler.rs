use crate::logging::disk::disk_space_record;
use crate::logging::{ActivityLog, ErrorCode, EventCode, LogLevel, LogRecord, RejectCode, alog};
use crate::replay::ReplayGuard;
use parking_lot::Mutex;
use shared_protocol::{
    AuthResult, Authenticator, CommandEnvelope, ENVELOPE_SIZE, EnvelopeError, Namespace, OpsCommand,
    RejectReason, SecretStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Outcome of one uplink frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub envelope: CommandEnvelope,
    pub result: AuthResult,
}

/// Authenticates uplink frames and records the outcome in the activity log.
///
/// Commands other than the two that act on the log itself are only recorded;
/// executing them is up to whoever consumes [`Handled`].
pub struct CommandHandler {
    secrets: Arc<SecretStore>,
    guard: ReplayGuard,
    log: Mutex<ActivityLog>,
    station: String,
    last_command: Mutex<Option<CommandEnvelope>>,
}

impl CommandHandler {
    pub fn new(
        secrets: Arc<SecretStore>,
        guard: ReplayGuard,
        log: ActivityLog,
        station: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            guard,
            log: Mutex::new(log),
            station: station.into(),
            last_command: Mutex::new(None),
        }
    }

    /// Most recent command that passed the MAC check and was not stale.
    pub fn last_command(&self) -> Option<CommandEnvelope> {
        *self.last_command.lock()
    }

    pub fn guard(&self) -> &ReplayGuard {
        &self.guard
    }

    /// Write a record, reporting rather than propagating a failure.
    pub fn record(&self, requested: LogLevel, record: &LogRecord) {
        if let Err(e) = self.log.lock().append(requested, record) {
            error!(error = %e, "activity log write failed");
        }
    }

    /// Hand the log back, e.g. to seal it on exit.
    pub fn into_log(self) -> ActivityLog {
        self.log.into_inner()
    }

    pub fn handle(&self, frame: &[u8]) -> Result<Handled, EnvelopeError> {
        let envelope = match CommandEnvelope::from_bytes(frame) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "dropping malformed uplink frame");
                self.refused(RejectCode::Malformed);
                return Err(e);
            }
        };

        let verdict = Authenticator::new(&self.secrets).authenticate(&envelope, &self.guard);
        if let Some(why) = &verdict.persist_error {
            error!(error = %why, "command time not stored");
            self.record(
                LogLevel::Error,
                &LogRecord::error(ErrorCode::CommandTimeNotStored),
            );
        }

        let name = command_label(&envelope);
        match verdict.result {
            AuthResult::Accepted => {
                info!(
                    command = %name,
                    date_time = envelope.date_time,
                    args = ?envelope.arguments,
                    "command accepted"
                );
                *self.last_command.lock() = Some(envelope);
                self.record(LogLevel::Error, &command_record(&self.station, &envelope));
                self.apply(&envelope);
            }
            AuthResult::Duplicate => {
                debug!(
                    command = %name,
                    date_time = envelope.date_time,
                    "duplicate, not re-applied"
                );
                *self.last_command.lock() = Some(envelope);
            }
            AuthResult::Rejected(RejectReason::BadMac) => {
                // no argument detail for forged frames
                warn!("command failed authentication");
                self.refused(RejectCode::BadMac);
            }
            AuthResult::Rejected(RejectReason::Stale) => {
                warn!(
                    command = %name,
                    date_time = envelope.date_time,
                    last_command_time = self.guard.watermark(),
                    "stale command rejected"
                );
                self.refused(RejectCode::Stale);
            }
        }

        Ok(Handled {
            envelope,
            result: verdict.result,
        })
    }

    fn refused(&self, why: RejectCode) {
        self.record(
            LogLevel::Warn,
            &LogRecord::alog2(EventCode::CommandRejected, &self.station, 0, why as u16),
        );
    }

    /// Act on the commands that concern the activity log.
    fn apply(&self, env: &CommandEnvelope) {
        if Namespace::from_u8(env.namespace) != Some(Namespace::Ops) {
            return;
        }
        match OpsCommand::from_code(env.command) {
            Some(OpsCommand::RollLogs) => {
                let (rolled, folder) = {
                    let mut log = self.log.lock();
                    (log.roll(), log.config().folder.clone())
                };
                match rolled {
                    Ok(Some(sealed)) => info!(file = %sealed.display(), "logs rolled"),
                    Ok(None) => debug!("roll requested on an empty log"),
                    Err(e) => error!(error = %e, "could not roll log"),
                }
                if let Some(rec) = disk_space_record(&folder) {
                    self.record(LogLevel::Info, &rec);
                }
            }
            Some(OpsCommand::LogsLevel) => {
                let requested = env.arguments[0];
                match u8::try_from(requested).ok().and_then(LogLevel::from_u8) {
                    Some(level) => {
                        alog::set_level(level);
                        info!(?level, "activity log level changed");
                        self.record(
                            LogLevel::Error,
                            &LogRecord::alog1(EventCode::IorsLogLevel, level as u16),
                        );
                    }
                    None => warn!(requested, "ignoring unknown log level"),
                }
            }
            _ => {}
        }
    }
}

/// `ops/roll-logs`, falling back to numbers for codes without a name.
pub fn command_label(env: &CommandEnvelope) -> String {
    match Namespace::from_u8(env.namespace) {
        Some(ns) => match ns.command_name(env.command) {
            Some(cmd) => format!("{}/{}", ns.name(), cmd),
            None => format!("{}/{}", ns.name(), env.command),
        },
        None => format!("{}/{}", env.namespace, env.command),
    }
}

fn command_record(station: &str, env: &CommandEnvelope) -> LogRecord {
    let [a0, a1, a2, a3] = env.arguments;
    LogRecord::alog2f(
        EventCode::Command,
        station,
        0,
        [
            u32::from(env.namespace),
            u32::from(env.command),
            u32::from(a0),
            u32::from(a1),
            u32::from(a2),
            u32::from(a3),
        ],
    )
}

pub async fn spawn_receiver(
    handler: Arc<CommandHandler>,
    rx_sock: Arc<UdpSocket>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 2 * ENVELOPE_SIZE];

        loop {
            match rx_sock.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    let frame = buf[..n].to_vec();
                    let h = handler.clone();
                    // file I/O happens under the handler's locks
                    match tokio::task::spawn_blocking(move || h.handle(&frame)).await {
                        Ok(Ok(done)) => report(from, &done),
                        Ok(Err(_)) => debug!(%from, bytes = n, "frame ignored"),
                        Err(e) => error!(error = %e, "command task failed"),
                    }
                }
                Err(e) => warn!("recv error: {e}"),
            }
        }
    })
}

fn report(from: SocketAddr, done: &Handled) {
    debug!(
        %from,
        result = done.result.legacy_code(),
        command = %command_label(&done.envelope),
        "uplink handled"
    );
}
