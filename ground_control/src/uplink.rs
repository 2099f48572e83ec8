// uplink.rs: build, sign and send command envelopes.
use anyhow::{Context, Result, bail};
use chrono::Utc;
use shared_protocol::{Authenticator, CommandEnvelope, Namespace, SecretStore};
use tokio::net::UdpSocket;
use tracing::{debug, info};

pub const MAX_ARGS: usize = 4;

/// Seconds since the epoch, as carried in `date_time`.
pub fn now_date_time() -> Result<u32> {
    u32::try_from(Utc::now().timestamp()).context("clock outside the u32 epoch range")
}

/// Resolve names (or numbers) and sign the result.
pub fn build_envelope(
    secrets: &SecretStore,
    namespace: &str,
    command: &str,
    args: &[u16],
    date_time: u32,
) -> Result<CommandEnvelope> {
    if args.len() > MAX_ARGS {
        bail!("at most {MAX_ARGS} arguments, got {}", args.len());
    }
    let ns: Namespace = namespace.parse()?;
    let cmd = ns.command_from_str(command)?;

    let mut arguments = [0u16; MAX_ARGS];
    arguments[..args.len()].copy_from_slice(args);

    let mut env = CommandEnvelope::new(date_time, ns as u8, cmd, arguments);
    Authenticator::new(secrets).sign(&mut env);
    debug!(namespace = ns.name(), command = cmd, date_time, "envelope signed");
    Ok(env)
}

pub async fn send(env: &CommandEnvelope, to: &str) -> Result<usize> {
    let sock = UdpSocket::bind("0.0.0.0:0").await?;
    sock.connect(to).await.with_context(|| format!("connecting to {to}"))?;
    let n = sock.send(&env.to_bytes()).await?;
    info!(to, bytes = n, date_time = env.date_time, "command sent");
    Ok(n)
}

pub fn fresh_key() -> SecretStore {
    SecretStore::from_key(rand::random())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_protocol::{ENVELOPE_SIZE, OpsCommand};

    const T: u32 = 1_700_000_000;

    #[test]
    fn names_resolve_and_signature_verifies() {
        let key = fresh_key();
        let env = build_envelope(&key, "ops", "roll-logs", &[1, 2], T).unwrap();
        assert_eq!(env.namespace, Namespace::Ops as u8);
        assert_eq!(env.command, OpsCommand::RollLogs as u16);
        assert_eq!(env.arguments, [1, 2, 0, 0]);
        assert!(Authenticator::new(&key).verify_mac(&env));
        assert!(!Authenticator::new(&fresh_key()).verify_mac(&env));
    }

    #[test]
    fn numeric_names_and_limits() {
        let key = SecretStore::new();
        let env = build_envelope(&key, "pacsat", "7", &[], T).unwrap();
        assert_eq!(env.command, 7);
        assert!(build_envelope(&key, "ops", "roll-logs", &[0; 5], T).is_err());
        assert!(build_envelope(&key, "nowhere", "roll-logs", &[], T).is_err());
        assert!(build_envelope(&key, "ops", "self-destruct", &[], T).is_err());
    }

    #[test]
    fn generated_key_survives_a_keyfile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iors_command.key");
        let key = fresh_key();
        key.save(&path).unwrap();

        let mut loaded = SecretStore::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.key(), key.key());
        assert!(!loaded.is_default());
    }

    #[tokio::test]
    async fn sends_one_datagram() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let to = rx.local_addr().unwrap().to_string();
        let env = build_envelope(&SecretStore::new(), "ops", "3", &[9], T).unwrap();

        assert_eq!(send(&env, &to).await.unwrap(), ENVELOPE_SIZE);
        let mut buf = [0u8; 128];
        let (n, _) = rx.recv_from(&mut buf).await.unwrap();
        assert_eq!(CommandEnvelope::from_bytes(&buf[..n]).unwrap(), env);
    }
}
