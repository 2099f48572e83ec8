// auth.rs: HMAC-SHA256 command authentication.
//
// The MAC is checked first; only a command with a good MAC reaches the replay
// check, and the replay verdict becomes the final result.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::envelope::{AUTH_VECTOR_SIZE, CommandEnvelope};
use crate::keyfile::SecretStore;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Authentication vector did not match.
    BadMac,
    /// Command time at or before watermark minus tolerance.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthResult {
    Accepted,
    Rejected(RejectReason),
    /// Already executed: acknowledge, do not re-apply.
    Duplicate,
}

impl AuthResult {
    /// Integer result used by the historical ground tools: 0 ok, 1 fail, 2 duplicate.
    pub fn legacy_code(self) -> i32 {
        match self {
            AuthResult::Accepted => 0,
            AuthResult::Rejected(_) => 1,
            AuthResult::Duplicate => 2,
        }
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, AuthResult::Accepted)
    }
}

/// What the replay check decided, and whether it managed to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayVerdict {
    pub result: AuthResult,
    /// Set when the watermark could not be made durable. The result still stands.
    pub persist_error: Option<String>,
}

impl ReplayVerdict {
    pub fn new(result: AuthResult) -> Self {
        Self {
            result,
            persist_error: None,
        }
    }
}

/// Replay protection consulted after a MAC match.
///
/// Implementations must run the whole read-compare-persist sequence under one
/// lock; the authenticator may be called from several threads.
pub trait ReplayCheck {
    fn check_and_advance(&self, date_time: u32) -> ReplayVerdict;
}

/// Stateless verifier over a borrowed key.
#[derive(Debug, Clone, Copy)]
pub struct Authenticator<'k> {
    secrets: &'k SecretStore,
}

impl<'k> Authenticator<'k> {
    pub fn new(secrets: &'k SecretStore) -> Self {
        Self { secrets }
    }

    pub fn compute_mac(&self, payload: &[u8]) -> [u8; AUTH_VECTOR_SIZE] {
        let mut mac = HmacSha256::new_from_slice(self.secrets.key())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        let mut out = [0u8; AUTH_VECTOR_SIZE];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    /// Fill in the authentication vector.
    pub fn sign(&self, env: &mut CommandEnvelope) {
        env.auth_vector = self.compute_mac(&env.payload_bytes());
    }

    pub fn verify_mac(&self, env: &CommandEnvelope) -> bool {
        self.verify_packet(&env.payload_bytes(), &env.auth_vector)
    }

    /// Constant-time check of `vector` against the MAC of `payload`.
    pub fn verify_packet(&self, payload: &[u8], vector: &[u8; AUTH_VECTOR_SIZE]) -> bool {
        let local = self.compute_mac(payload);
        local[..].ct_eq(&vector[..]).into()
    }

    pub fn authenticate(&self, env: &CommandEnvelope, guard: &impl ReplayCheck) -> ReplayVerdict {
        self.authenticate_packet(env.date_time, &env.payload_bytes(), &env.auth_vector, guard)
    }

    /// Authenticate an arbitrary payload that carries its own issuance time.
    pub fn authenticate_packet(
        &self,
        date_time: u32,
        payload: &[u8],
        vector: &[u8; AUTH_VECTOR_SIZE],
        guard: &impl ReplayCheck,
    ) -> ReplayVerdict {
        if !self.verify_packet(payload, vector) {
            return ReplayVerdict::new(AuthResult::Rejected(RejectReason::BadMac));
        }
        guard.check_and_advance(date_time)
    }
}
