// lib.rs
// Shared uplink protocol: command envelope, name tables, keyfile and HMAC authentication.

pub mod auth;
pub mod envelope;
pub mod error;
pub mod keyfile;
pub mod names;

pub use auth::{AuthResult, Authenticator, RejectReason, ReplayCheck, ReplayVerdict};
pub use envelope::{AUTH_VECTOR_SIZE, CommandEnvelope, ENVELOPE_SIZE, SW_COMMAND_SIZE};
pub use error::{EnvelopeError, KeyError, NameError};
pub use keyfile::{AUTH_KEY_SIZE, KeySource, SecretStore};
pub use names::{Namespace, OpsCommand, PacsatCommand};

// =============================== Common =====================================

/// Address the payload answers to in the envelope `address` byte.
pub const OUR_ADDRESS: u8 = 0x1A;

/// UDP port the uplink receiver listens on by default.
pub const DEFAULT_UPLINK_PORT: u16 = 8010;

// ============================ Replay window =================================

/// A command this many seconds older than the watermark (or more) is stale.
pub const COMMAND_TIME_TOLERANCE: u32 = 30;

/// Dec 31 2022. A watermark below this is treated as corrupt.
pub const MIN_COMMAND_TIME: u32 = 1_672_462_800;

/// Dec 31 2035. A watermark above this is treated as corrupt.
pub const MAX_COMMAND_TIME: u32 = 2_082_690_000;
