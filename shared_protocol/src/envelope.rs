//! The fixed 50-byte software command uplink.
//!
//! Layout (little-endian, no padding, no length prefix):
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | date_time        |
//! | 4      | 1    | reserved         |
//! | 5      | 1    | address          |
//! | 6      | 1    | special          |
//! | 7      | 1    | namespace        |
//! | 8      | 2    | command          |
//! | 10     | 8    | arguments[4]     |
//! | 18     | 32   | auth_vector      |
//!
//! The MAC covers bytes `0..18` exactly as laid out above.

use serde::{Deserialize, Serialize};

use crate::OUR_ADDRESS;
use crate::error::EnvelopeError;

/// Authenticated part of the envelope.
pub const SW_COMMAND_SIZE: usize = 18;
pub const AUTH_VECTOR_SIZE: usize = 32;
pub const ENVELOPE_SIZE: usize = SW_COMMAND_SIZE + AUTH_VECTOR_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Issuance time, seconds since the Unix epoch.
    pub date_time: u32,
    pub reserved: u8,
    pub address: u8,
    pub special: u8,
    pub namespace: u8,
    pub command: u16,
    pub arguments: [u16; 4],
    pub auth_vector: [u8; AUTH_VECTOR_SIZE],
}

impl CommandEnvelope {
    /// Unsigned envelope addressed to this payload.
    pub fn new(date_time: u32, namespace: u8, command: u16, arguments: [u16; 4]) -> Self {
        Self {
            date_time,
            reserved: 0,
            address: OUR_ADDRESS,
            special: 0,
            namespace,
            command,
            arguments,
            auth_vector: [0u8; AUTH_VECTOR_SIZE],
        }
    }

    /// The 18 bytes the authentication vector is computed over.
    pub fn payload_bytes(&self) -> [u8; SW_COMMAND_SIZE] {
        let mut out = [0u8; SW_COMMAND_SIZE];
        out[0..4].copy_from_slice(&self.date_time.to_le_bytes());
        out[4] = self.reserved;
        out[5] = self.address;
        out[6] = self.special;
        out[7] = self.namespace;
        out[8..10].copy_from_slice(&self.command.to_le_bytes());
        for (i, arg) in self.arguments.iter().enumerate() {
            let at = 10 + i * 2;
            out[at..at + 2].copy_from_slice(&arg.to_le_bytes());
        }
        out
    }

    pub fn to_bytes(&self) -> [u8; ENVELOPE_SIZE] {
        let mut out = [0u8; ENVELOPE_SIZE];
        out[..SW_COMMAND_SIZE].copy_from_slice(&self.payload_bytes());
        out[SW_COMMAND_SIZE..].copy_from_slice(&self.auth_vector);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, EnvelopeError> {
        if buf.len() != ENVELOPE_SIZE {
            return Err(EnvelopeError::WrongLength {
                expected: ENVELOPE_SIZE,
                got: buf.len(),
            });
        }
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);

        let mut auth_vector = [0u8; AUTH_VECTOR_SIZE];
        auth_vector.copy_from_slice(&buf[SW_COMMAND_SIZE..]);

        Ok(Self {
            date_time: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            reserved: buf[4],
            address: buf[5],
            special: buf[6],
            namespace: buf[7],
            command: u16_at(8),
            arguments: [u16_at(10), u16_at(12), u16_at(14), u16_at(16)],
            auth_vector,
        })
    }
}
