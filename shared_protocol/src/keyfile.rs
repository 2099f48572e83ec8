// keyfile.rs: holds the 32-byte HMAC key shared with the ground station.
//
// The real key never lives in the repo; it is installed on the payload as a raw
// 32-byte keyfile. Without one we keep running on the built-in key.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyError;

pub const AUTH_KEY_SIZE: usize = 32;

/// Built-in key. Only 28 bytes were ever initialised; the tail is zero.
const DEFAULT_KEY: [u8; AUTH_KEY_SIZE] = [
    0x49, 0xc2, 0x90, 0x2e, 0x9d, 0x99, 0x32, //
    0xf0, 0x9a, 0x09, 0x32, 0xb9, 0x8c, 0x09, //
    0x8e, 0x98, 0xa9, 0x80, 0xd0, 0x98, 0x92, //
    0xc8, 0x9e, 0x98, 0xd7, 0x9f, 0x98, 0x7e, //
    0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    BuiltIn,
    File(PathBuf),
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretStore {
    key: [u8; AUTH_KEY_SIZE],
    #[zeroize(skip)]
    source: KeySource,
}

impl SecretStore {
    pub fn new() -> Self {
        Self {
            key: DEFAULT_KEY,
            source: KeySource::BuiltIn,
        }
    }

    pub fn from_key(key: [u8; AUTH_KEY_SIZE]) -> Self {
        Self {
            key,
            source: KeySource::BuiltIn,
        }
    }

    /// Replace the key with the contents of `path`.
    ///
    /// The key only changes after a full 32-byte read; a missing, empty or
    /// short file leaves the current key in place. Bytes past 32 are ignored.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), KeyError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading keyfile");

        let mut f = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no keyfile, using built-in key");
                return Err(KeyError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(KeyError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut buf = [0u8; AUTH_KEY_SIZE];
        let read = read_full(&mut f, &mut buf).map_err(|source| KeyError::Io {
            path: path.to_path_buf(),
            source,
        });
        let read = match read {
            Ok(n) => n,
            Err(e) => {
                buf.zeroize();
                return Err(e);
            }
        };

        if read == 0 {
            warn!(path = %path.display(), "empty keyfile, using built-in key");
            return Err(KeyError::Empty(path.to_path_buf()));
        }
        if read < AUTH_KEY_SIZE {
            buf.zeroize();
            warn!(path = %path.display(), read, "short keyfile, key left unchanged");
            return Err(KeyError::Short {
                path: path.to_path_buf(),
                read,
                expected: AUTH_KEY_SIZE,
            });
        }

        self.key.copy_from_slice(&buf);
        buf.zeroize();
        self.source = KeySource::File(path.to_path_buf());
        Ok(())
    }

    /// Write the key as a raw 32-byte keyfile.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), KeyError> {
        let path = path.as_ref();
        let io_err = |source| KeyError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let mut f = File::create(path).map_err(io_err)?;
        f.write_all(&self.key).map_err(io_err)?;
        f.sync_all().map_err(io_err)?;
        Ok(())
    }

    pub fn key(&self) -> &[u8; AUTH_KEY_SIZE] {
        &self.key
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// True while running on the built-in key (degraded trust).
    pub fn is_default(&self) -> bool {
        self.key == DEFAULT_KEY
    }

    /// Byte-sum of the key. Safe to downlink; identifies which key is loaded.
    pub fn checksum(&self) -> u32 {
        self.key.iter().map(|&b| u32::from(b)).sum()
    }
}

impl Default for SecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("source", &self.source)
            .field("checksum", &self.checksum())
            .finish_non_exhaustive()
    }
}

/// Read until `buf` is full or EOF; returns bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
