use std::path::PathBuf;
use thiserror::Error;

/// Why a keyfile could not replace the in-memory key.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("no keyfile at {0}")]
    NotFound(PathBuf),
    #[error("keyfile {0} is empty")]
    Empty(PathBuf),
    #[error("keyfile {path} holds {read} bytes, need {expected}")]
    Short {
        path: PathBuf,
        read: usize,
        expected: usize,
    },
    #[error("keyfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope must be exactly {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("unknown command {name} in namespace {namespace}")]
    UnknownCommand { namespace: String, name: String },
    #[error("namespace {0} has no named commands")]
    NoCommands(String),
}
