//! Error types for the ovm host.

use thiserror::Error;

/// Errors produced while bootstrapping the host.
///
/// Every variant is terminal to the call that produced it; callers are
/// expected to abort startup.
#[derive(Debug, Error)]
pub enum OvmError {
    /// Bad or unresolvable user-supplied configuration (paths, names, sizes).
    #[error("configuration error: {0}")]
    Config(String),

    /// A directory or disk image could not be created or inspected.
    #[error("storage error: {0}")]
    Storage(String),

    /// A bounded search (e.g. for a free port) ran out of candidates.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// SSH key generation or key read failed.
    #[error("credential error: {0}")]
    Credential(String),

    /// Boot assets could not be brought in line with the manifest.
    #[error("reconcile error: {0}")]
    Reconcile(String),

    /// An operation was called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type OvmResult<T> = Result<T, OvmError>;
