//! Installer error taxonomy.
//!
//! Everything here is fatal to an installation run and aborts before any
//! artifact is written. A display that is merely not ready is never an
//! error: probes report `Ok(false)` and the readiness gate reports
//! `ReadinessOutcome::TimedOut` as a value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    /// A required external tool is not on PATH.
    #[error("required tool `{0}` not found in PATH")]
    MissingTool(String),

    /// The target account does not exist in the account database.
    #[error("account `{0}` does not exist")]
    UnknownAccount(String),

    /// The installer was started without the privileges it needs.
    #[error("insufficient privileges: {0}")]
    Privileges(String),

    /// Invalid or contradictory installation parameters.
    #[error("{0}")]
    Config(String),

    /// Filesystem or subprocess failure.
    #[error("{0}")]
    System(String),
}
