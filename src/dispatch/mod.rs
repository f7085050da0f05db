//! Precondition-gated mutating operations.
//!
//! Each operation first asks the [`StateProber`] whether acting is necessary
//! and safe, then issues one mutating command. When the precondition does
//! not hold the operation either skips quietly (re-applying would be a
//! no-op) or aborts (acting would destroy data or is impossible):
//!
//! | Operation | Precondition fails |
//! |---|---|
//! | [`mount`](ActionDispatcher::mount) | skip |
//! | [`activate_swap`](ActionDispatcher::activate_swap) | skip |
//! | [`format_filesystem`](ActionDispatcher::format_filesystem) | abort |
//! | [`format_swap`](ActionDispatcher::format_swap) | abort |
//! | [`dump_database`](ActionDispatcher::dump_database) | abort |
//! | [`restore_database`](ActionDispatcher::restore_database) | abort |
//!
//! An abort is returned as [`ProvisionError::Aborted`]; the library never
//! terminates the calling process.

use thiserror::Error;
use tracing::{error, info};

use crate::probe::StateProber;
use crate::remote::{CommandRunner, RemoteError, RemoteHost};

mod disk;
mod postgres;

/// What a mutating operation did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The mutating command ran and succeeded.
    Applied,
    /// The desired state already held; nothing ran.
    Skipped,
}

/// A precondition that made an operation refuse to act.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Abort {
    /// Formatting a device that holds a mounted filesystem.
    #[error("device {device} is mounted; refusing to format it")]
    DeviceMounted {
        /// Device path.
        device: String,
    },
    /// Creating swap on a device that is mounted or active swap.
    #[error("device {device} is mounted; refusing to create swap on it")]
    SwapMounted {
        /// Device path.
        device: String,
    },
    /// The dump destination directory does not exist.
    #[error("path {path} does not exist")]
    MissingPath {
        /// Remote directory path.
        path: String,
    },
    /// A dump directory or SQL file given as a relative path. The existence
    /// check runs from the login user's home and `psql`/`pg_dump` from the
    /// service account's home, so the two would disagree.
    #[error("path {path} is relative; an absolute remote path is required")]
    RelativePath {
        /// Path as given.
        path: String,
    },
    /// The database to dump or restore into does not exist.
    #[error("database {database} does not exist")]
    MissingDatabase {
        /// Database name.
        database: String,
    },
    /// The SQL file to restore from does not exist.
    #[error("SQL file {path} does not exist")]
    MissingSqlFile {
        /// Remote file path.
        path: String,
    },
}

/// Errors raised by mutating operations.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Talking to the remote host failed, or the mutating command exited
    /// non-zero.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// A precondition failed and acting would be unsafe.
    #[error("aborted: {0}")]
    Aborted(Abort),
}

impl ProvisionError {
    /// Returns `true` when the operation refused to act because of a failed
    /// safety precondition.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// The abort reason, when this is a precondition failure.
    #[must_use]
    pub const fn abort(&self) -> Option<&Abort> {
        match self {
            Self::Aborted(reason) => Some(reason),
            Self::Remote(_) => None,
        }
    }
}

/// Issues mutating commands on a [`RemoteHost`] after probing its state.
#[derive(Debug)]
pub struct ActionDispatcher<'host, R: CommandRunner> {
    host: &'host RemoteHost<R>,
    prober: StateProber<'host, R>,
}

impl<'host, R: CommandRunner> ActionDispatcher<'host, R> {
    /// Creates a dispatcher bound to `host`.
    #[must_use]
    pub const fn new(host: &'host RemoteHost<R>) -> Self {
        Self {
            host,
            prober: StateProber::new(host),
        }
    }

    /// The prober used for preconditions.
    #[must_use]
    pub const fn prober(&self) -> &StateProber<'host, R> {
        &self.prober
    }
}

fn skipped(operation: &'static str, resource: &str, reason: &'static str) -> Outcome {
    info!(operation, resource, reason, "skipping");
    Outcome::Skipped
}

fn aborted(operation: &'static str, reason: Abort) -> ProvisionError {
    error!(operation, %reason, "aborting");
    ProvisionError::Aborted(reason)
}

#[cfg(test)]
mod tests;
