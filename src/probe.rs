//! Read-only inspection of remote host state.
//!
//! Every check here answers a yes/no question (or returns a parsed listing)
//! without changing the host. A command that exits non-zero means "no"; only
//! a broken SSH channel surfaces as an error.

use tracing::debug;

use crate::parse::{self, PartitionTable};
use crate::postgres::PostgresTarget;
use crate::remote::{CommandRunner, RemoteCommand, RemoteError, RemoteHost};

/// Queries disk, swap, and database state on a [`RemoteHost`].
#[derive(Debug)]
pub struct StateProber<'host, R: CommandRunner> {
    host: &'host RemoteHost<R>,
}

impl<'host, R: CommandRunner> StateProber<'host, R> {
    /// Creates a prober bound to `host`.
    #[must_use]
    pub const fn new(host: &'host RemoteHost<R>) -> Self {
        Self { host }
    }

    /// Lists partitions with their type ids, for one disk or for all disks
    /// when `device` is `None`.
    ///
    /// Runs `sfdisk -d` with superuser rights. Lines that are not partition
    /// entries are skipped and counted in the debug log.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the listing command fails.
    pub fn partitions(&self, device: Option<&str>) -> Result<PartitionTable, RemoteError> {
        let mut command = RemoteCommand::new("sfdisk").arg("-d").as_superuser().quiet();
        if let Some(disk) = device {
            command = command.arg(disk);
        }
        let output = self.host.run(&command)?;
        let report = parse::parse_partition_table(&output.stdout);
        debug!(
            device = device.unwrap_or("all"),
            partitions = report.value.len(),
            skipped_lines = report.skipped_lines,
            "parsed partition table"
        );
        Ok(report.value)
    }

    /// Returns `true` when `device` is listed as a mounted filesystem or an
    /// active swap device.
    ///
    /// The swap table is only consulted when the mount table has no match.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] only when the SSH transport fails.
    pub fn is_mounted(&self, device: &str) -> Result<bool, RemoteError> {
        let mounts = self.host.run(
            &RemoteCommand::new("mount")
                .as_superuser()
                .quiet()
                .warn_only(),
        )?;
        if parse::lists_device(&mounts.stdout, device) {
            debug!(device, "device listed in mount table");
            return Ok(true);
        }
        let swaps = self.host.run(
            &RemoteCommand::new("swapon")
                .arg("-s")
                .as_superuser()
                .quiet()
                .warn_only(),
        )?;
        let mounted = parse::lists_device(&swaps.stdout, device);
        debug!(device, mounted, "checked swap table");
        Ok(mounted)
    }

    /// Returns `true` when exactly one database role called `name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] only when the SSH transport fails.
    pub fn user_exists(&self, name: &str, target: &PostgresTarget) -> Result<bool, RemoteError> {
        let output = self
            .host
            .run(&target.count_users_command(name).quiet().warn_only())?;
        let count = output.stdout_trimmed();
        debug!(user = name, count, "counted database roles");
        Ok(output.succeeded() && count == "1")
    }

    /// Returns `true` when a connection to database `name` succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] only when the SSH transport fails.
    pub fn database_exists(
        &self,
        name: &str,
        target: &PostgresTarget,
    ) -> Result<bool, RemoteError> {
        let output = self
            .host
            .run(&target.database_probe_command(name).quiet().warn_only())?;
        Ok(output.succeeded())
    }

    /// Returns `true` when `path` exists on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] only when the SSH transport fails.
    pub fn path_exists(&self, path: &str) -> Result<bool, RemoteError> {
        self.host.path_exists(path)
    }
}
