//! Core library for the hostwright provisioning helpers.
//!
//! The crate inspects and changes disk, swap, and PostgreSQL state on a
//! remote machine over `ssh`. Every mutating operation checks the current
//! state first and either acts, skips because the work is already done, or
//! aborts because acting would be unsafe.

pub mod dispatch;
pub mod parse;
pub mod postgres;
pub mod probe;
pub mod remote;
pub mod test_support;

pub use dispatch::{Abort, ActionDispatcher, Outcome, ProvisionError};
pub use parse::{ParseReport, PartitionTable, lists_device, parse_partition_table};
pub use postgres::{
    DatabaseSpec, DatabaseUserSpec, DumpFormat, DumpRequest, PostgresConfig, PostgresTarget,
};
pub use probe::StateProber;
pub use remote::{
    CommandOutput, CommandRunner, ConfigLoadError, HostConfig, ProcessCommandRunner,
    RemoteCommand, RemoteError, RemoteHost, RemoteOutput, ServiceAccount, SessionIdentity,
};
