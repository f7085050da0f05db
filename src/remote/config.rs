//! Remote host configuration and gateway errors.
//!
//! [`HostConfig`] describes how to reach the host over SSH and who the
//! session connects as. Configuration is loaded via `ortho-config`, which
//! merges defaults, configuration files, and environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use super::command::SessionIdentity;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default login user; a root session never escalates with `sudo`.
pub const DEFAULT_SSH_USER: &str = "root";

/// Connection and session settings for the remote host.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HOSTWRIGHT_HOST",
    discovery(
        app_name = "hostwright",
        env_var = "HOSTWRIGHT_CONFIG_PATH",
        config_file_name = "hostwright.toml",
        dotfile_name = ".hostwright.toml",
        project_file_name = "hostwright.toml"
    )
)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "configuration struct with user-facing toggle settings that are naturally expressed as booleans"
)]
pub struct HostConfig {
    /// Host name or address of the machine to provision.
    #[ortho_config(default = String::new())]
    pub host: String,
    /// SSH port on the remote host.
    #[ortho_config(default = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,
    /// Remote user to connect as. Determines whether superuser commands are
    /// wrapped in `sudo`.
    #[ortho_config(default = DEFAULT_SSH_USER.to_owned())]
    pub ssh_user: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Escalation program used on the remote host.
    #[ortho_config(default = "sudo".to_owned())]
    pub sudo_bin: String,
    /// Path to the SSH private key file. Supports tilde expansion
    /// (`~/.ssh/id_ed25519`). When unset SSH falls back to its default key
    /// locations. Validation rejects empty or whitespace-only values.
    pub ssh_identity_file: Option<String>,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking.
    #[ortho_config(default = true)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; blank leaves the SSH default in place.
    #[ortho_config(default = String::new())]
    pub ssh_known_hosts_file: String,
    /// Log commands instead of executing them.
    #[ortho_config(default = false)]
    pub dry_run: bool,
}

/// Errors raised when loading configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl HostConfig {
    /// Builds a configuration for `host` with default settings.
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_user: DEFAULT_SSH_USER.to_owned(),
            ssh_bin: String::from("ssh"),
            sudo_bin: String::from("sudo"),
            ssh_identity_file: None,
            ssh_batch_mode: true,
            ssh_strict_host_key_checking: true,
            ssh_known_hosts_file: String::new(),
            dry_run: false,
        }
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when any required field is
    /// empty.
    pub fn validate(&self) -> Result<(), RemoteError> {
        Self::require_value(&self.host, "host")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.sudo_bin, "sudo_bin")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Ok(())
    }

    /// Loads configuration using defaults, configuration files, and
    /// environment variables, without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("hostwright")])
            .map_err(|err| ConfigLoadError::Parse(err.to_string()))
    }

    /// Identity of the session this configuration connects as.
    #[must_use]
    pub fn session(&self) -> SessionIdentity {
        SessionIdentity::new(self.ssh_user.trim())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), RemoteError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(RemoteError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), RemoteError> {
        Self::require_optional_value(Some(value), field)
    }
}

/// Errors surfaced while executing commands on the remote host.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// Raised when configuration is missing required values. The message
    /// names the environment variable and configuration key to set.
    #[error("missing {field}: set HOSTWRIGHT_HOST_{env_suffix} or add {field} to hostwright.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when an account name cannot be used safely in a command line.
    #[error("invalid account name {name:?}: expected a portable user name")]
    InvalidAccount {
        /// Rejected account name.
        name: String,
    },
    /// Raised when the local `ssh` process cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the SSH channel itself fails (connection, authentication)
    /// rather than the remote command.
    #[error("ssh to {host} failed with status {status_text}: {stderr}")]
    Channel {
        /// Host the session targeted.
        host: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from `ssh`.
        stderr: String,
    },
    /// Raised when a remote command exits non-zero under
    /// [`FailurePolicy::Abort`](super::FailurePolicy::Abort).
    #[error("`{command}` exited with status {status_text}: {stderr}")]
    CommandFailed {
        /// Command line that failed, without privilege wrapper.
        command: String,
        /// Exit status reported by the remote shell.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the remote command.
        stderr: String,
    },
}
