//! Remote command execution over the system `ssh` client.
//!
//! [`RemoteHost`] is the only place that talks to the remote machine. It
//! renders a [`RemoteCommand`] for the configured session identity, wraps it
//! in an `ssh` invocation, and converts the outcome according to the
//! command's failure policy. Probes use warn-only commands so that "does not
//! exist" comes back as an unsuccessful output instead of an error; failures
//! of the SSH channel itself are always errors.

use std::ffi::OsString;

use tracing::{debug, info, trace, warn};

mod command;
mod config;
mod types;

pub use command::{
    FailurePolicy, Privilege, RemoteCommand, SUPERUSER, ServiceAccount, SessionIdentity,
    Visibility,
};
pub use config::{ConfigLoadError, DEFAULT_SSH_PORT, DEFAULT_SSH_USER, HostConfig, RemoteError};
pub use types::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RemoteOutput, SSH_CHANNEL_FAILURE,
};

/// Gateway to a single remote host.
#[derive(Clone, Debug)]
pub struct RemoteHost<R: CommandRunner> {
    config: HostConfig,
    session: SessionIdentity,
    runner: R,
}

impl RemoteHost<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: HostConfig) -> Result<Self, RemoteError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> RemoteHost<R> {
    /// Creates a gateway using the provided configuration and runner.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: HostConfig, runner: R) -> Result<Self, RemoteError> {
        config.validate()?;
        let session = config.session();
        Ok(Self {
            config,
            session,
            runner,
        })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Identity the session connects as.
    #[must_use]
    pub const fn session(&self) -> &SessionIdentity {
        &self.session
    }

    /// Runs `command` on the remote host and blocks until it finishes.
    ///
    /// In dry-run mode the command is logged and reported as successful with
    /// empty output.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Spawn`] or [`RemoteError::Channel`] when the
    /// SSH transport fails, and [`RemoteError::CommandFailed`] when the
    /// command exits non-zero under [`FailurePolicy::Abort`].
    pub fn run(&self, command: &RemoteCommand) -> Result<RemoteOutput, RemoteError> {
        let rendered = command.render(&self.session, &self.config.sudo_bin);
        let shown = command.render_for_display(&self.session, &self.config.sudo_bin);
        let host = self.config.host.as_str();

        if self.config.dry_run {
            info!(host, command = %shown, "dry run: remote command not executed");
            return Ok(RemoteOutput {
                exit_code: Some(0),
                ..RemoteOutput::default()
            });
        }

        match command.visibility() {
            Visibility::Visible => info!(host, command = %shown, "running remote command"),
            Visibility::Quiet => debug!(host, command = %shown, "running remote command"),
        }

        let args = self.build_ssh_args(&rendered);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        let remote = RemoteOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if matches!(remote.exit_code, None | Some(SSH_CHANNEL_FAILURE)) {
            return Err(RemoteError::Channel {
                host: host.to_owned(),
                status_text: remote.status_text(),
                stderr: remote.stderr,
            });
        }

        self.log_output(command, &remote);

        if remote.succeeded() {
            return Ok(remote);
        }

        match command.failure_policy() {
            FailurePolicy::WarnOnly => {
                match command.visibility() {
                    Visibility::Visible => warn!(
                        host,
                        command = %command,
                        status = %remote.status_text(),
                        "remote command failed; continuing"
                    ),
                    Visibility::Quiet => debug!(
                        host,
                        command = %command,
                        status = %remote.status_text(),
                        "remote command failed; continuing"
                    ),
                }
                Ok(remote)
            }
            FailurePolicy::Abort => Err(RemoteError::CommandFailed {
                command: command.to_string(),
                status: remote.exit_code,
                status_text: remote.status_text(),
                stderr: remote.stderr,
            }),
        }
    }

    /// Checks whether `path` exists on the remote host.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] only when the SSH transport fails.
    pub fn path_exists(&self, path: &str) -> Result<bool, RemoteError> {
        let probe = RemoteCommand::new("test")
            .args(["-e", path])
            .quiet()
            .warn_only();
        Ok(self.run(&probe)?.succeeded())
    }

    fn log_output(&self, command: &RemoteCommand, output: &RemoteOutput) {
        let host = self.config.host.as_str();
        match command.visibility() {
            Visibility::Visible => {
                debug!(host, stdout = %output.stdout, stderr = %output.stderr, "remote command output");
            }
            Visibility::Quiet => {
                trace!(host, stdout = %output.stdout, stderr = %output.stderr, "remote command output");
            }
        }
    }

    fn build_ssh_args(&self, remote_command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.config.ssh_port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_home(identity_file.trim())));
        }

        if self.config.ssh_batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.ssh_strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        let known_hosts = self.config.ssh_known_hosts_file.trim();
        if !known_hosts.is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!("UserKnownHostsFile={known_hosts}")));
        }

        args.push(OsString::from(format!(
            "{}@{}",
            self.session.user(),
            self.config.host.trim()
        )));
        args.push(OsString::from(remote_command));
        args
    }
}

/// Expands a leading `~/` to the local `HOME`; other paths, and all paths
/// when `HOME` is unset, are returned unchanged.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}
