//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;

use crate::remote::{CommandOutput, CommandRunner, HostConfig, RemoteError};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic remote outcomes without spawning `ssh`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the command line handed to `ssh` for remote execution, which
    /// is always the final argument.
    #[must_use]
    pub fn remote_command(&self) -> String {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the remote command lines of all invocations so far.
    #[must_use]
    pub fn remote_commands(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(CommandInvocation::remote_command)
            .collect()
    }

    /// Number of scripted responses not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RemoteError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Host configuration pointing at a fake host, connecting as `user`.
#[must_use]
pub fn host_config(user: &str) -> HostConfig {
    HostConfig {
        ssh_user: user.to_owned(),
        ..HostConfig::for_host("db1.example.test")
    }
}

/// Produces `mount` output listing each `(device, mountpoint)` pair.
#[must_use]
pub fn mount_table(entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(device, mountpoint)| {
            format!("{device} on {mountpoint} type ext4 (rw,relatime,errors=remount-ro)\n")
        })
        .collect()
}

/// Produces `swapon -s` output listing each swap device.
#[must_use]
pub fn swap_table(devices: &[&str]) -> String {
    let mut table = String::from("Filename\t\t\t\tType\t\tSize\tUsed\tPriority\n");
    for device in devices {
        table.push_str(device);
        table.push_str("                               partition\t2097148\t0\t-2\n");
    }
    table
}

/// Produces `sfdisk -d` output for `(device, type id)` pairs using the
/// legacy `Id=` notation.
#[must_use]
pub fn sfdisk_dump(disk: &str, partitions: &[(&str, u32)]) -> String {
    let mut dump = format!("# partition table of {disk}\nunit: sectors\n\n");
    for (index, (device, id)) in partitions.iter().enumerate() {
        let start = 2048 + index * 1_024_000;
        dump.push_str(&format!(
            "{device} : start=     {start}, size=  1024000, Id={id:x}\n"
        ));
    }
    dump
}
