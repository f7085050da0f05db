//! Structured remote command construction.
//!
//! Commands are assembled from a program and separate arguments rather than
//! by string interpolation. Every word is shell-escaped when the command is
//! rendered, so device paths, names, and passwords cannot break out of the
//! argument they were passed as. Privilege escalation is decided at render
//! time from the session identity the gateway was configured with.

use std::fmt;

use shell_escape::unix::escape;

use super::RemoteError;

/// User name that marks a fully privileged session.
pub const SUPERUSER: &str = "root";

/// Identity the remote session is connected as.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionIdentity {
    user: String,
}

impl SessionIdentity {
    /// Creates an identity for the given login user.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    /// Login user of the session.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns `true` when the session already has superuser rights and
    /// must not escalate again.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.user == SUPERUSER
    }
}

/// A local account on the remote host that commands can run as, such as the
/// `postgres` service account.
///
/// Names are restricted to portable POSIX user names so they can appear
/// unquoted in `~account` home directory expansion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceAccount(String);

impl ServiceAccount {
    /// Validates and wraps an account name.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidAccount`] when the name is not a portable
    /// user name (`[a-z_][a-z0-9_-]*`).
    pub fn new(name: impl Into<String>) -> Result<Self, RemoteError> {
        let account = name.into();
        if is_portable_user_name(&account) {
            Ok(Self(account))
        } else {
            Err(RemoteError::InvalidAccount { name: account })
        }
    }

    /// The conventional `postgres` account.
    #[must_use]
    pub fn postgres() -> Self {
        Self(String::from("postgres"))
    }

    /// Account name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceAccount {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

fn is_portable_user_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-'))
}

/// Privileges a command needs on the remote host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Privilege {
    /// Run as the session user.
    #[default]
    Unprivileged,
    /// Run with superuser rights, escalating only when the session is not
    /// already privileged.
    Superuser,
    /// Run as a local service account from inside its home directory.
    ServiceAccount(ServiceAccount),
}

/// Whether the command and its output are echoed to the log at `info`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Visibility {
    /// Log the command and its outcome prominently.
    #[default]
    Visible,
    /// Only log at debug level.
    Quiet,
}

/// How a non-zero remote exit status is treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// A non-zero exit is an error.
    #[default]
    Abort,
    /// A non-zero exit is returned to the caller as an unsuccessful output.
    WarnOnly,
}

/// A command to run on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    masks: Vec<(usize, String)>,
    stdin_path: Option<String>,
    privilege: Privilege,
    visibility: Visibility,
    failure: FailurePolicy,
}

impl RemoteCommand {
    /// Starts a visible, unprivileged command that aborts on failure.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            masks: Vec::new(),
            stdin_path: None,
            privilege: Privilege::Unprivileged,
            visibility: Visibility::Visible,
            failure: FailurePolicy::Abort,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Appends an argument holding a secret. `value` is executed; `shown`
    /// replaces it wherever the command is displayed or logged.
    #[must_use]
    pub fn masked_arg(mut self, value: impl Into<String>, shown: impl Into<String>) -> Self {
        self.masks.push((self.args.len(), shown.into()));
        self.args.push(value.into());
        self
    }

    /// Feeds the remote file at `path` to the command's standard input.
    #[must_use]
    pub fn stdin_from(mut self, path: impl Into<String>) -> Self {
        self.stdin_path = Some(path.into());
        self
    }

    /// Runs the command with superuser rights.
    #[must_use]
    pub fn as_superuser(mut self) -> Self {
        self.privilege = Privilege::Superuser;
        self
    }

    /// Runs the command as `account`.
    #[must_use]
    pub fn as_account(mut self, account: ServiceAccount) -> Self {
        self.privilege = Privilege::ServiceAccount(account);
        self
    }

    /// Suppresses prominent logging of the command and its output.
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.visibility = Visibility::Quiet;
        self
    }

    /// Tolerates a non-zero exit status.
    #[must_use]
    pub const fn warn_only(mut self) -> Self {
        self.failure = FailurePolicy::WarnOnly;
        self
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order, before escaping.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Privilege the command requests.
    #[must_use]
    pub const fn privilege(&self) -> &Privilege {
        &self.privilege
    }

    /// Visibility of the command.
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Failure policy of the command.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        self.failure
    }

    /// Renders the escaped command line without any privilege wrapper.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.line_with(self.args.iter().map(String::as_str))
    }

    /// Renders the command line with masked arguments replaced, for logs and
    /// error messages.
    #[must_use]
    pub fn display_line(&self) -> String {
        self.line_with(self.args.iter().enumerate().map(|(index, arg)| {
            self.masks
                .iter()
                .find(|&&(masked, _)| masked == index)
                .map_or(arg.as_str(), |(_, shown)| shown.as_str())
        }))
    }

    fn line_with<'a>(&self, args: impl Iterator<Item = &'a str>) -> String {
        let mut line = String::from(escape(self.program.as_str().into()));
        for arg in args {
            line.push(' ');
            line.push_str(escape(arg.into()).as_ref());
        }
        if let Some(ref path) = self.stdin_path {
            line.push_str(" < ");
            line.push_str(escape(path.as_str().into()).as_ref());
        }
        line
    }

    /// Renders the full shell line for `session`, adding `sudo_bin` where the
    /// privilege requires escalation.
    #[must_use]
    pub fn render(&self, session: &SessionIdentity, sudo_bin: &str) -> String {
        self.wrap(self.command_line(), session, sudo_bin)
    }

    /// Like [`render`](Self::render), with masked arguments replaced.
    #[must_use]
    pub fn render_for_display(&self, session: &SessionIdentity, sudo_bin: &str) -> String {
        self.wrap(self.display_line(), session, sudo_bin)
    }

    fn wrap(&self, line: String, session: &SessionIdentity, sudo_bin: &str) -> String {
        let sudo = escape(sudo_bin.into());
        match self.privilege {
            Privilege::Unprivileged => line,
            Privilege::Superuser if session.is_superuser() => line,
            Privilege::Superuser => format!("{sudo} {line}"),
            Privilege::ServiceAccount(ref account) => {
                format!("cd ~{account} && {sudo} -u {account} {line}")
            }
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_line())
    }
}
