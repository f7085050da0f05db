//! PostgreSQL connection target, creation specs, and client commands.
//!
//! All database commands run as the service account through the `psql`,
//! `createdb`, and `pg_dump` clients on the remote host. Statements are
//! composed with SQL quoting applied to names and literals, then passed as
//! a single shell-escaped argument.

use std::ffi::OsString;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::remote::{ConfigLoadError, RemoteCommand, RemoteError, ServiceAccount};

mod sql;

pub use sql::user_options;

/// Default local account the PostgreSQL server runs as.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "postgres";

/// Default remote directory for dumps.
pub const DEFAULT_BACKUP_DIR: &str = "/var/backups/postgres";

/// Stands in for passwords in logged command lines and error messages.
const REDACTED_PASSWORD: &str = "********";

/// Timestamp layout used in default dump file names.
const DUMP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// PostgreSQL settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HOSTWRIGHT_PG",
    discovery(
        app_name = "hostwright",
        env_var = "HOSTWRIGHT_CONFIG_PATH",
        config_file_name = "hostwright.toml",
        dotfile_name = ".hostwright.toml",
        project_file_name = "hostwright.toml"
    )
)]
pub struct PostgresConfig {
    /// Account the server runs as; client commands are issued as this user.
    #[ortho_config(default = DEFAULT_SERVICE_ACCOUNT.to_owned())]
    pub service_account: String,
    /// Server port; the client default applies when unset.
    pub port: Option<u16>,
    /// Remote directory that receives dumps by default.
    #[ortho_config(default = DEFAULT_BACKUP_DIR.to_owned())]
    pub backup_dir: String,
}

impl PostgresConfig {
    /// Built-in settings: the `postgres` account on the default port, dumping
    /// into [`DEFAULT_BACKUP_DIR`].
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            service_account: DEFAULT_SERVICE_ACCOUNT.to_owned(),
            port: None,
            backup_dir: DEFAULT_BACKUP_DIR.to_owned(),
        }
    }

    /// Loads configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigLoadError> {
        Self::load_from_iter([OsString::from("hostwright")])
            .map_err(|err| ConfigLoadError::Parse(err.to_string()))
    }

    /// Builds the connection target described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidAccount`] when the service account is
    /// not a portable user name.
    pub fn target(&self) -> Result<PostgresTarget, RemoteError> {
        let account = ServiceAccount::new(self.service_account.trim())?;
        Ok(PostgresTarget {
            account,
            port: self.port,
        })
    }

    /// Starts a dump request for `database` into the configured backup
    /// directory.
    #[must_use]
    pub fn dump_request(&self, database: impl Into<String>) -> DumpRequest {
        DumpRequest::new(database).with_directory(self.backup_dir.trim())
    }
}

/// The server a database operation talks to: the account its clients run
/// as and an optional non-default port.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PostgresTarget {
    account: ServiceAccount,
    port: Option<u16>,
}

impl Default for PostgresTarget {
    fn default() -> Self {
        Self::new(ServiceAccount::postgres())
    }
}

impl PostgresTarget {
    /// Targets the default port as `account`.
    #[must_use]
    pub const fn new(account: ServiceAccount) -> Self {
        Self {
            account,
            port: None,
        }
    }

    /// Targets a non-default port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Account client commands run as.
    #[must_use]
    pub const fn account(&self) -> &ServiceAccount {
        &self.account
    }

    /// Port, when not the client default.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Starts `program` as the service account with the port option applied.
    ///
    /// Database names are always passed as `--dbname=<name>` or after `--`,
    /// so a name starting with `-` cannot be read as a client option.
    fn client(&self, program: &str) -> RemoteCommand {
        let command = RemoteCommand::new(program).as_account(self.account.clone());
        match self.port {
            Some(port) => command.args([String::from("-p"), port.to_string()]),
            None => command,
        }
    }

    pub(crate) fn count_users_command(&self, name: &str) -> RemoteCommand {
        self.client("psql")
            .args(["-t", "-A", "-c"])
            .arg(sql::count_users(name))
    }

    pub(crate) fn database_probe_command(&self, name: &str) -> RemoteCommand {
        self.client("psql").arg(dbname(name)).args(["-c", ""])
    }

    pub(crate) fn create_user_command(&self, spec: &DatabaseUserSpec) -> RemoteCommand {
        let shown = DatabaseUserSpec {
            password: String::from(REDACTED_PASSWORD),
            ..spec.clone()
        };
        self.client("psql")
            .arg("-c")
            .masked_arg(sql::create_user(spec), sql::create_user(&shown))
    }

    pub(crate) fn create_database_command(&self, spec: &DatabaseSpec) -> RemoteCommand {
        self.client("createdb")
            .arg(format!("--owner={}", spec.owner))
            .arg(format!("--template={}", spec.template))
            .arg(format!("--encoding={}", spec.encoding))
            .arg(format!("--lc-ctype={}", spec.locale))
            .arg(format!("--lc-collate={}", spec.locale))
            .args(["--", spec.name.as_str()])
    }

    pub(crate) fn create_schema_command(
        &self,
        name: &str,
        database: &str,
        owner: Option<&str>,
    ) -> RemoteCommand {
        self.client("psql")
            .arg(dbname(database))
            .arg("-c")
            .arg(sql::create_schema(name, owner))
    }

    pub(crate) fn dump_command(
        &self,
        database: &str,
        format: DumpFormat,
        destination: &Utf8Path,
    ) -> RemoteCommand {
        self.client("pg_dump")
            .arg(dbname(database))
            .arg(format!("--format={format}"))
            .arg("--blobs")
            .arg(format!("--file={destination}"))
    }

    pub(crate) fn restore_command(&self, database: &str, sql_file: &str) -> RemoteCommand {
        self.client("psql")
            .arg(dbname(database))
            .stdin_from(sql_file)
    }
}

fn dbname(database: &str) -> String {
    format!("--dbname={database}")
}

/// Attributes of a database role created with `CREATE USER`.
///
/// Every attribute has an explicit value; there is no merging with an
/// existing role.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatabaseUserSpec {
    /// Role name.
    pub name: String,
    /// Login password.
    pub password: String,
    /// Grants `SUPERUSER`.
    pub superuser: bool,
    /// Grants `CREATEDB`.
    pub createdb: bool,
    /// Grants `CREATEROLE`.
    pub createrole: bool,
    /// Inherits privileges of granted roles.
    pub inherit: bool,
    /// Allows the role to log in.
    pub login: bool,
    /// Maximum concurrent connections; unlimited when unset.
    pub connection_limit: Option<u32>,
    /// Stores the password with `ENCRYPTED` rather than `UNENCRYPTED`.
    pub encrypted_password: bool,
}

impl DatabaseUserSpec {
    /// A login role that inherits privileges and has no other rights.
    #[must_use]
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            superuser: false,
            createdb: false,
            createrole: false,
            inherit: true,
            login: true,
            connection_limit: None,
            encrypted_password: false,
        }
    }
}

/// Parameters for `createdb`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatabaseSpec {
    /// Database name.
    pub name: String,
    /// Owning role.
    pub owner: String,
    /// Template database.
    pub template: String,
    /// Character encoding.
    pub encoding: String,
    /// Used for both `LC_CTYPE` and `LC_COLLATE`.
    pub locale: String,
}

impl DatabaseSpec {
    /// A UTF-8 database cloned from `template0`.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            template: String::from("template0"),
            encoding: String::from("UTF8"),
            locale: String::from("en_US.UTF-8"),
        }
    }
}

/// Output format passed to `pg_dump --format`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DumpFormat {
    /// Plain SQL script.
    #[default]
    Plain,
    /// Compressed archive for `pg_restore`.
    Custom,
    /// Directory archive.
    Directory,
    /// Tar archive.
    Tar,
}

impl DumpFormat {
    /// Name `pg_dump` expects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Custom => "custom",
            Self::Directory => "directory",
            Self::Tar => "tar",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A request to dump one database into a remote directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DumpRequest {
    /// Database to dump.
    pub database: String,
    /// Absolute remote directory that must already exist. `pg_dump` runs
    /// from the service account's home, so relative paths are refused.
    pub directory: Utf8PathBuf,
    /// File name inside `directory`; derived from the database name and the
    /// time of the dump when unset.
    pub file_name: Option<String>,
    /// Output format.
    pub format: DumpFormat,
}

impl DumpRequest {
    /// A plain-format dump of `database` into [`DEFAULT_BACKUP_DIR`].
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            directory: Utf8PathBuf::from(DEFAULT_BACKUP_DIR),
            file_name: None,
            format: DumpFormat::Plain,
        }
    }

    /// Overrides the destination directory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<Utf8PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Overrides the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Overrides the output format.
    #[must_use]
    pub const fn with_format(mut self, format: DumpFormat) -> Self {
        self.format = format;
        self
    }

    /// File name for a dump taken at `now`: the explicit name when given,
    /// otherwise `<database>-<YYYYMMDDHHmm>.sql`.
    #[must_use]
    pub fn file_name_at(&self, now: NaiveDateTime) -> String {
        match self.file_name {
            Some(ref name) if !name.trim().is_empty() => name.clone(),
            _ => format!(
                "{}-{}.sql",
                self.database,
                now.format(DUMP_TIMESTAMP_FORMAT)
            ),
        }
    }

    /// Full remote path of a dump taken at `now`.
    #[must_use]
    pub fn destination_at(&self, now: NaiveDateTime) -> Utf8PathBuf {
        self.directory.join(self.file_name_at(now))
    }
}
