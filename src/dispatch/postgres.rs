//! Database role, database, schema, dump, and restore operations.

use camino::Utf8Path;
use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::postgres::{DatabaseSpec, DatabaseUserSpec, DumpRequest, PostgresTarget};
use crate::remote::CommandRunner;

use super::{Abort, ActionDispatcher, Outcome, ProvisionError, aborted};

impl<R: CommandRunner> ActionDispatcher<'_, R> {
    /// Creates a database role with `CREATE USER`.
    ///
    /// Does not check whether the role exists; pair with
    /// [`StateProber::user_exists`](crate::probe::StateProber::user_exists)
    /// when the call must be repeatable.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when `psql` fails.
    pub fn create_database_user(
        &self,
        spec: &DatabaseUserSpec,
        target: &PostgresTarget,
    ) -> Result<Outcome, ProvisionError> {
        self.host.run(&target.create_user_command(spec))?;
        Ok(Outcome::Applied)
    }

    /// Creates a database with `createdb`.
    ///
    /// Does not check whether the database exists; pair with
    /// [`StateProber::database_exists`](crate::probe::StateProber::database_exists)
    /// when the call must be repeatable.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when `createdb` fails.
    pub fn create_database(
        &self,
        spec: &DatabaseSpec,
        target: &PostgresTarget,
    ) -> Result<Outcome, ProvisionError> {
        self.host.run(&target.create_database_command(spec))?;
        Ok(Outcome::Applied)
    }

    /// Creates schema `name` inside `database`, owned by `owner` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when `psql` fails.
    pub fn create_schema(
        &self,
        name: &str,
        database: &str,
        owner: Option<&str>,
        target: &PostgresTarget,
    ) -> Result<Outcome, ProvisionError> {
        self.host
            .run(&target.create_schema_command(name, database, owner))?;
        Ok(Outcome::Applied)
    }

    /// Dumps a database with `pg_dump`, naming the file after the current
    /// local time unless the request names it.
    ///
    /// # Errors
    ///
    /// See [`dump_database_at`](Self::dump_database_at).
    pub fn dump_database(
        &self,
        request: &DumpRequest,
        target: &PostgresTarget,
    ) -> Result<Outcome, ProvisionError> {
        self.dump_database_at(request, target, Local::now().naive_local())
    }

    /// Dumps a database with `pg_dump` as if taken at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Abort::RelativePath`] when the destination directory is not
    /// absolute, [`Abort::MissingPath`] when it is absent,
    /// [`Abort::MissingDatabase`] when the database is absent, and
    /// [`ProvisionError::Remote`] when probing or dumping fails.
    pub fn dump_database_at(
        &self,
        request: &DumpRequest,
        target: &PostgresTarget,
        now: NaiveDateTime,
    ) -> Result<Outcome, ProvisionError> {
        if request.directory.is_relative() {
            return Err(aborted(
                "dump_database",
                Abort::RelativePath {
                    path: request.directory.to_string(),
                },
            ));
        }
        if !self.prober.path_exists(request.directory.as_str())? {
            return Err(aborted(
                "dump_database",
                Abort::MissingPath {
                    path: request.directory.to_string(),
                },
            ));
        }
        if !self.prober.database_exists(&request.database, target)? {
            return Err(aborted(
                "dump_database",
                Abort::MissingDatabase {
                    database: request.database.clone(),
                },
            ));
        }
        let destination = request.destination_at(now);
        self.host.run(&target.dump_command(
            &request.database,
            request.format,
            &destination,
        ))?;
        info!(database = %request.database, %destination, "database dumped");
        Ok(Outcome::Applied)
    }

    /// Replays `sql_file` into `database` through `psql`.
    ///
    /// # Errors
    ///
    /// Returns [`Abort::RelativePath`] when `sql_file` is not absolute,
    /// [`Abort::MissingSqlFile`] when the file is absent,
    /// [`Abort::MissingDatabase`] when the database is absent, and
    /// [`ProvisionError::Remote`] when probing or restoring fails.
    pub fn restore_database(
        &self,
        database: &str,
        sql_file: &str,
        target: &PostgresTarget,
    ) -> Result<Outcome, ProvisionError> {
        if Utf8Path::new(sql_file).is_relative() {
            return Err(aborted(
                "restore_database",
                Abort::RelativePath {
                    path: sql_file.to_owned(),
                },
            ));
        }
        if !self.prober.path_exists(sql_file)? {
            return Err(aborted(
                "restore_database",
                Abort::MissingSqlFile {
                    path: sql_file.to_owned(),
                },
            ));
        }
        if !self.prober.database_exists(database, target)? {
            return Err(aborted(
                "restore_database",
                Abort::MissingDatabase {
                    database: database.to_owned(),
                },
            ));
        }
        self.host.run(&target.restore_command(database, sql_file))?;
        Ok(Outcome::Applied)
    }
}
