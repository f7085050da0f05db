//! Unit tests for precondition-gated operations.

use super::*;
use crate::postgres::{DatabaseSpec, DatabaseUserSpec, DumpFormat, DumpRequest, PostgresTarget};
use crate::test_support::{ScriptedRunner, host_config, mount_table, swap_table};
use chrono::NaiveDate;
use rstest::{fixture, rstest};
use tracing_test::traced_test;

#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

fn host(runner: &ScriptedRunner) -> RemoteHost<ScriptedRunner> {
    RemoteHost::new(host_config("root"), runner.clone()).expect("config should validate")
}

fn push_unmounted(runner: &ScriptedRunner) {
    runner.push_stdout(mount_table(&[("/dev/sda1", "/")]));
    runner.push_stdout(swap_table(&[]));
}

#[rstest]
fn mount_applies_when_device_is_free(runner: ScriptedRunner) {
    push_unmounted(&runner);
    runner.push_success();
    let remote = host(&runner);

    let outcome = ActionDispatcher::new(&remote)
        .mount("/dev/sdb1", "/srv")
        .expect("mount should succeed");

    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(
        runner.remote_commands(),
        vec!["mount", "swapon -s", "mount /dev/sdb1 /srv"]
    );
}

#[rstest]
fn mount_skips_mounted_device(runner: ScriptedRunner) {
    runner.push_stdout(mount_table(&[("/dev/sdb1", "/srv")]));
    let remote = host(&runner);

    let outcome = ActionDispatcher::new(&remote)
        .mount("/dev/sdb1", "/srv")
        .expect("skip is not an error");

    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(runner.remote_commands(), vec!["mount"]);
}

#[rstest]
fn activate_swap_skips_active_swap(runner: ScriptedRunner) {
    runner.push_stdout(mount_table(&[("/dev/sda1", "/")]));
    runner.push_stdout(swap_table(&["/dev/sda2"]));
    let remote = host(&runner);

    let outcome = ActionDispatcher::new(&remote)
        .activate_swap("/dev/sda2")
        .expect("skip is not an error");

    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(runner.pending(), 0);
    assert_eq!(runner.remote_commands().len(), 2);
}

#[rstest]
fn format_filesystem_runs_mkfs_for_fstype(runner: ScriptedRunner) {
    push_unmounted(&runner);
    runner.push_success();
    let remote = host(&runner);

    ActionDispatcher::new(&remote)
        .format_filesystem("/dev/sdb1", "ext4")
        .expect("format should succeed");

    assert_eq!(
        runner.remote_commands().last().map(String::as_str),
        Some("mkfs.ext4 /dev/sdb1")
    );
}

#[rstest]
fn format_filesystem_aborts_on_mounted_device(runner: ScriptedRunner) {
    runner.push_stdout(mount_table(&[("/dev/sda1", "/")]));
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .format_filesystem("/dev/sda1", "ext4")
        .expect_err("mounted device must not be formatted");

    assert!(err.is_fatal());
    assert_eq!(
        err,
        ProvisionError::Aborted(Abort::DeviceMounted {
            device: String::from("/dev/sda1")
        })
    );
    assert!(
        !runner
            .remote_commands()
            .iter()
            .any(|command| command.starts_with("mkfs"))
    );
}

#[rstest]
fn format_swap_aborts_on_active_swap(runner: ScriptedRunner) {
    runner.push_stdout(mount_table(&[]));
    runner.push_stdout(swap_table(&["/dev/sda2"]));
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .format_swap("/dev/sda2")
        .expect_err("active swap must not be reformatted");

    assert!(matches!(err.abort(), Some(Abort::SwapMounted { .. })));
    assert_eq!(runner.remote_commands(), vec!["mount", "swapon -s"]);
}

#[rstest]
fn failing_mutation_surfaces_remote_error(runner: ScriptedRunner) {
    push_unmounted(&runner);
    runner.push_failure(1);
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .format_swap("/dev/sdb2")
        .expect_err("mkswap failure should propagate");

    assert!(!err.is_fatal());
    assert!(
        matches!(err, ProvisionError::Remote(RemoteError::CommandFailed { .. })),
        "got {err:?}"
    );
}

#[rstest]
fn create_database_user_runs_psql_as_service_account(runner: ScriptedRunner) {
    runner.push_success();
    let remote = host(&runner);

    ActionDispatcher::new(&remote)
        .create_database_user(
            &DatabaseUserSpec::new("dbuser", "s3cr3t"),
            &PostgresTarget::default(),
        )
        .expect("create user should succeed");

    assert_eq!(
        runner.remote_commands(),
        vec![
            "cd ~postgres && sudo -u postgres psql -c 'CREATE USER dbuser NOSUPERUSER NOCREATEDB NOCREATEROLE INHERIT LOGIN UNENCRYPTED PASSWORD '\\''s3cr3t'\\'';'"
        ]
    );
}

#[rstest]
fn create_database_issues_createdb_without_probing(runner: ScriptedRunner) {
    runner.push_success();
    let remote = host(&runner);

    let outcome = ActionDispatcher::new(&remote)
        .create_database(
            &DatabaseSpec::new("myapp", "dbuser"),
            &PostgresTarget::default(),
        )
        .expect("createdb should succeed");

    assert_eq!(outcome, Outcome::Applied);
    let commands = runner.remote_commands();
    assert_eq!(commands.len(), 1);
    assert!(commands.first().is_some_and(|line| line.contains("createdb --owner=dbuser")));
}

#[rstest]
fn create_schema_targets_database(runner: ScriptedRunner) {
    runner.push_success();
    let remote = host(&runner);

    ActionDispatcher::new(&remote)
        .create_schema("reporting", "myapp", Some("dbuser"), &PostgresTarget::default())
        .expect("create schema should succeed");

    assert_eq!(
        runner.remote_commands(),
        vec![
            "cd ~postgres && sudo -u postgres psql --dbname=myapp -c 'CREATE SCHEMA reporting AUTHORIZATION dbuser'"
        ]
    );
}

fn dump_time() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 12, 1)
        .and_then(|date| date.and_hms_opt(9, 5, 0))
        .expect("valid timestamp")
}

#[rstest]
fn dump_database_writes_timestamped_file(runner: ScriptedRunner) {
    runner.push_success();
    runner.push_success();
    runner.push_success();
    let remote = host(&runner);

    ActionDispatcher::new(&remote)
        .dump_database_at(
            &DumpRequest::new("myapp"),
            &PostgresTarget::default(),
            dump_time(),
        )
        .expect("dump should succeed");

    assert_eq!(
        runner.remote_commands(),
        vec![
            "test -e /var/backups/postgres",
            "cd ~postgres && sudo -u postgres psql --dbname=myapp -c ''",
            "cd ~postgres && sudo -u postgres pg_dump --dbname=myapp --format=plain --blobs --file=/var/backups/postgres/myapp-201312010905.sql",
        ]
    );
}

#[rstest]
fn dump_database_aborts_on_missing_directory(runner: ScriptedRunner) {
    runner.push_failure(1);
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .dump_database_at(
            &DumpRequest::new("myapp").with_directory("/nonexistent"),
            &PostgresTarget::default(),
            dump_time(),
        )
        .expect_err("missing directory should abort");

    assert_eq!(
        err,
        ProvisionError::Aborted(Abort::MissingPath {
            path: String::from("/nonexistent")
        })
    );
    assert_eq!(runner.remote_commands().len(), 1);
}

#[rstest]
fn dump_database_aborts_on_missing_database(runner: ScriptedRunner) {
    runner.push_success();
    runner.push_failure(2);
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .dump_database_at(
            &DumpRequest::new("ghost").with_format(DumpFormat::Custom),
            &PostgresTarget::default(),
            dump_time(),
        )
        .expect_err("missing database should abort");

    assert!(matches!(
        err.abort(),
        Some(Abort::MissingDatabase { database }) if database == "ghost"
    ));
    assert!(
        !runner
            .remote_commands()
            .iter()
            .any(|command| command.contains("pg_dump"))
    );
}

#[rstest]
fn restore_database_feeds_sql_file(runner: ScriptedRunner) {
    runner.push_success();
    runner.push_success();
    runner.push_success();
    let remote = host(&runner);

    ActionDispatcher::new(&remote)
        .restore_database("myapp", "/srv/myapp.sql", &PostgresTarget::default())
        .expect("restore should succeed");

    assert_eq!(
        runner.remote_commands().last().map(String::as_str),
        Some("cd ~postgres && sudo -u postgres psql --dbname=myapp < /srv/myapp.sql")
    );
}

#[rstest]
#[case::missing_file(1, 0, Abort::MissingSqlFile { path: String::from("/srv/myapp.sql") })]
#[case::missing_database(0, 2, Abort::MissingDatabase { database: String::from("myapp") })]
fn restore_database_aborts_before_psql(
    runner: ScriptedRunner,
    #[case] file_status: i32,
    #[case] database_status: i32,
    #[case] expected: Abort,
) {
    runner.push_output(Some(file_status), "", "");
    runner.push_output(Some(database_status), "", "");
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .restore_database("myapp", "/srv/myapp.sql", &PostgresTarget::default())
        .expect_err("restore should abort");

    assert_eq!(err, ProvisionError::Aborted(expected));
    assert!(
        !runner
            .remote_commands()
            .iter()
            .any(|command| command.ends_with("< /srv/myapp.sql"))
    );
}

#[rstest]
fn dump_database_refuses_relative_directory(runner: ScriptedRunner) {
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .dump_database_at(
            &DumpRequest::new("myapp").with_directory("backups"),
            &PostgresTarget::default(),
            dump_time(),
        )
        .expect_err("relative directory should abort");

    assert_eq!(
        err,
        ProvisionError::Aborted(Abort::RelativePath {
            path: String::from("backups")
        })
    );
    assert!(err.is_fatal());
    assert!(runner.remote_commands().is_empty());
}

#[rstest]
#[case::bare_name("myapp.sql")]
#[case::dotted("./dumps/myapp.sql")]
#[case::home_relative("~/myapp.sql")]
fn restore_database_refuses_relative_sql_file(runner: ScriptedRunner, #[case] sql_file: &str) {
    let remote = host(&runner);

    let err = ActionDispatcher::new(&remote)
        .restore_database("myapp", sql_file, &PostgresTarget::default())
        .expect_err("relative file should abort");

    assert_eq!(
        err,
        ProvisionError::Aborted(Abort::RelativePath {
            path: String::from(sql_file)
        })
    );
    assert!(runner.remote_commands().is_empty());
}

#[test]
#[traced_test]
fn skips_and_aborts_are_logged() {
    let runner = ScriptedRunner::new();
    runner.push_stdout(mount_table(&[("/dev/sdb1", "/srv")]));
    runner.push_stdout(mount_table(&[("/dev/sdb1", "/srv")]));
    let remote = host(&runner);
    let dispatcher = ActionDispatcher::new(&remote);

    dispatcher
        .mount("/dev/sdb1", "/srv")
        .expect("skip is not an error");
    dispatcher
        .format_filesystem("/dev/sdb1", "xfs")
        .expect_err("mounted device must not be formatted");

    assert!(logs_contain("skipping"));
    assert!(logs_contain("aborting"));
    assert!(logs_contain("device /dev/sdb1 is mounted"));
}
