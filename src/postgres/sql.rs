//! SQL fragment composition for statements passed to `psql -c`.

use super::DatabaseUserSpec;

/// Renders `value` as a single-quoted SQL string literal.
pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders `name` as an SQL identifier, quoting it only when it would not
/// survive unquoted (upper case, punctuation, leading digit).
pub(crate) fn identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '$'))
}

/// Role options for `CREATE USER`, in the order PostgreSQL documents them.
#[must_use]
pub fn user_options(spec: &DatabaseUserSpec) -> String {
    let mut options = vec![
        flag(spec.superuser, "SUPERUSER"),
        flag(spec.createdb, "CREATEDB"),
        flag(spec.createrole, "CREATEROLE"),
        flag(spec.inherit, "INHERIT"),
        flag(spec.login, "LOGIN"),
    ];
    if let Some(limit) = spec.connection_limit {
        options.push(format!("CONNECTION LIMIT {limit}"));
    }
    let password_type = if spec.encrypted_password {
        "ENCRYPTED"
    } else {
        "UNENCRYPTED"
    };
    options.push(format!(
        "{password_type} PASSWORD {}",
        literal(&spec.password)
    ));
    options.join(" ")
}

fn flag(enabled: bool, name: &str) -> String {
    if enabled {
        name.to_owned()
    } else {
        format!("NO{name}")
    }
}

pub(crate) fn create_user(spec: &DatabaseUserSpec) -> String {
    format!(
        "CREATE USER {} {};",
        identifier(&spec.name),
        user_options(spec)
    )
}

pub(crate) fn count_users(name: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM pg_user WHERE usename = {};",
        literal(name)
    )
}

pub(crate) fn create_schema(name: &str, owner: Option<&str>) -> String {
    match owner {
        Some(role) => format!(
            "CREATE SCHEMA {} AUTHORIZATION {}",
            identifier(name),
            identifier(role)
        ),
        None => format!("CREATE SCHEMA {}", identifier(name)),
    }
}
