//! SQL identifier validation and dialect quoting.
//!
//! Schema, entity and column names must match `[A-Za-z_][A-Za-z0-9_$]*`.
//! T-SQL renders identifiers as `[name]` (with `]` escaped as `]]`);
//! PostgreSQL and MySQL render them unquoted.

use crate::error::{OrmError, OrmResult};
use crate::query::Dialect;

/// Whether `name` is a plain SQL identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

/// Validate one identifier, naming the aggregate and what it is in the error.
pub fn validate_identifier(aggregate: &str, what: &str, name: &str) -> OrmResult<()> {
    if name.trim().is_empty() {
        return Err(OrmError::configuration(
            aggregate,
            format!("{what} name cannot be empty"),
        ));
    }
    if !is_valid_identifier(name) {
        return Err(OrmError::configuration(
            aggregate,
            format!("invalid {what} name '{name}'"),
        ));
    }
    Ok(())
}

/// Append `name` to `out`, quoted for `dialect`.
pub fn write_quoted(dialect: Dialect, name: &str, out: &mut String) {
    match dialect {
        Dialect::SqlServer => {
            out.push('[');
            for ch in name.chars() {
                if ch == ']' {
                    out.push_str("]]");
                } else {
                    out.push(ch);
                }
            }
            out.push(']');
        }
        Dialect::PostgreSql | Dialect::MySql => out.push_str(name),
    }
}

/// `name` quoted for `dialect`.
pub fn quote(dialect: Dialect, name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    write_quoted(dialect, name, &mut out);
    out
}

/// Render `schema.entity` (or just `entity`) for `dialect`.
pub fn qualified_name(dialect: Dialect, schema: Option<&str>, entity: &str) -> String {
    let mut out = String::new();
    if let Some(schema) = schema {
        write_quoted(dialect, schema, &mut out);
        out.push('.');
    }
    write_quoted(dialect, entity, &mut out);
    out
}

/// Check schema and entity names against the dialect's rules: MySQL has no
/// schema; SQL Server and PostgreSQL require one.
pub fn validate_table(
    dialect: Dialect,
    aggregate: &str,
    schema: Option<&str>,
    entity: &str,
) -> OrmResult<()> {
    match (dialect, schema) {
        (Dialect::MySql, Some(_)) => {
            return Err(OrmError::configuration(
                aggregate,
                "MySQL does not support a schema",
            ));
        }
        (Dialect::MySql, None) => {}
        (_, None) => {
            return Err(OrmError::configuration(
                aggregate,
                format!("{dialect} requires a schema"),
            ));
        }
        (_, Some(schema)) => validate_identifier(aggregate, "schema", schema)?,
    }
    validate_identifier(aggregate, "entity", entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rules() {
        assert!(is_valid_identifier("Users"));
        assert!(is_valid_identifier("_tmp$1"));
        assert!(is_valid_identifier("Address_City"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1users"));
        assert!(!is_valid_identifier("user name"));
        assert!(!is_valid_identifier("users;drop"));
    }

    #[test]
    fn sql_server_brackets_escape_closing_bracket() {
        assert_eq!(quote(Dialect::SqlServer, "Users"), "[Users]");
        assert_eq!(quote(Dialect::SqlServer, "a]b"), "[a]]b]");
        assert_eq!(quote(Dialect::PostgreSql, "Users"), "Users");
    }

    #[test]
    fn qualified_names() {
        assert_eq!(
            qualified_name(Dialect::SqlServer, Some("dbo"), "Users"),
            "[dbo].[Users]"
        );
        assert_eq!(
            qualified_name(Dialect::PostgreSql, Some("public"), "Users"),
            "public.Users"
        );
        assert_eq!(qualified_name(Dialect::MySql, None, "Users"), "Users");
    }

    #[test]
    fn table_rules_per_dialect() {
        assert!(validate_table(Dialect::MySql, "User", None, "Users").is_ok());
        assert!(
            validate_table(Dialect::MySql, "User", Some("app"), "Users")
                .unwrap_err()
                .is_configuration()
        );
        assert!(validate_table(Dialect::SqlServer, "User", None, "Users").is_err());
        assert!(validate_table(Dialect::PostgreSql, "User", Some("  "), "Users").is_err());
        assert!(validate_table(Dialect::PostgreSql, "User", Some("public"), "Users").is_ok());
        assert!(validate_table(Dialect::SqlServer, "User", Some("dbo"), "bad name").is_err());
    }
}
