//! Process-wide defaults for aggregate metadata.

use serde::Deserialize;

use crate::error::OrmResult;
use crate::query::Dialect;

/// Environment variable holding the default schema.
pub const SCHEMA_ENV: &str = "VORM_SCHEMA";
/// Environment variable holding the default dialect.
pub const DIALECT_ENV: &str = "VORM_DIALECT";

/// Defaults applied to metadata that leaves schema or dialect unset.
///
/// See [`AggregateMetadata::apply_defaults`](crate::AggregateMetadata::apply_defaults).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Schema used when an aggregate declares none. Never applied to MySQL.
    pub schema: Option<String>,
    /// Dialect used when an aggregate declares none.
    pub dialect: Option<Dialect>,
}

impl Defaults {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the default dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Read `VORM_SCHEMA` and `VORM_DIALECT`. Unset or empty variables
    /// leave the field unset; an unknown dialect is an error.
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Defaults::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrmResult<Self> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Ok(Self {
            schema: read(SCHEMA_ENV).map(|value| value.trim().to_string()),
            dialect: read(DIALECT_ENV).map(|value| value.parse()).transpose()?,
        })
    }
}
