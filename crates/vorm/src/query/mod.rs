//! Dialect-specific SQL generation.
//!
//! A [`QueryGenerator`] turns an aggregate's metadata into static SQL text for
//! Get, GetAll, Insert, Update, Delete and Upsert. Parameters are always
//! written as `@name`, where `name` is the flat column path of the value in
//! the [`FlatRow`] produced by the mapper.
//!
//! | Dialect | Quoting | Generated values |
//! |---|---|---|
//! | [`Dialect::SqlServer`] | `[schema].[entity]` | `OUTPUT inserted.*` / `deleted.*` |
//! | [`Dialect::PostgreSql`] | `schema.entity` | `RETURNING` |
//! | [`Dialect::MySql`] | `entity` | follow-up `SELECT` |
//!
//! # Example
//!
//! ```ignore
//! let generator = generator_for::<User>(mapper.clone(), metadata.clone())?;
//! assert_eq!(
//!     generator.generate_get_query()?,
//!     "SELECT [dbo].[Users].[Id], [dbo].[Users].[Name] FROM [dbo].[Users] WHERE [dbo].[Users].[Id] = @Id;"
//! );
//! ```

mod mysql;
mod postgres;
mod sqlserver;


use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::error::{OrmError, OrmResult};
use crate::ident;
use crate::mapper::{FlatProperty, StructuralMapper};
use crate::metadata::AggregateMetadata;
use crate::row::FlatRow;
use crate::shape::Mapped;

pub use mysql::MySqlQueryGenerator;
pub use postgres::PostgresQueryGenerator;
pub use sqlserver::SqlServerQueryGenerator;

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Microsoft SQL Server (T-SQL).
    SqlServer,
    PostgreSql,
    MySql,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlserver" | "mssql" | "tsql" => Ok(Self::SqlServer),
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSql),
            "mysql" => Ok(Self::MySql),
            other => Err(OrmError::Other(format!("unknown SQL dialect '{other}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// SQL text generation for one aggregate type.
///
/// All methods are pure: they allocate the SQL string and perform no I/O.
pub trait QueryGenerator<T>: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// `SELECT <columns> FROM <entity>;`
    fn generate_get_all_query(&self) -> OrmResult<String>;

    /// Select one row by key.
    fn generate_get_query(&self) -> OrmResult<String>;

    /// Delete one row by key, returning the deleted row.
    fn generate_delete_query(&self) -> OrmResult<String>;

    /// Insert `instance`, returning the stored row. Identity columns and
    /// default-constrained properties still at their type default are left
    /// to the database.
    fn generate_insert_query(&self, instance: &T) -> OrmResult<String>;

    /// Update `instance` by key, returning the stored row.
    fn generate_update_query(&self, instance: &T) -> OrmResult<String>;

    /// Insert or update `instance`.
    ///
    /// With identities declared this is the update statement when any
    /// identity holds a non-default value, otherwise the insert statement.
    /// Without identities a native upsert keyed on the full key is emitted.
    fn generate_upsert_query(&self, instance: &T) -> OrmResult<String>;

    /// Comma-separated column list, qualified by the entity (`None`) or by
    /// an alias (`Some`).
    fn generate_property_list(&self, qualifier: Option<&str>) -> String;
}

/// Pick the generator matching the metadata's dialect.
pub fn generator_for<T: Mapped>(
    mapper: Arc<StructuralMapper>,
    metadata: Arc<AggregateMetadata>,
) -> OrmResult<Box<dyn QueryGenerator<T>>> {
    if metadata.aggregate_type_id() != TypeId::of::<T>() {
        return Err(OrmError::mapping(
            metadata.type_name(),
            format!(
                "metadata does not describe {}",
                std::any::type_name::<T>()
            ),
        ));
    }
    let dialect = metadata.dialect().ok_or_else(|| {
        OrmError::configuration(metadata.type_name(), "no SQL dialect configured")
    })?;
    Ok(match dialect {
        Dialect::SqlServer => Box::new(SqlServerQueryGenerator::new(mapper, metadata)?),
        Dialect::PostgreSql => Box::new(PostgresQueryGenerator::new(mapper, metadata)?),
        Dialect::MySql => Box::new(MySqlQueryGenerator::new(mapper, metadata)?),
    })
}

/// State shared by every dialect: precomputed column lists and the
/// flattened defaults of identity and default-constrained properties.
pub(crate) struct GeneratorCore {
    dialect: Dialect,
    mapper: Arc<StructuralMapper>,
    metadata: Arc<AggregateMetadata>,
    table: String,
    columns: Vec<FlatProperty>,
    keys: Vec<FlatProperty>,
    identities: Vec<FlatProperty>,
    property_defaults: HashMap<&'static str, FlatRow>,
}

impl GeneratorCore {
    pub(crate) fn new(
        dialect: Dialect,
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
    ) -> OrmResult<Self> {
        let aggregate = metadata.type_name();
        ident::validate_table(dialect, aggregate, metadata.schema(), metadata.entity())?;

        let columns = mapper.flattened_property_list(&metadata)?;
        for column in &columns {
            ident::validate_identifier(aggregate, "column", column.path())?;
        }

        let mut keys = Vec::new();
        for key in metadata.keys() {
            keys.extend(columns.iter().filter(|c| c.top() == *key).cloned());
        }
        let identities = columns
            .iter()
            .filter(|c| metadata.is_identity(c.top()))
            .cloned()
            .collect();

        let mut property_defaults = HashMap::new();
        for name in metadata.identities().iter().chain(metadata.defaults()) {
            let property = metadata.property(name)?;
            property_defaults.insert(*name, mapper.property_defaults(property)?);
        }

        let table = ident::qualified_name(dialect, metadata.schema(), metadata.entity());
        tracing::debug!(
            target: "vorm.query",
            aggregate,
            %dialect,
            table = %table,
            columns = columns.len(),
            "query generator ready"
        );

        Ok(Self {
            dialect,
            mapper,
            metadata,
            table,
            columns,
            keys,
            identities,
            property_defaults,
        })
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn metadata(&self) -> &AggregateMetadata {
        &self.metadata
    }

    fn aggregate(&self) -> &'static str {
        self.metadata.type_name()
    }

    /// Rendered `schema.entity`.
    pub(crate) fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn keys(&self) -> &[FlatProperty] {
        &self.keys
    }

    pub(crate) fn quote(&self, name: &str) -> String {
        ident::quote(self.dialect, name)
    }

    /// `<table>.<column>`
    pub(crate) fn qualified(&self, column: &FlatProperty) -> String {
        format!("{}.{}", self.table, self.quote(column.path()))
    }

    pub(crate) fn property_list(&self, qualifier: Option<&str>) -> String {
        let prefix = match qualifier {
            Some(alias) => self.quote(alias),
            None => self.table.clone(),
        };
        self.columns
            .iter()
            .map(|c| format!("{prefix}.{}", self.quote(c.path())))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Unqualified column list, e.g. for `RETURNING`.
    pub(crate) fn plain_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| self.quote(c.path()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column list prefixed by a pseudo-table such as `inserted`.
    pub(crate) fn prefixed_list(&self, prefix: &str) -> String {
        self.columns
            .iter()
            .map(|c| format!("{prefix}.{}", self.quote(c.path())))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `SELECT <columns> FROM <table>`, without terminator.
    pub(crate) fn select(&self) -> String {
        format!("SELECT {} FROM {}", self.property_list(None), self.table)
    }

    /// AND-joined key predicate in key declaration order.
    pub(crate) fn where_keys(&self, operation: &str) -> OrmResult<String> {
        if self.keys.is_empty() {
            return Err(OrmError::unsupported(
                self.aggregate(),
                format!("{operation} requires a key"),
            ));
        }
        Ok(self
            .keys
            .iter()
            .map(|k| format!("{} = @{}", self.qualified(k), k.path()))
            .collect::<Vec<_>>()
            .join(" AND "))
    }

    /// `(<c1>, <c2>)` and `(@c1, @c2)` for an insert.
    pub(crate) fn insert_lists(&self, columns: &[&FlatProperty]) -> (String, String) {
        let names = columns
            .iter()
            .map(|c| self.quote(c.path()))
            .collect::<Vec<_>>()
            .join(", ");
        let params = columns
            .iter()
            .map(|c| format!("@{}", c.path()))
            .collect::<Vec<_>>()
            .join(", ");
        (names, params)
    }

    /// `<c1> = @c1, <c2> = @c2`
    pub(crate) fn set_list(&self, columns: &[&FlatProperty]) -> String {
        columns
            .iter()
            .map(|c| format!("{} = @{}", self.quote(c.path()), c.path()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn flatten(&self, type_id: TypeId, instance: &dyn Any) -> OrmResult<FlatRow> {
        if type_id != self.metadata.aggregate_type_id() {
            return Err(OrmError::mapping(
                self.aggregate(),
                "instance is not of the generator's aggregate type",
            ));
        }
        self.mapper.flatten_shape(self.metadata.shape(), instance)
    }

    /// Whether every column of a default-constrained or identity property
    /// still holds the property type's default.
    fn is_at_default(&self, row: &FlatRow, property: &str) -> bool {
        self.property_defaults.get(property).is_some_and(|defaults| {
            defaults
                .iter()
                .all(|(path, default)| row.get(path) == Some(default))
        })
    }

    fn is_default_at_default(&self, row: &FlatRow, column: &FlatProperty) -> bool {
        self.metadata.is_default(column.top()) && self.is_at_default(row, column.top())
    }

    /// Whether any identity property holds a non-default value.
    pub(crate) fn has_identity_value(&self, row: &FlatRow) -> bool {
        self.metadata
            .identities()
            .iter()
            .any(|name| !self.is_at_default(row, name))
    }

    /// The single identity column, failing when more than one is declared.
    pub(crate) fn identity(&self) -> OrmResult<Option<&FlatProperty>> {
        match self.identities.as_slice() {
            [] => Ok(None),
            [identity] => Ok(Some(identity)),
            _ => Err(OrmError::configuration(
                self.aggregate(),
                "more than one identity column is not supported",
            )),
        }
    }

    /// Columns written by an insert.
    pub(crate) fn insert_columns(&self, row: &FlatRow) -> OrmResult<Vec<&FlatProperty>> {
        self.identity()?;
        Ok(self
            .columns
            .iter()
            .filter(|c| !self.metadata.is_identity(c.top()))
            .filter(|c| c.is_settable())
            .filter(|c| !self.is_default_at_default(row, c))
            .collect())
    }

    /// Columns written by an update's `SET`.
    pub(crate) fn update_columns(&self, row: &FlatRow) -> Vec<&FlatProperty> {
        self.columns
            .iter()
            .filter(|c| c.is_settable())
            .filter(|c| !self.metadata.is_key(c.top()) && !self.metadata.is_identity(c.top()))
            .filter(|c| !self.is_default_at_default(row, c))
            .collect()
    }

    /// Columns inserted by a native upsert: the insert columns plus every key.
    pub(crate) fn upsert_columns(&self, row: &FlatRow) -> Vec<&FlatProperty> {
        self.columns
            .iter()
            .filter(|c| {
                self.metadata.is_key(c.top())
                    || (c.is_settable() && !self.is_default_at_default(row, c))
            })
            .collect()
    }
}

/// Dialect-specific statement rendering over a [`GeneratorCore`].
pub(crate) trait RenderSql {
    fn core(&self) -> &GeneratorCore;

    fn render_get_all(&self) -> String {
        format!("{};", self.core().select())
    }

    fn render_get(&self, keys: &str) -> String {
        format!("{} WHERE {keys};", self.core().select())
    }

    fn render_delete(&self, keys: &str) -> String;

    fn render_insert(&self, columns: &[&FlatProperty]) -> OrmResult<String>;

    fn render_update(&self, set: &[&FlatProperty], keys: &str) -> String;

    /// Native upsert keyed on the full key; `set` is never empty.
    fn render_upsert(
        &self,
        columns: &[&FlatProperty],
        set: &[&FlatProperty],
        keys: &str,
    ) -> OrmResult<String>;
}

pub(crate) fn get_sql(renderer: &impl RenderSql) -> OrmResult<String> {
    let keys = renderer.core().where_keys("get")?;
    Ok(renderer.render_get(&keys))
}

pub(crate) fn delete_sql(renderer: &impl RenderSql) -> OrmResult<String> {
    let keys = renderer.core().where_keys("delete")?;
    Ok(renderer.render_delete(&keys))
}

pub(crate) fn insert_sql(renderer: &impl RenderSql, row: &FlatRow) -> OrmResult<String> {
    let columns = renderer.core().insert_columns(row)?;
    renderer.render_insert(&columns)
}

pub(crate) fn update_sql(renderer: &impl RenderSql, row: &FlatRow) -> OrmResult<String> {
    let core = renderer.core();
    let keys = core.where_keys("update")?;
    let set = core.update_columns(row);
    if set.is_empty() {
        return Err(OrmError::unsupported(
            core.aggregate(),
            "update not supported on tables with no updatable columns",
        ));
    }
    Ok(renderer.render_update(&set, &keys))
}

pub(crate) fn upsert_sql(renderer: &impl RenderSql, row: &FlatRow) -> OrmResult<String> {
    let core = renderer.core();
    if !core.metadata().identities().is_empty() {
        return if core.has_identity_value(row) {
            update_sql(renderer, row)
        } else {
            insert_sql(renderer, row)
        };
    }

    let keys = core.where_keys("upsert")?;
    let set = core.update_columns(row);
    if set.is_empty() {
        return Err(OrmError::unsupported(
            core.aggregate(),
            "upsert not supported on tables with no updatable columns",
        ));
    }
    let columns = core.upsert_columns(row);
    renderer.render_upsert(&columns, &set, &keys)
}

/// Implement [`QueryGenerator`] for a [`RenderSql`] type with a `core` field.
macro_rules! impl_query_generator {
    ($ty:ty) => {
        impl<T: $crate::shape::Mapped> $crate::query::QueryGenerator<T> for $ty {
            fn dialect(&self) -> $crate::query::Dialect {
                self.core.dialect()
            }

            fn generate_get_all_query(&self) -> $crate::error::OrmResult<String> {
                Ok($crate::query::RenderSql::render_get_all(self))
            }

            fn generate_get_query(&self) -> $crate::error::OrmResult<String> {
                $crate::query::get_sql(self)
            }

            fn generate_delete_query(&self) -> $crate::error::OrmResult<String> {
                $crate::query::delete_sql(self)
            }

            fn generate_insert_query(&self, instance: &T) -> $crate::error::OrmResult<String> {
                let row = self.core.flatten(::std::any::TypeId::of::<T>(), instance)?;
                $crate::query::insert_sql(self, &row)
            }

            fn generate_update_query(&self, instance: &T) -> $crate::error::OrmResult<String> {
                let row = self.core.flatten(::std::any::TypeId::of::<T>(), instance)?;
                $crate::query::update_sql(self, &row)
            }

            fn generate_upsert_query(&self, instance: &T) -> $crate::error::OrmResult<String> {
                let row = self.core.flatten(::std::any::TypeId::of::<T>(), instance)?;
                $crate::query::upsert_sql(self, &row)
            }

            fn generate_property_list(&self, qualifier: Option<&str>) -> String {
                self.core.property_list(qualifier)
            }
        }
    };
}

pub(crate) use impl_query_generator;
