//! T-SQL generation.
//!
//! Generated values come back through `OUTPUT inserted.*` / `deleted.*`.
//! `OUTPUT` without `INTO` is rejected on tables with triggers, so for those
//! the statements are followed (or, for delete, preceded) by a `SELECT`.
//! T-SQL has no generic native upsert; aggregates without an identity cannot
//! be upserted.

use std::sync::Arc;

use super::{Dialect, GeneratorCore, RenderSql, impl_query_generator};
use crate::error::{OrmError, OrmResult};
use crate::mapper::{FlatProperty, StructuralMapper};
use crate::metadata::AggregateMetadata;

pub struct SqlServerQueryGenerator {
    core: GeneratorCore,
}

impl SqlServerQueryGenerator {
    pub fn new(
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
    ) -> OrmResult<Self> {
        Ok(Self {
            core: GeneratorCore::new(Dialect::SqlServer, mapper, metadata)?,
        })
    }

    fn triggers(&self) -> bool {
        self.core.metadata().has_triggers()
    }
}

impl RenderSql for SqlServerQueryGenerator {
    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn render_delete(&self, keys: &str) -> String {
        let core = &self.core;
        if self.triggers() {
            return format!(
                "{} WHERE {keys}; DELETE FROM {} WHERE {keys};",
                core.select(),
                core.table()
            );
        }
        format!(
            "DELETE FROM {} OUTPUT {} WHERE {keys};",
            core.table(),
            core.prefixed_list("deleted")
        )
    }

    fn render_insert(&self, columns: &[&FlatProperty]) -> OrmResult<String> {
        let core = &self.core;
        let (names, params) = core.insert_lists(columns);

        if !self.triggers() {
            let output = core.prefixed_list("inserted");
            return Ok(if columns.is_empty() {
                format!("INSERT INTO {} OUTPUT {output} DEFAULT VALUES;", core.table())
            } else {
                format!(
                    "INSERT INTO {} ({names}) OUTPUT {output} VALUES ({params});",
                    core.table()
                )
            });
        }

        let insert = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", core.table())
        } else {
            format!("INSERT INTO {} ({names}) VALUES ({params});", core.table())
        };
        if let Some(identity) = core.identity()? {
            return Ok(format!(
                "{insert} {} WHERE {} = SCOPE_IDENTITY();",
                core.select(),
                core.qualified(identity)
            ));
        }
        if core.keys().is_empty() {
            return Ok(insert);
        }
        let keys = core.where_keys("insert")?;
        Ok(format!("{insert} {} WHERE {keys};", core.select()))
    }

    fn render_update(&self, set: &[&FlatProperty], keys: &str) -> String {
        let core = &self.core;
        let set = core.set_list(set);
        if self.triggers() {
            return format!(
                "UPDATE {} SET {set} WHERE {keys}; {} WHERE {keys};",
                core.table(),
                core.select()
            );
        }
        format!(
            "UPDATE {} SET {set} OUTPUT {} WHERE {keys};",
            core.table(),
            core.prefixed_list("inserted")
        )
    }

    fn render_upsert(
        &self,
        _columns: &[&FlatProperty],
        _set: &[&FlatProperty],
        _keys: &str,
    ) -> OrmResult<String> {
        Err(OrmError::unsupported(
            self.core.metadata().type_name(),
            "T-SQL upsert requires an identity column",
        ))
    }
}

impl_query_generator!(SqlServerQueryGenerator);
