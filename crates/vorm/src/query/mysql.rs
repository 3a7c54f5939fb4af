//! MySQL generation.
//!
//! MySQL has no `RETURNING`, so every mutating statement is batched with a
//! `SELECT` reading the affected row back: by `LAST_INSERT_ID()` after an
//! identity insert, by key otherwise. The delete batch reads the row before
//! deleting it; nothing guards against a concurrent change in between.

use std::sync::Arc;

use super::{Dialect, GeneratorCore, RenderSql, impl_query_generator};
use crate::error::OrmResult;
use crate::mapper::{FlatProperty, StructuralMapper};
use crate::metadata::AggregateMetadata;

pub struct MySqlQueryGenerator {
    core: GeneratorCore,
}

impl MySqlQueryGenerator {
    pub fn new(
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
    ) -> OrmResult<Self> {
        Ok(Self {
            core: GeneratorCore::new(Dialect::MySql, mapper, metadata)?,
        })
    }

    fn insert_head(&self, columns: &[&FlatProperty]) -> String {
        let (names, params) = self.core.insert_lists(columns);
        format!("INSERT INTO {} ({names}) VALUES ({params})", self.core.table())
    }
}

impl RenderSql for MySqlQueryGenerator {
    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn render_delete(&self, keys: &str) -> String {
        format!(
            "{} WHERE {keys}; DELETE FROM {} WHERE {keys};",
            self.core.select(),
            self.core.table()
        )
    }

    fn render_insert(&self, columns: &[&FlatProperty]) -> OrmResult<String> {
        let core = &self.core;
        let insert = format!("{};", self.insert_head(columns));
        if let Some(identity) = core.identity()? {
            return Ok(format!(
                "{insert} {} WHERE {} = LAST_INSERT_ID();",
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
        format!(
            "UPDATE {} SET {} WHERE {keys}; {} WHERE {keys};",
            self.core.table(),
            self.core.set_list(set),
            self.core.select()
        )
    }

    fn render_upsert(
        &self,
        columns: &[&FlatProperty],
        set: &[&FlatProperty],
        keys: &str,
    ) -> OrmResult<String> {
        let core = &self.core;
        let update = set
            .iter()
            .map(|c| {
                let column = core.quote(c.path());
                format!("{column} = VALUES({column})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} ON DUPLICATE KEY UPDATE {update}; {} WHERE {keys};",
            self.insert_head(columns),
            core.select()
        ))
    }
}

impl_query_generator!(MySqlQueryGenerator);
