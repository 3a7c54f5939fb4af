//! PostgreSQL generation. Generated values come back through `RETURNING`;
//! native upserts use `ON CONFLICT (<key>) DO UPDATE`.

use std::sync::Arc;

use super::{Dialect, GeneratorCore, RenderSql, impl_query_generator};
use crate::error::OrmResult;
use crate::mapper::{FlatProperty, StructuralMapper};
use crate::metadata::AggregateMetadata;

pub struct PostgresQueryGenerator {
    core: GeneratorCore,
}

impl PostgresQueryGenerator {
    pub fn new(
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
    ) -> OrmResult<Self> {
        Ok(Self {
            core: GeneratorCore::new(Dialect::PostgreSql, mapper, metadata)?,
        })
    }

    fn insert_head(&self, columns: &[&FlatProperty]) -> String {
        let core = &self.core;
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", core.table());
        }
        let (names, params) = core.insert_lists(columns);
        format!("INSERT INTO {} ({names}) VALUES ({params})", core.table())
    }
}

impl RenderSql for PostgresQueryGenerator {
    fn core(&self) -> &GeneratorCore {
        &self.core
    }

    fn render_delete(&self, keys: &str) -> String {
        format!(
            "DELETE FROM {} WHERE {keys} RETURNING {};",
            self.core.table(),
            self.core.plain_list()
        )
    }

    fn render_insert(&self, columns: &[&FlatProperty]) -> OrmResult<String> {
        Ok(format!(
            "{} RETURNING {};",
            self.insert_head(columns),
            self.core.plain_list()
        ))
    }

    fn render_update(&self, set: &[&FlatProperty], keys: &str) -> String {
        format!(
            "UPDATE {} SET {} WHERE {keys} RETURNING {};",
            self.core.table(),
            self.core.set_list(set),
            self.core.plain_list()
        )
    }

    fn render_upsert(
        &self,
        columns: &[&FlatProperty],
        set: &[&FlatProperty],
        _keys: &str,
    ) -> OrmResult<String> {
        let core = &self.core;
        let conflict = core
            .keys()
            .iter()
            .map(|k| core.quote(k.path()))
            .collect::<Vec<_>>()
            .join(", ");
        let update = set
            .iter()
            .map(|c| {
                let column = core.quote(c.path());
                format!("{column} = EXCLUDED.{column}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "{} ON CONFLICT ({conflict}) DO UPDATE SET {update} RETURNING {};",
            self.insert_head(columns),
            core.plain_list()
        ))
    }
}

impl_query_generator!(PostgresQueryGenerator);
