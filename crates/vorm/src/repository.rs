//! Typed CRUD over a generator, the structural mapper and an executor.
//!
//! # Example
//!
//! ```ignore
//! let mapper = Arc::new(StructuralMapper::new(converters));
//! let mut metadata = User::metadata(&mapper)?;
//! metadata.apply_defaults(&Defaults::from_env()?);
//! let users = Repository::<User, _>::new(mapper, Arc::new(metadata), PgExecutor::new(client))?;
//!
//! let created = users.insert(&User { name: "Ada".into(), ..Default::default() }).await?;
//! let found = users.get(&created.id).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::mapper::StructuralMapper;
use crate::metadata::AggregateMetadata;
use crate::query::{QueryGenerator, generator_for};
use crate::row::FlatRow;
use crate::shape::Mapped;

const DEFAULT_MAX_SQL_LENGTH: usize = 200;

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Persistence for one aggregate type.
pub struct Repository<T, E> {
    mapper: Arc<StructuralMapper>,
    metadata: Arc<AggregateMetadata>,
    generator: Box<dyn QueryGenerator<T>>,
    executor: E,
    max_sql_length: Option<usize>,
}

impl<T, E> fmt::Debug for Repository<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("aggregate", &self.metadata.type_name())
            .field("dialect", &self.generator.dialect())
            .finish_non_exhaustive()
    }
}

impl<T: Mapped, E: Executor> Repository<T, E> {
    /// Build a repository using the generator for the metadata's dialect.
    ///
    /// Fails with a configuration error when no dialect is configured.
    pub fn new(
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
        executor: E,
    ) -> OrmResult<Self> {
        let generator = generator_for::<T>(mapper.clone(), metadata.clone())?;
        Ok(Self::with_generator(mapper, metadata, generator, executor))
    }

    /// Build a repository around an explicit generator.
    pub fn with_generator(
        mapper: Arc<StructuralMapper>,
        metadata: Arc<AggregateMetadata>,
        generator: Box<dyn QueryGenerator<T>>,
        executor: E,
    ) -> Self {
        Self {
            mapper,
            metadata,
            generator,
            executor,
            max_sql_length: Some(DEFAULT_MAX_SQL_LENGTH),
        }
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log full SQL text.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn metadata(&self) -> &AggregateMetadata {
        &self.metadata
    }

    pub fn mapper(&self) -> &StructuralMapper {
        &self.mapper
    }

    pub fn generator(&self) -> &dyn QueryGenerator<T> {
        self.generator.as_ref()
    }

    fn log(&self, operation: &'static str, sql: &str, params: &FlatRow) {
        let sql = match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        };
        tracing::debug!(
            target: "vorm.sql",
            aggregate = self.metadata.type_name(),
            operation,
            param_count = params.len(),
            sql = %sql,
        );
    }

    fn decode_rows(&self, rows: Vec<FlatRow>) -> OrmResult<Vec<T>> {
        rows.iter().map(|row| self.mapper.unflatten(row)).collect()
    }

    async fn fetch_opt(
        &self,
        operation: &'static str,
        sql: &str,
        params: &FlatRow,
    ) -> OrmResult<Option<T>> {
        self.log(operation, sql, params);
        match self.executor.query_opt(sql, params).await? {
            Some(row) => self.mapper.unflatten(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_one(
        &self,
        operation: &'static str,
        sql: &str,
        params: &FlatRow,
    ) -> OrmResult<T> {
        self.fetch_opt(operation, sql, params).await?.ok_or_else(|| {
            OrmError::not_found(format!(
                "{operation} on {} returned no row",
                self.metadata.type_name()
            ))
        })
    }

    /// Fetch one aggregate by id. `id` is the key value, a key struct, or
    /// an aggregate instance carrying the key.
    pub async fn get<I: Mapped>(&self, id: &I) -> OrmResult<Option<T>> {
        let sql = self.generator.generate_get_query()?;
        let params = self.mapper.wrap_id(id, &self.metadata)?;
        self.fetch_opt("get", &sql, &params).await
    }

    pub async fn get_all(&self) -> OrmResult<Vec<T>> {
        let sql = self.generator.generate_get_all_query()?;
        let params = FlatRow::new();
        self.log("get_all", &sql, &params);
        let rows = self.executor.query(&sql, &params).await?;
        self.decode_rows(rows)
    }

    /// Insert and return the stored aggregate, including generated values.
    pub async fn insert(&self, instance: &T) -> OrmResult<T> {
        let sql = self.generator.generate_insert_query(instance)?;
        let params = self.mapper.flatten(instance)?;
        self.fetch_one("insert", &sql, &params).await
    }

    /// Update by key and return the stored aggregate.
    pub async fn update(&self, instance: &T) -> OrmResult<T> {
        let sql = self.generator.generate_update_query(instance)?;
        let params = self.mapper.flatten(instance)?;
        self.fetch_one("update", &sql, &params).await
    }

    /// Delete by id, returning the deleted aggregate if it existed.
    pub async fn delete<I: Mapped>(&self, id: &I) -> OrmResult<Option<T>> {
        let sql = self.generator.generate_delete_query()?;
        let params = self.mapper.wrap_id(id, &self.metadata)?;
        self.fetch_opt("delete", &sql, &params).await
    }

    pub async fn upsert(&self, instance: &T) -> OrmResult<T> {
        let sql = self.generator.generate_upsert_query(instance)?;
        let params = self.mapper.flatten(instance)?;
        self.fetch_one("upsert", &sql, &params).await
    }

    /// Run hand-written SQL and map every returned row to `T`.
    pub async fn query(&self, sql: &str, params: &FlatRow) -> OrmResult<Vec<T>> {
        self.log("query", sql, params);
        let rows = self.executor.query(sql, params).await?;
        self.decode_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 6), "SELECT");
        assert_eq!(truncate_sql_bytes("åäö", 3), "å");
    }
}
