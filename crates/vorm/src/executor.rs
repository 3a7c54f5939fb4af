//! Statement execution boundary.
//!
//! The mapper and generators never touch a database. An [`Executor`] takes
//! the generated SQL with its `@name` parameters bound from a [`FlatRow`],
//! and returns flat rows or an affected-row count. The PostgreSQL adapter
//! lives in [`crate::postgres`]; tests use in-memory fakes.

use crate::error::{OrmError, OrmResult};
use crate::row::FlatRow;
use crate::value::Scalar;

/// Runs SQL text against a database.
pub trait Executor: Send + Sync {
    /// Execute `sql` and return the rows of its first row-returning statement.
    ///
    /// `sql` may be a batch (e.g. `INSERT ...; SELECT ...;`). Every `@name`
    /// placeholder is bound from the column of the same name in `params`.
    fn query(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<Vec<FlatRow>>> + Send;

    /// Execute `sql` and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Semantics:
    /// - 0 rows: returns [`OrmError::NotFound`]
    /// - 1 or more rows: returns the first row
    fn query_one(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<FlatRow>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<Option<FlatRow>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Execute a query and decode the first column of the first row.
    fn query_scalar<T: Scalar + Send>(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<T>> + Send {
        async move {
            let row = self.query_one(sql, params).await?;
            let (column, value) = row
                .iter()
                .next()
                .ok_or_else(|| OrmError::decode("0", "row has no columns"))?;
            T::from_value(value.clone()).map_err(|message| OrmError::decode(column, message))
        }
    }
}

impl<E: Executor> Executor for &E {
    fn query(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<Vec<FlatRow>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &FlatRow,
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    struct Canned(Vec<FlatRow>);

    impl Executor for Canned {
        async fn query(&self, _sql: &str, _params: &FlatRow) -> OrmResult<Vec<FlatRow>> {
            Ok(self.0.clone())
        }

        async fn execute(&self, _sql: &str, _params: &FlatRow) -> OrmResult<u64> {
            Ok(self.0.len() as u64)
        }
    }

    #[tokio::test]
    async fn query_one_requires_a_row() {
        let empty = Canned(Vec::new());
        let err = empty.query_one("SELECT 1", &FlatRow::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(empty.query_opt("SELECT 1", &FlatRow::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_scalar_decodes_first_column() {
        let rows = Canned(vec![
            FlatRow::from_pairs([("count", Value::I64(3)), ("other", Value::Null)]),
            FlatRow::from_pairs([("count", Value::I64(9))]),
        ]);
        let count: i64 = rows.query_scalar("SELECT count(*)", &FlatRow::new()).await.unwrap();
        assert_eq!(count, 3);

        let err = rows
            .query_scalar::<String>("SELECT count(*)", &FlatRow::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'count'"));
    }

    #[tokio::test]
    async fn references_execute_through() {
        let rows = Canned(vec![FlatRow::new()]);
        let by_ref = &rows;
        assert_eq!(by_ref.execute("DELETE", &FlatRow::new()).await.unwrap(), 1);
    }
}
