//! Flat rows: ordered column name → [`Value`] bags.
//!
//! A [`FlatRow`] is both the parameter bag handed to an executor and the row
//! an executor hands back. Rows produced by the mapper share their column
//! index through an `Arc`, so flattening many instances of the same type
//! allocates the index once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::value::{Scalar, Value};

/// Ordered column names with a name → position index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from names; later duplicates are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = Self::new();
        for name in names {
            columns.push(name.into());
        }
        columns
    }

    /// Append a name, returning its position (existing position if already present).
    pub fn push(&mut self, name: String) -> usize {
        if let Some(&i) = self.index.get(&name) {
            return i;
        }
        let i = self.names.len();
        self.index.insert(name.clone(), i);
        self.names.push(name);
        i
    }

    /// Position of `name`, falling back to an ASCII case-insensitive match.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied().or_else(|| {
            self.names
                .iter()
                .position(|candidate| candidate.eq_ignore_ascii_case(name))
        })
    }

    pub fn name(&self, i: usize) -> Option<&str> {
        self.names.get(i).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// An ordered bag of named values.
#[derive(Clone, Default, PartialEq)]
pub struct FlatRow {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A row over a shared column index with every value `NULL`.
    pub fn with_columns(columns: Arc<Columns>) -> Self {
        let values = vec![Value::Null; columns.len()];
        Self { columns, values }
    }

    /// Build a row from `(name, value)` pairs, in order.
    ///
    /// ```ignore
    /// let params = FlatRow::from_pairs([("Id", Value::I64(1))]);
    /// ```
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut row = Self::new();
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    /// Set `name` to `value`, appending the column if it is new.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        let name = name.into();
        if let Some(&i) = self.columns.index.get(&name) {
            self.values[i] = value;
            return self;
        }
        let i = Arc::make_mut(&mut self.columns).push(name);
        debug_assert_eq!(i, self.values.len());
        self.values.push(value);
        self
    }

    /// Look up a value by exact name, then case-insensitively.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.position(name).map(|i| &self.values[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.position(name).is_some()
    }

    /// Remove and return a value, leaving `NULL` in its slot.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let i = self.columns.position(name)?;
        Some(std::mem::take(&mut self.values[i]))
    }

    /// Decode a column into a scalar, returning `OrmError::Decode` on failure.
    pub fn try_get<T: Scalar>(&self, name: &str) -> OrmResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| OrmError::decode(name, "column not present in row"))?;
        T::from_value(value.clone()).map_err(|message| OrmError::decode(name, message))
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position-indexed write, used by the mapper when filling a
    /// row over a precomputed layout.
    pub(crate) fn set_at(&mut self, i: usize, value: Value) {
        self.values[i] = value;
    }
}

impl fmt::Debug for FlatRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for FlatRow {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_overwrites() {
        let mut row = FlatRow::new();
        row.insert("b", Value::I32(1))
            .insert("a", Value::I32(2))
            .insert("b", Value::I32(3));

        let names: Vec<_> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&Value::I32(3)));
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive() {
        let row = FlatRow::from_pairs([("address_city", Value::String("Oslo".into()))]);
        assert_eq!(
            row.get("Address_City"),
            Some(&Value::String("Oslo".into()))
        );
        assert!(row.get("address").is_none());
    }

    #[test]
    fn shared_columns_copy_on_write() {
        let columns = Arc::new(Columns::from_names(["Id", "Name"]));
        let first = FlatRow::with_columns(columns.clone());
        let mut second = FlatRow::with_columns(columns.clone());
        assert!(Arc::ptr_eq(first.columns(), second.columns()));

        second.insert("Extra", Value::Bool(true));
        assert_eq!(columns.len(), 2);
        assert_eq!(second.columns().len(), 3);
        assert!(first.get("Extra").is_none());
    }

    #[test]
    fn try_get_reports_column() {
        let row = FlatRow::from_pairs([("Id", Value::String("x".into()))]);
        let err = row.try_get::<i64>("Id").unwrap_err();
        assert!(err.to_string().contains("'Id'"));
        let err = row.try_get::<i64>("Missing").unwrap_err();
        assert!(err.to_string().contains("not present"));
        assert_eq!(row.try_get::<String>("id").unwrap(), "x");
    }
}
