//! [`Executor`] over `tokio-postgres`.
//!
//! Generated SQL uses `@name` placeholders; PostgreSQL expects `$n`. The
//! adapter rewrites each statement, binding `$n` to the `@name` column of the
//! parameter [`FlatRow`]. Repeated names reuse the same index, and text inside
//! quotes or comments is left untouched.
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
//! tokio::spawn(connection);
//! let users = Repository::<User, _>::new(mapper, metadata, PgExecutor::new(client))?;
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use bytes::BytesMut;
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{GenericClient, Row};

use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::row::{Columns, FlatRow};
use crate::value::Value;

/// A statement with `@name` placeholders rewritten to `$n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSql {
    /// SQL text with positional placeholders.
    pub sql: String,
    /// Parameter names; `$1` binds `names[0]`.
    pub names: Vec<String>,
}

impl PreparedSql {
    /// Rewrite one statement.
    pub fn rewrite(sql: &str) -> Self {
        let mut out = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut chars = sql.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            match c {
                '\'' | '"' => {
                    out.push(c);
                    // Copy through the closing quote; doubled quotes stay inside.
                    while let Some((_, q)) = chars.next() {
                        out.push(q);
                        if q == c {
                            if chars.peek().map(|&(_, n)| n) == Some(c) {
                                out.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                '-' if chars.peek().map(|&(_, n)| n) == Some('-') => {
                    out.push(c);
                    for (_, n) in chars.by_ref() {
                        out.push(n);
                        if n == '\n' {
                            break;
                        }
                    }
                }
                // `@@name` is a system variable, not a parameter.
                '@' if chars.peek().map(|&(_, n)| n) == Some('@') => {
                    out.push_str("@@");
                    chars.next();
                    while let Some(&(_, n)) = chars.peek() {
                        if n == '_' || n.is_ascii_alphanumeric() {
                            out.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                '@' if chars
                    .peek()
                    .is_some_and(|&(_, n)| n == '_' || n.is_ascii_alphabetic()) =>
                {
                    let mut name = String::new();
                    while let Some(&(_, n)) = chars.peek() {
                        if n == '_' || n == '$' || n.is_ascii_alphanumeric() {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let position = match index.get(&name) {
                        Some(&i) => i,
                        None => {
                            names.push(name.clone());
                            index.insert(name, names.len());
                            names.len()
                        }
                    };
                    out.push('$');
                    out.push_str(&position.to_string());
                }
                _ => out.push(c),
            }
        }

        Self { sql: out, names }
    }

    /// Values bound to `$1..$n`, in order.
    pub fn bind<'a>(&self, params: &'a FlatRow) -> OrmResult<Vec<&'a Value>> {
        self.names
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .ok_or_else(|| OrmError::Executor(format!("missing parameter '@{name}'")))
            })
            .collect()
    }
}

/// Split a batch on `;` outside quotes and comments. Empty statements are dropped.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut comment = false;
    let mut prev = '\0';

    for (i, c) in sql.char_indices() {
        if comment {
            comment = c != '\n';
        } else if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(c),
                '-' if prev == '-' => comment = true,
                ';' => {
                    statements.push(&sql[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        prev = c;
    }
    statements.push(&sql[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        if let Some(n) = self.as_integer() {
            return integer_to_sql(n, ty, out);
        }
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::F32(v) if *ty == Type::FLOAT8 => f64::from(*v).to_sql(ty, out),
            Value::F32(v) => v.to_sql(ty, out),
            Value::F64(v) if *ty == Type::FLOAT4 => (*v as f32).to_sql(ty, out),
            Value::F64(v) => v.to_sql(ty, out),
            Value::String(v) if *ty == Type::UUID => uuid::Uuid::parse_str(v)?.to_sql(ty, out),
            Value::String(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::DateTime(v) => v.to_sql(ty, out),
            Value::DateTimeUtc(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            other => Err(format!("cannot bind {} as {ty}", other.kind_name()).into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Encode an integer for the target column type, narrowing or widening as needed.
fn integer_to_sql(
    n: i128,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::CHAR => i8::try_from(n)?.to_sql(ty, out),
        Type::INT2 => i16::try_from(n)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(n)?.to_sql(ty, out),
        Type::OID => u32::try_from(n)?.to_sql(ty, out),
        Type::FLOAT4 => (n as f32).to_sql(ty, out),
        Type::FLOAT8 => (n as f64).to_sql(ty, out),
        Type::BOOL => (n != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR => n.to_string().to_sql(ty, out),
        _ => i64::try_from(n)?.to_sql(ty, out),
    }
}

fn decode_column(row: &Row, i: usize, name: &str) -> OrmResult<Value> {
    macro_rules! get {
        ($ty:ty, $variant:ident) => {
            row.try_get::<_, Option<$ty>>(i)
                .map(|v| v.map(Value::$variant).unwrap_or(Value::Null))
                .map_err(|e| OrmError::decode(name, e.to_string()))
        };
    }

    let ty = row.columns()[i].type_();
    match *ty {
        Type::BOOL => get!(bool, Bool),
        Type::CHAR => get!(i8, I8),
        Type::INT2 => get!(i16, I16),
        Type::INT4 => get!(i32, I32),
        Type::INT8 => get!(i64, I64),
        Type::OID => get!(u32, U32),
        Type::FLOAT4 => get!(f32, F32),
        Type::FLOAT8 => get!(f64, F64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get!(String, String)
        }
        Type::BYTEA => get!(Vec<u8>, Bytes),
        Type::UUID => get!(uuid::Uuid, Uuid),
        Type::DATE => get!(chrono::NaiveDate, Date),
        Type::TIME => get!(chrono::NaiveTime, Time),
        Type::TIMESTAMP => get!(chrono::NaiveDateTime, DateTime),
        Type::TIMESTAMPTZ => get!(chrono::DateTime<chrono::Utc>, DateTimeUtc),
        Type::JSON | Type::JSONB => get!(serde_json::Value, Json),
        _ => Err(OrmError::decode(name, format!("unsupported column type {ty}"))),
    }
}

fn decode_rows(rows: &[Row]) -> OrmResult<Vec<FlatRow>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = Arc::new(Columns::from_names(first.columns().iter().map(|c| c.name())));
    rows.iter()
        .map(|row| {
            let mut flat = FlatRow::with_columns(columns.clone());
            for (i, column) in row.columns().iter().enumerate() {
                flat.set_at(i, decode_column(row, i, column.name())?);
            }
            Ok(flat)
        })
        .collect()
}

/// [`Executor`] backed by any `tokio_postgres` client or transaction.
#[derive(Debug)]
pub struct PgExecutor<C> {
    client: C,
}

impl<C> PgExecutor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: GenericClient + Send + Sync> Executor for PgExecutor<C> {
    async fn query(&self, sql: &str, params: &FlatRow) -> OrmResult<Vec<FlatRow>> {
        let mut result: Option<Vec<FlatRow>> = None;
        for statement in split_statements(sql) {
            let prepared = PreparedSql::rewrite(statement);
            let values = prepared.bind(params)?;
            let args: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();

            let stmt = self.client.prepare(&prepared.sql).await?;
            if result.is_none() && !stmt.columns().is_empty() {
                let rows = self.client.query(&stmt, &args).await?;
                result = Some(decode_rows(&rows)?);
            } else {
                self.client.execute(&stmt, &args).await?;
            }
        }
        Ok(result.unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &FlatRow) -> OrmResult<u64> {
        let mut affected = 0;
        for statement in split_statements(sql) {
            let prepared = PreparedSql::rewrite(statement);
            let values = prepared.bind(params)?;
            let args: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
            affected += self.client.execute(prepared.sql.as_str(), &args).await?;
        }
        Ok(affected)
    }
}
