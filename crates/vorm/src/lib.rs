//! # vorm
//!
//! Value-object relational mapping with dialect SQL generation.
//!
//! ## Features
//!
//! - **Describe once**: an aggregate's structure comes from `#[derive(Structure)]`,
//!   its table configuration from `#[derive(Aggregate)]`
//! - **Value objects**: nested composites flatten to `outer_inner` columns and
//!   are rebuilt from flat rows
//! - **Type converters**: opaque wrappers (strongly-typed ids) are stored as
//!   a single scalar column
//! - **Static SQL per dialect**: SQL Server, PostgreSQL and MySQL text for
//!   Get, GetAll, Insert, Update, Delete and Upsert
//! - **Executor boundary**: the library never owns a connection; a
//!   `tokio-postgres` adapter ships behind the `postgres` feature
//!
//! ## Example
//!
//! ```ignore
//! use vorm::prelude::*;
//!
//! #[derive(Debug, Default, Structure)]
//! struct Address {
//!     street: String,
//!     city: String,
//! }
//!
//! #[derive(Debug, Default, Structure, Aggregate)]
//! #[orm(entity = "Users", schema = "dbo")]
//! struct User {
//!     #[orm(key, identity)]
//!     id: i64,
//!     name: String,
//!     address: Address,
//! }
//!
//! let mapper = Arc::new(StructuralMapper::default());
//! let metadata = Arc::new(User::metadata(&mapper)?);
//! let generator = generator_for::<User>(mapper.clone(), metadata)?;
//!
//! // INSERT INTO [dbo].[Users] ([name], [address_street], [address_city]) OUTPUT ...
//! let sql = generator.generate_insert_query(&user)?;
//! let params = mapper.flatten(&user)?;
//! ```

// Lets derive output (`::vorm::...`) resolve inside this crate's own tests.
extern crate self as vorm;

pub mod config;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod ident;
pub mod mapper;
pub mod metadata;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod row;
pub mod shape;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(test)]
mod fixtures;

pub use config::Defaults;
pub use converter::{TypeConverter, TypeConverterRegistry};
pub use descriptor::{PropertyDescriptor, PropertySet};
pub use error::{OrmError, OrmResult};
pub use executor::Executor;
pub use mapper::{FlatLayout, FlatProperty, StructuralMapper, VALUE_COLUMN};
pub use metadata::{Aggregate, AggregateMetadata, MetadataBuilder};
pub use query::{
    Dialect, MySqlQueryGenerator, PostgresQueryGenerator, QueryGenerator,
    SqlServerQueryGenerator, generator_for,
};
pub use repository::Repository;
pub use row::{Columns, FlatRow};
pub use shape::{Mapped, ShapeKind, Structure, TypeShape};
pub use value::{ColumnType, Scalar, ScalarKind, Value};

#[cfg(feature = "postgres")]
pub use postgres::PgExecutor;

#[cfg(feature = "derive")]
pub use vorm_derive::{Aggregate, Opaque, ScalarEnum, Structure};
