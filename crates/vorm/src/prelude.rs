//! Convenient imports for typical `vorm` usage.
//!
//! ```ignore
//! use vorm::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::{
    Aggregate, AggregateMetadata, Defaults, Dialect, Executor, FlatRow, Mapped, MetadataBuilder,
    OrmError, OrmResult, QueryGenerator, Repository, Scalar, Structure, StructuralMapper,
    TypeConverterRegistry, Value, generator_for,
};

#[cfg(feature = "postgres")]
pub use crate::PgExecutor;

#[cfg(feature = "derive")]
pub use crate::{Opaque, ScalarEnum};
