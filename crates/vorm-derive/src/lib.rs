//! Derive macros for vorm
//!
//! Provides `#[derive(Structure)]`, `#[derive(Aggregate)]`, `#[derive(Opaque)]`
//! and `#[derive(ScalarEnum)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod aggregate;
mod attrs;
mod opaque;
mod scalar_enum;
mod sql_ident;
mod structure;

/// Derive `Mapped` and `Structure` for a struct with named fields.
///
/// Every field becomes a property, in declaration order. Field types must
/// implement `Mapped` (scalars, `Option<T>`, other structures, opaque types).
///
/// # Example
///
/// ```ignore
/// use vorm::Structure;
///
/// #[derive(Debug, Default, Structure)]
/// struct Address {
///     street: String,
///     #[orm(column = "Town")]
///     city: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(rename_all = "PascalCase")]` - Case rule for property names
/// - `#[orm(column = "name")]` - Explicit property name
/// - `#[orm(read_only)]` - Selected and returned, never written
/// - `#[orm(skip)]` - Not a property at all (must be `Default`)
#[proc_macro_derive(Structure, attributes(orm))]
pub fn derive_structure(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    structure::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Aggregate` metadata configuration.
///
/// # Example
///
/// ```ignore
/// use vorm::{Aggregate, Structure};
///
/// #[derive(Debug, Default, Structure, Aggregate)]
/// #[orm(entity = "Users", schema = "dbo")]
/// struct User {
///     #[orm(key, identity)]
///     id: i64,
///     name: String,
///     #[orm(default)]
///     created_at: Option<chrono::NaiveDateTime>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(entity = "name")]` - Table name (defaults to the type name)
/// - `#[orm(schema = "name")]` - Schema (forbidden for MySQL)
/// - `#[orm(dialect = "postgres")]` - SQL dialect
/// - `#[orm(triggers)]` - Table has triggers
/// - `#[orm(key)]` / `#[orm(id)]` - Key property; several form a composite key
/// - `#[orm(identity)]` - Database-assigned
/// - `#[orm(default)]` - Database default, skipped while at the type default
/// - `#[orm(ignore)]` - Not mapped to a column
#[proc_macro_derive(Aggregate, attributes(orm))]
pub fn derive_aggregate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    aggregate::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Mapped` for a type stored only through a registered type converter.
#[proc_macro_derive(Opaque)]
pub fn derive_opaque(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    opaque::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Scalar` and `Mapped` for a unit-only enum stored as text.
///
/// Variants are stored in snake_case unless `#[orm(rename_all = "...")]` or
/// a per-variant `#[orm(rename = "...")]` says otherwise.
#[proc_macro_derive(ScalarEnum, attributes(orm))]
pub fn derive_scalar_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    scalar_enum::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
