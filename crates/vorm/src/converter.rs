//! Bidirectional converters for opaque wrapper types.
//!
//! A converter lets a "complex" type (typically a strongly-typed id such as
//! `struct UserId(Uuid)`) be stored as a single scalar column. Registering a
//! converter also makes the type a leaf for classification, even when it has
//! properties of its own.
//!
//! # Example
//!
//! ```ignore
//! let mut converters = TypeConverterRegistry::new();
//! converters.register::<UserId, Uuid>(|id| id.0, UserId)?;
//! let mapper = StructuralMapper::new(converters);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::shape::{Mapped, short_type_name};
use crate::value::{ColumnType, Scalar, Value};

type ToSimple = dyn Fn(&dyn Any) -> OrmResult<Value> + Send + Sync;
type ToComplex = dyn Fn(Value) -> OrmResult<Box<dyn Any>> + Send + Sync;

/// A registered complex ↔ simple conversion.
pub struct TypeConverter {
    complex: &'static str,
    simple: ColumnType,
    to_simple: Arc<ToSimple>,
    to_complex: Arc<ToComplex>,
}

impl TypeConverter {
    /// Rust type name of the complex type.
    pub fn complex_type(&self) -> &'static str {
        self.complex
    }

    /// Column representation of the complex type. Always nullable.
    pub fn simple_type(&self) -> ColumnType {
        self.simple
    }

    /// Convert a borrowed complex value into its column value.
    pub fn convert_to_simple(&self, value: &dyn Any) -> OrmResult<Value> {
        (self.to_simple)(value)
    }

    /// Convert a column value back into a boxed complex value.
    pub fn convert_to_complex(&self, value: Value) -> OrmResult<Box<dyn Any>> {
        (self.to_complex)(value)
    }
}

impl fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverter")
            .field("complex", &self.complex)
            .field("simple", &self.simple)
            .finish()
    }
}

/// Converters keyed by the complex type.
///
/// Populated during configuration, then moved into a
/// [`StructuralMapper`](crate::StructuralMapper), after which it is read-only.
#[derive(Debug, Default, Clone)]
pub struct TypeConverterRegistry {
    converters: HashMap<TypeId, Arc<TypeConverter>>,
}

impl TypeConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter storing `C` as the scalar `S`.
    ///
    /// Registering the same complex type twice is a configuration error.
    pub fn register<C, S>(
        &mut self,
        to_simple: impl Fn(&C) -> S + Send + Sync + 'static,
        to_complex: impl Fn(S) -> C + Send + Sync + 'static,
    ) -> OrmResult<&mut Self>
    where
        C: Mapped,
        S: Scalar + 'static,
    {
        let complex = std::any::type_name::<C>();
        if self.converters.contains_key(&TypeId::of::<C>()) {
            return Err(OrmError::configuration(
                short_type_name(complex),
                "a type converter is already registered for this type",
            ));
        }

        let encode = move |value: &dyn Any| -> OrmResult<Value> {
            let complex_value = value.downcast_ref::<C>().ok_or_else(|| {
                OrmError::mapping(
                    short_type_name(complex),
                    "type converter received a value of another type",
                )
            })?;
            Ok(to_simple(complex_value).to_value())
        };
        let decode = move |value: Value| -> OrmResult<Box<dyn Any>> {
            let simple = S::from_value(value)
                .map_err(|message| OrmError::mapping(short_type_name(complex), message))?;
            Ok(Box::new(to_complex(simple)))
        };

        self.converters.insert(
            TypeId::of::<C>(),
            Arc::new(TypeConverter {
                complex,
                simple: ColumnType::new(S::KIND).nullable(),
                to_simple: Arc::new(encode),
                to_complex: Arc::new(decode),
            }),
        );
        Ok(self)
    }

    pub fn get(&self, type_id: TypeId) -> Option<&Arc<TypeConverter>> {
        self.converters.get(&type_id)
    }

    pub fn contains<C: Any>(&self) -> bool {
        self.converters.contains_key(&TypeId::of::<C>())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}
