//! Type shapes: what the mapper knows about a property's declared type.
//!
//! Every type that can appear as a property implements [`Mapped`], which
//! returns a [`TypeShape`]. The shape tells the mapper whether the type is a
//! built-in scalar, a composite with its own properties, an optional wrapper
//! or an opaque type that only a registered converter can store.
//!
//! Shapes carry plain function pointers operating on `&dyn Any`, so the
//! mapper can walk arbitrarily nested aggregates without knowing their
//! concrete types.

use std::any::{Any, TypeId};
use std::fmt;

use crate::descriptor::PropertySet;
use crate::error::OrmResult;
use crate::value::{ColumnType, Scalar, Value};

/// A type the structural mapper can read, write and default-construct.
///
/// Implemented for built-in scalars and `Option<T>` here, and generated by
/// `#[derive(Structure)]`, `#[derive(Opaque)]` and `#[derive(ScalarEnum)]`.
pub trait Mapped: Default + Any + Send + Sync {
    fn shape() -> TypeShape;
}

/// A composite type with named properties.
///
/// Usually derived with `#[derive(Structure)]`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default, Structure)]
/// struct Address {
///     street: String,
///     city: String,
/// }
/// ```
pub trait Structure: Mapped {
    /// Build the ordered property set of this type.
    fn properties() -> OrmResult<PropertySet>;
}

/// Erased description of a type.
#[derive(Clone, Copy)]
pub struct TypeShape {
    id: TypeId,
    name: &'static str,
    kind: ShapeKind,
    default: fn() -> Box<dyn Any>,
}

/// How a type is stored.
#[derive(Clone, Copy)]
pub enum ShapeKind {
    /// Built-in leaf stored as one column.
    Scalar(ScalarCodec),
    /// Value object decomposed into its properties.
    Composite(CompositeCodec),
    /// `Option<T>`: leaf or composite depending on `T`.
    Optional(OptionalCodec),
    /// A type with no accessible properties; storable only through a
    /// registered converter.
    Opaque,
}

/// Conversions between a scalar and a [`Value`].
#[derive(Clone, Copy)]
pub struct ScalarCodec {
    pub column: ColumnType,
    encode: fn(&dyn Any) -> Option<Value>,
    decode: fn(Value) -> Result<Box<dyn Any>, String>,
}

impl ScalarCodec {
    /// Encode a value of the shaped type; `None` if `value` is another type.
    pub fn encode(&self, value: &dyn Any) -> Option<Value> {
        (self.encode)(value)
    }

    pub fn decode(&self, value: Value) -> Result<Box<dyn Any>, String> {
        (self.decode)(value)
    }
}

/// Access to a composite's properties.
#[derive(Clone, Copy)]
pub struct CompositeCodec {
    properties: fn() -> OrmResult<PropertySet>,
}

impl CompositeCodec {
    pub fn properties(&self) -> OrmResult<PropertySet> {
        (self.properties)()
    }
}

/// Access to the inner value of an `Option<T>`.
#[derive(Clone, Copy)]
pub struct OptionalCodec {
    inner: fn() -> TypeShape,
    project: for<'a> fn(&'a dyn Any) -> Option<&'a dyn Any>,
    wrap: fn(Box<dyn Any>) -> Option<Box<dyn Any>>,
}

impl OptionalCodec {
    /// Shape of `T`.
    pub fn inner(&self) -> TypeShape {
        (self.inner)()
    }

    /// Borrow the inner value, `None` when the option is empty.
    pub fn project<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.project)(value)
    }

    /// Wrap a boxed `T` into a boxed `Some(T)`.
    pub fn wrap(&self, inner: Box<dyn Any>) -> Option<Box<dyn Any>> {
        (self.wrap)(inner)
    }
}

impl TypeShape {
    /// Shape of a built-in scalar.
    pub fn scalar<T: Mapped + Scalar>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Scalar(ScalarCodec {
                column: ColumnType::new(T::KIND),
                encode: encode_scalar::<T>,
                decode: decode_scalar::<T>,
            }),
            default: default_boxed::<T>,
        }
    }

    /// Shape of a composite type.
    pub fn composite<T: Structure>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Composite(CompositeCodec {
                properties: T::properties,
            }),
            default: default_boxed::<T>,
        }
    }

    /// Shape of `Option<T>`.
    pub fn optional<T: Mapped>() -> Self {
        Self {
            id: TypeId::of::<Option<T>>(),
            name: std::any::type_name::<Option<T>>(),
            kind: ShapeKind::Optional(OptionalCodec {
                inner: T::shape,
                project: project_option::<T>,
                wrap: wrap_some::<T>,
            }),
            default: default_boxed::<Option<T>>,
        }
    }

    /// Shape of an opaque wrapper type.
    pub fn opaque<T: Mapped>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ShapeKind::Opaque,
            default: default_boxed::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `Address` for `app::model::Address`.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// A freshly allocated `T::default()`.
    pub fn default_value(&self) -> Box<dyn Any> {
        (self.default)()
    }
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ShapeKind::Scalar(_) => "scalar",
            ShapeKind::Composite(_) => "composite",
            ShapeKind::Optional(_) => "optional",
            ShapeKind::Opaque => "opaque",
        };
        f.debug_struct("TypeShape")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// Strip the module path from a non-generic `std::any::type_name` string.
/// Generic names are returned unchanged.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    if !full.contains('<') {
        return full.rsplit("::").next().unwrap_or(full);
    }
    full
}

fn default_boxed<T: Default + Any>() -> Box<dyn Any> {
    Box::new(T::default())
}

fn encode_scalar<T: Scalar + Any>(value: &dyn Any) -> Option<Value> {
    value.downcast_ref::<T>().map(Scalar::to_value)
}

fn decode_scalar<T: Scalar + Any>(value: Value) -> Result<Box<dyn Any>, String> {
    T::from_value(value).map(|v| Box::new(v) as Box<dyn Any>)
}

fn project_option<T: Any>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<Option<T>>()?
        .as_ref()
        .map(|inner| inner as &dyn Any)
}

fn wrap_some<T: Any>(inner: Box<dyn Any>) -> Option<Box<dyn Any>> {
    inner
        .downcast::<T>()
        .ok()
        .map(|inner| Box::new(Some(*inner)) as Box<dyn Any>)
}

macro_rules! impl_mapped_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Mapped for $ty {
                fn shape() -> TypeShape {
                    TypeShape::scalar::<Self>()
                }
            }
        )*
    };
}

impl_mapped_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    Vec<u8>,
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    serde_json::Value,
);

impl<T: Mapped> Mapped for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::optional::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_codec_round_trips_through_any() {
        let shape = i64::shape();
        let ShapeKind::Scalar(codec) = shape.kind() else {
            panic!("i64 should be a scalar");
        };
        assert_eq!(codec.encode(&42_i64), Some(Value::I64(42)));
        assert_eq!(codec.encode(&"not an i64"), None);

        let decoded = codec.decode(Value::I32(7)).unwrap();
        assert_eq!(decoded.downcast_ref::<i64>(), Some(&7));
    }

    #[test]
    fn optional_codec_projects_and_wraps() {
        let shape = Option::<String>::shape();
        let ShapeKind::Optional(codec) = shape.kind() else {
            panic!("Option<String> should be optional");
        };
        assert_eq!(codec.inner().id(), TypeId::of::<String>());

        let some = Some("x".to_string());
        let projected = codec.project(&some).unwrap();
        assert_eq!(projected.downcast_ref::<String>().map(String::as_str), Some("x"));
        assert!(codec.project(&None::<String>).is_none());

        let wrapped = codec.wrap(Box::new("y".to_string())).unwrap();
        assert_eq!(
            wrapped.downcast_ref::<Option<String>>(),
            Some(&Some("y".to_string()))
        );
        assert!(codec.wrap(Box::new(1_i32)).is_none());
    }

    #[test]
    fn default_value_is_type_default() {
        let shape = Option::<i32>::shape();
        let value = shape.default_value();
        assert_eq!(value.downcast_ref::<Option<i32>>(), Some(&None));
    }

    #[test]
    fn short_names_drop_module_paths() {
        assert_eq!(short_type_name("app::model::Address"), "Address");
        assert_eq!(short_type_name("Address"), "Address");
    }
}
