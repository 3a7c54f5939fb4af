//! Structural mapping between nested aggregates and flat rows.
//!
//! The [`StructuralMapper`] classifies every property type as a leaf (one
//! column) or a value object (decomposed into `outer_inner` columns), and
//! converts instances to and from [`FlatRow`]s. Classification, property
//! sets, flat layouts and flattened type defaults are computed once per type
//! and cached for the mapper's lifetime.
//!
//! # Example
//!
//! ```ignore
//! let mapper = StructuralMapper::new(TypeConverterRegistry::new());
//! let row = mapper.flatten(&user)?;          // Address { City } -> "Address_City"
//! let back: User = mapper.unflatten(&row)?;
//! assert_eq!(back, user);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::converter::TypeConverterRegistry;
use crate::descriptor::{PropertyDescriptor, PropertySet};
use crate::error::{OrmError, OrmResult};
use crate::metadata::AggregateMetadata;
use crate::row::{Columns, FlatRow};
use crate::shape::{Mapped, ShapeKind, TypeShape};
use crate::value::Value;

/// Column name used when a leaf type is flattened on its own.
pub const VALUE_COLUMN: &str = "value";

/// One leaf column of a flattened type.
#[derive(Debug, Clone)]
pub struct FlatProperty {
    path: String,
    top: &'static str,
    settable: bool,
    shape: TypeShape,
}

impl FlatProperty {
    /// Column name, e.g. `Address_Geo_Lat`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name of the top-level property this leaf belongs to.
    pub fn top(&self) -> &'static str {
        self.top
    }

    /// Whether every property along the path has a setter.
    pub fn is_settable(&self) -> bool {
        self.settable
    }

    /// Shape of the leaf type.
    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }
}

/// Pre-order leaf list of a type, with a shared column index.
#[derive(Debug)]
pub struct FlatLayout {
    leaves: Vec<FlatProperty>,
    columns: Arc<Columns>,
}

impl FlatLayout {
    pub fn leaves(&self) -> &[FlatProperty] {
        &self.leaves
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    /// Leaves belonging to one top-level property, in declaration order.
    pub fn leaves_of<'a>(&'a self, top: &'a str) -> impl Iterator<Item = &'a FlatProperty> + 'a {
        self.leaves.iter().filter(move |leaf| leaf.top == top)
    }
}

type Cache<V> = RwLock<HashMap<TypeId, V>>;

/// Converts aggregates to and from flat rows.
///
/// Owns the [`TypeConverterRegistry`]; share it behind an `Arc`.
#[derive(Default)]
pub struct StructuralMapper {
    converters: TypeConverterRegistry,
    leaves: Cache<bool>,
    properties: Cache<Arc<PropertySet>>,
    layouts: Cache<Arc<FlatLayout>>,
    defaults: Cache<Arc<FlatRow>>,
}

impl fmt::Debug for StructuralMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralMapper")
            .field("converters", &self.converters.len())
            .finish_non_exhaustive()
    }
}

/// Read-through cache lookup. Computes outside the lock; a racing
/// computation of the same entry is harmless and the first insert wins.
fn cached<V: Clone>(
    cache: &Cache<V>,
    id: TypeId,
    compute: impl FnOnce() -> OrmResult<V>,
) -> OrmResult<V> {
    if let Some(v) = cache.read().unwrap_or_else(PoisonError::into_inner).get(&id) {
        return Ok(v.clone());
    }
    let value = compute()?;
    let mut guard = cache.write().unwrap_or_else(PoisonError::into_inner);
    Ok(guard.entry(id).or_insert(value).clone())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

impl StructuralMapper {
    pub fn new(converters: TypeConverterRegistry) -> Self {
        Self {
            converters,
            ..Self::default()
        }
    }

    pub fn converters(&self) -> &TypeConverterRegistry {
        &self.converters
    }

    /// Whether `T` is decomposed into several columns.
    pub fn should_flatten<T: Mapped>(&self) -> OrmResult<bool> {
        self.should_flatten_shape(&T::shape())
    }

    /// Classify a shape: `false` for scalars, converter-backed types and
    /// options of those; `true` for composites. Opaque types without a
    /// converter cannot be stored.
    pub fn should_flatten_shape(&self, shape: &TypeShape) -> OrmResult<bool> {
        cached(&self.leaves, shape.id(), || {
            if self.converters.get(shape.id()).is_some() {
                return Ok(false);
            }
            match shape.kind() {
                ShapeKind::Scalar(_) => Ok(false),
                ShapeKind::Composite(_) => Ok(true),
                ShapeKind::Optional(codec) => self.should_flatten_shape(&codec.inner()),
                ShapeKind::Opaque => Err(OrmError::configuration(
                    shape.short_name(),
                    "no type converter registered for opaque type",
                )),
            }
        })
    }

    /// Cached property set of a composite shape.
    pub fn properties(&self, shape: &TypeShape) -> OrmResult<Arc<PropertySet>> {
        cached(&self.properties, shape.id(), || match shape.kind() {
            ShapeKind::Composite(codec) => codec.properties().map(Arc::new),
            _ => Err(OrmError::configuration(
                shape.short_name(),
                "type has no properties",
            )),
        })
    }

    /// Cached flat layout of a shape.
    pub fn layout(&self, shape: &TypeShape) -> OrmResult<Arc<FlatLayout>> {
        cached(&self.layouts, shape.id(), || {
            let mut leaves = Vec::new();
            let mut stack = Vec::new();
            self.collect_leaves(shape, "", None, true, &mut stack, &mut leaves)?;
            let mut columns = Columns::new();
            for leaf in &leaves {
                // Unquoted names fold case in PostgreSQL, so compare case-insensitively.
                if columns.position(&leaf.path).is_some() {
                    return Err(OrmError::configuration(
                        shape.short_name(),
                        format!("flattened column '{}' is produced twice", leaf.path),
                    ));
                }
                columns.push(leaf.path.clone());
            }
            let columns = Arc::new(columns);
            tracing::trace!(
                target: "vorm.mapper",
                type_name = shape.short_name(),
                columns = leaves.len(),
                "computed flat layout"
            );
            Ok(Arc::new(FlatLayout { leaves, columns }))
        })
    }

    fn collect_leaves(
        &self,
        shape: &TypeShape,
        prefix: &str,
        top: Option<&'static str>,
        settable: bool,
        stack: &mut Vec<TypeId>,
        out: &mut Vec<FlatProperty>,
    ) -> OrmResult<()> {
        if !self.should_flatten_shape(shape)? {
            out.push(FlatProperty {
                path: if prefix.is_empty() {
                    VALUE_COLUMN.to_string()
                } else {
                    prefix.to_string()
                },
                top: top.unwrap_or(VALUE_COLUMN),
                settable,
                shape: *shape,
            });
            return Ok(());
        }

        match shape.kind() {
            ShapeKind::Optional(codec) => {
                self.collect_leaves(&codec.inner(), prefix, top, settable, stack, out)
            }
            ShapeKind::Composite(_) => {
                if stack.contains(&shape.id()) {
                    return Err(OrmError::configuration(
                        shape.short_name(),
                        "value object contains itself",
                    ));
                }
                let properties = self.properties(shape)?;
                if properties.is_empty() {
                    return Err(OrmError::configuration(
                        shape.short_name(),
                        "value object has no properties",
                    ));
                }
                stack.push(shape.id());
                for property in properties.iter() {
                    self.collect_leaves(
                        &property.shape(),
                        &join(prefix, property.name()),
                        Some(top.unwrap_or(property.name())),
                        settable && property.is_settable(),
                        stack,
                        out,
                    )?;
                }
                stack.pop();
                Ok(())
            }
            _ => Err(OrmError::configuration(
                shape.short_name(),
                "type cannot be flattened",
            )),
        }
    }

    /// Flattened leaves of an aggregate, excluding ignored properties.
    pub fn flattened_property_list(
        &self,
        metadata: &AggregateMetadata,
    ) -> OrmResult<Vec<FlatProperty>> {
        let layout = self.layout(metadata.shape())?;
        Ok(layout
            .leaves
            .iter()
            .filter(|leaf| !metadata.is_ignored(leaf.top))
            .cloned()
            .collect())
    }

    /// Decompose an instance into a flat row in layout order.
    pub fn flatten<T: Mapped>(&self, value: &T) -> OrmResult<FlatRow> {
        self.flatten_shape(&T::shape(), value)
    }

    /// Decompose a type-erased value of the given shape.
    pub fn flatten_shape(&self, shape: &TypeShape, value: &dyn Any) -> OrmResult<FlatRow> {
        let layout = self.layout(shape)?;
        let mut values = Vec::with_capacity(layout.leaves.len());
        self.write_values(shape, Some(value), &mut values)?;
        debug_assert_eq!(values.len(), layout.leaves.len());

        let mut row = FlatRow::with_columns(layout.columns.clone());
        for (i, value) in values.into_iter().enumerate() {
            row.set_at(i, value);
        }
        Ok(row)
    }

    /// Flatten `value` with every column prefixed by `prefix`.
    fn flatten_prefixed(
        &self,
        shape: &TypeShape,
        value: &dyn Any,
        prefix: &str,
        out: &mut FlatRow,
    ) -> OrmResult<()> {
        if !self.should_flatten_shape(shape)? {
            out.insert(prefix, self.encode_leaf(shape, value)?);
            return Ok(());
        }
        let row = self.flatten_shape(shape, value)?;
        for (name, value) in row.iter() {
            out.insert(join(prefix, name), value.clone());
        }
        Ok(())
    }

    /// Pre-order walk emitting one value per leaf. A missing (`None`)
    /// value object emits `NULL` for each of its leaves.
    fn write_values(
        &self,
        shape: &TypeShape,
        value: Option<&dyn Any>,
        out: &mut Vec<Value>,
    ) -> OrmResult<()> {
        if !self.should_flatten_shape(shape)? {
            out.push(match value {
                Some(value) => self.encode_leaf(shape, value)?,
                None => Value::Null,
            });
            return Ok(());
        }

        match shape.kind() {
            ShapeKind::Optional(codec) => {
                let inner = value.and_then(|v| codec.project(v));
                self.write_values(&codec.inner(), inner, out)
            }
            ShapeKind::Composite(_) => {
                for property in self.properties(shape)?.iter() {
                    let child = match value {
                        Some(owner) => Some(property.get(owner).ok_or_else(|| {
                            OrmError::mapping(
                                shape.short_name(),
                                format!("cannot read property '{}'", property.name()),
                            )
                        })?),
                        None => None,
                    };
                    self.write_values(&property.shape(), child, out)?;
                }
                Ok(())
            }
            _ => Err(OrmError::configuration(
                shape.short_name(),
                "type cannot be flattened",
            )),
        }
    }

    /// Encode one leaf value, preferring a registered converter.
    pub fn encode_leaf(&self, shape: &TypeShape, value: &dyn Any) -> OrmResult<Value> {
        if let Some(converter) = self.converters.get(shape.id()) {
            return converter.convert_to_simple(value);
        }
        match shape.kind() {
            ShapeKind::Scalar(codec) => codec.encode(value).ok_or_else(|| {
                OrmError::mapping(shape.short_name(), "value does not match its declared type")
            }),
            ShapeKind::Optional(codec) => match codec.project(value) {
                Some(inner) => self.encode_leaf(&codec.inner(), inner),
                None => Ok(Value::Null),
            },
            _ => Err(OrmError::configuration(shape.short_name(), "not a leaf type")),
        }
    }

    /// Decode one column value into a boxed leaf. `Ok(None)` leaves the
    /// property at its default.
    fn decode_leaf(
        &self,
        shape: &TypeShape,
        value: Value,
        column: &str,
    ) -> OrmResult<Option<Box<dyn Any>>> {
        if let Some(converter) = self.converters.get(shape.id()) {
            if value.is_null() {
                return Ok(None);
            }
            return converter.convert_to_complex(value).map(Some);
        }
        match shape.kind() {
            ShapeKind::Scalar(codec) => {
                if value.is_null() {
                    return Err(OrmError::decode(column, "unexpected NULL"));
                }
                codec
                    .decode(value)
                    .map(Some)
                    .map_err(|message| OrmError::decode(column, message))
            }
            ShapeKind::Optional(codec) => {
                if value.is_null() {
                    return Ok(Some(shape.default_value()));
                }
                match self.decode_leaf(&codec.inner(), value, column)? {
                    Some(inner) => codec.wrap(inner).map(Some).ok_or_else(|| {
                        OrmError::decode(column, "decoded value does not match its declared type")
                    }),
                    None => Ok(Some(shape.default_value())),
                }
            }
            _ => Err(OrmError::configuration(shape.short_name(), "not a leaf type")),
        }
    }

    /// Rebuild an instance from a flat row. Columns missing from the row
    /// leave the corresponding property at its default.
    pub fn unflatten<T: Mapped>(&self, row: &FlatRow) -> OrmResult<T> {
        let shape = T::shape();
        let boxed = if self.should_flatten_shape(&shape)? {
            self.read_value(&shape, "", row)?.map(|(value, _)| value)
        } else {
            match row.get(VALUE_COLUMN) {
                Some(value) => self.decode_leaf(&shape, value.clone(), VALUE_COLUMN)?,
                None => None,
            }
        };
        let boxed = boxed.unwrap_or_else(|| shape.default_value());
        boxed.downcast::<T>().map(|value| *value).map_err(|_| {
            OrmError::mapping(shape.short_name(), "unflattened value has the wrong type")
        })
    }

    /// Read the value at `path`. Returns `None` when no column under the path
    /// is present; otherwise the value and whether any of its columns was
    /// non-null.
    fn read_value(
        &self,
        shape: &TypeShape,
        path: &str,
        row: &FlatRow,
    ) -> OrmResult<Option<(Box<dyn Any>, bool)>> {
        if !self.should_flatten_shape(shape)? {
            let Some(value) = row.get(path) else {
                return Ok(None);
            };
            let non_null = !value.is_null();
            return Ok(self
                .decode_leaf(shape, value.clone(), path)?
                .map(|decoded| (decoded, non_null)));
        }

        match shape.kind() {
            ShapeKind::Optional(codec) => {
                let inner = codec.inner();
                let layout = self.layout(&inner)?;
                let mut present = false;
                let mut non_null = false;
                for leaf in &layout.leaves {
                    if let Some(value) = row.get(&join(path, &leaf.path)) {
                        present = true;
                        non_null |= !value.is_null();
                    }
                }
                if !present {
                    return Ok(None);
                }
                if !non_null {
                    return Ok(Some((shape.default_value(), false)));
                }
                match self.read_value(&inner, path, row)? {
                    Some((value, _)) => {
                        let wrapped = codec.wrap(value).ok_or_else(|| {
                            OrmError::mapping(inner.short_name(), "cannot wrap value object")
                        })?;
                        Ok(Some((wrapped, true)))
                    }
                    None => Ok(None),
                }
            }
            ShapeKind::Composite(_) => {
                let mut owner = shape.default_value();
                let mut present = false;
                let mut non_null = false;
                for property in self.properties(shape)?.iter() {
                    if !property.is_settable() {
                        continue;
                    }
                    let child_path = join(path, property.name());
                    let Some((value, child_non_null)) =
                        self.read_value(&property.shape(), &child_path, row)?
                    else {
                        continue;
                    };
                    if !property.set(&mut *owner, value) {
                        return Err(OrmError::mapping(
                            shape.short_name(),
                            format!("cannot assign property '{}'", property.name()),
                        ));
                    }
                    present = true;
                    non_null |= child_non_null;
                }
                Ok(present.then_some((owner, non_null)))
            }
            _ => Err(OrmError::configuration(
                shape.short_name(),
                "type cannot be flattened",
            )),
        }
    }

    /// Build the key parameter bag for an id value.
    ///
    /// - a single leaf key binds `id` under the key's name;
    /// - a single value-object key of the same type as `id` binds its
    ///   leaves prefixed by the key's name;
    /// - otherwise `id` is flattened and each key leaf is looked up by name.
    pub fn wrap_id<I: Mapped>(&self, id: &I, metadata: &AggregateMetadata) -> OrmResult<FlatRow> {
        let id_shape = I::shape();
        let keys = metadata.keys();
        if keys.is_empty() {
            return Err(OrmError::unsupported(
                metadata.type_name(),
                "aggregate has no key",
            ));
        }

        if let [key] = keys {
            let property = metadata.property(key)?;
            let key_shape = property.shape();
            let id_is_leaf = !self.should_flatten_shape(&id_shape)?;
            let key_is_leaf = !self.should_flatten_shape(&key_shape)?;
            if key_is_leaf && id_is_leaf {
                let mut row = FlatRow::new();
                row.insert(*key, self.encode_leaf(&id_shape, id)?);
                return Ok(row);
            }
            if !key_is_leaf && key_shape.id() == id_shape.id() {
                let mut row = FlatRow::new();
                self.flatten_prefixed(&key_shape, id, key, &mut row)?;
                return Ok(row);
            }
        }

        let flattened = self.flatten(id)?;
        let layout = self.layout(metadata.shape())?;
        let mut row = FlatRow::new();
        for key in keys {
            for leaf in layout.leaves_of(key) {
                let value = flattened.get(&leaf.path).ok_or_else(|| {
                    OrmError::mapping(
                        metadata.type_name(),
                        format!(
                            "id of type {} has no value for key column '{}'",
                            id_shape.short_name(),
                            leaf.path
                        ),
                    )
                })?;
                row.insert(leaf.path.clone(), value.clone());
            }
        }
        Ok(row)
    }

    /// Flattened `Default::default()` of a shape, cached per type.
    pub fn type_defaults(&self, shape: &TypeShape) -> OrmResult<Arc<FlatRow>> {
        cached(&self.defaults, shape.id(), || {
            let default = shape.default_value();
            let row = if self.should_flatten_shape(shape)? {
                self.flatten_shape(shape, &*default)?
            } else {
                FlatRow::from_pairs([(VALUE_COLUMN, self.encode_leaf(shape, &*default)?)])
            };
            Ok(Arc::new(row))
        })
    }

    /// Default column values of one top-level property, keyed by the
    /// property's flat paths.
    pub fn property_defaults(&self, property: &PropertyDescriptor) -> OrmResult<FlatRow> {
        let shape = property.shape();
        let defaults = self.type_defaults(&shape)?;
        if !self.should_flatten_shape(&shape)? {
            let value = defaults.get(VALUE_COLUMN).cloned().unwrap_or_default();
            return Ok(FlatRow::from_pairs([(property.name(), value)]));
        }
        Ok(defaults
            .iter()
            .map(|(path, value)| (join(property.name(), path), value.clone()))
            .collect())
    }
}
