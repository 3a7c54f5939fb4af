//! Property descriptors and ordered property sets.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::shape::{Mapped, TypeShape};

/// Type-erased get/set for one field.
trait Accessor: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;
    fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> bool;
    fn settable(&self) -> bool;
}

struct FieldAccessor<O, F> {
    get: fn(&O) -> &F,
    set: Option<fn(&mut O, F)>,
}

impl<O: Any, F: Any> Accessor for FieldAccessor<O, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        owner
            .downcast_ref::<O>()
            .map(|owner| (self.get)(owner) as &dyn Any)
    }

    fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> bool {
        let Some(setter) = self.set else {
            return false;
        };
        let (Some(owner), Ok(value)) = (owner.downcast_mut::<O>(), value.downcast::<F>()) else {
            return false;
        };
        setter(owner, *value);
        true
    }

    fn settable(&self) -> bool {
        self.set.is_some()
    }
}

/// A named, typed accessor for one property of a composite type.
///
/// Built by `#[derive(Structure)]`; immutable once constructed.
pub struct PropertyDescriptor {
    name: &'static str,
    owner: &'static str,
    shape: fn() -> TypeShape,
    accessor: Box<dyn Accessor>,
}

impl PropertyDescriptor {
    /// Describe a read/write property of `O` with declared type `F`.
    ///
    /// ```ignore
    /// PropertyDescriptor::new::<User, String>("name", |u| &u.name, |u, v| u.name = v)
    /// ```
    pub fn new<O: Any, F: Mapped>(
        name: &'static str,
        get: fn(&O) -> &F,
        set: fn(&mut O, F),
    ) -> Self {
        Self {
            name,
            owner: std::any::type_name::<O>(),
            shape: F::shape,
            accessor: Box::new(FieldAccessor { get, set: Some(set) }),
        }
    }

    /// Describe a read-only property: it is selected and returned, but never
    /// written by INSERT/UPDATE nor set by unflatten.
    pub fn read_only<O: Any, F: Mapped>(name: &'static str, get: fn(&O) -> &F) -> Self {
        Self {
            name,
            owner: std::any::type_name::<O>(),
            shape: F::shape,
            accessor: Box::new(FieldAccessor::<O, F> { get, set: None }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type name of the owning struct.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Shape of the declared property type.
    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }

    pub fn is_settable(&self) -> bool {
        self.accessor.settable()
    }

    /// Borrow this property from an owner; `None` if `owner` is another type.
    pub fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        self.accessor.get(owner)
    }

    /// Assign a boxed value of the declared type. Returns `false` when the
    /// property is read-only or either type does not match.
    pub fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> bool {
        self.accessor.set(owner, value)
    }

    /// Default value of the declared property type.
    pub fn default_value(&self) -> Box<dyn Any> {
        self.shape().default_value()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("settable", &self.is_settable())
            .finish()
    }
}

/// Ordered, name-indexed collection of [`PropertyDescriptor`]s.
#[derive(Debug, Clone)]
pub struct PropertySet {
    owner: &'static str,
    items: Vec<Arc<PropertyDescriptor>>,
    index: HashMap<&'static str, usize>,
}

impl PropertySet {
    pub fn new(owner: &'static str) -> Self {
        Self {
            owner,
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a property set for `O`.
    pub fn of<O: Any>() -> Self {
        Self::new(std::any::type_name::<O>())
    }

    /// Append a descriptor. Duplicate names are a configuration error.
    pub fn add(&mut self, descriptor: PropertyDescriptor) -> OrmResult<&mut Self> {
        if self.index.contains_key(descriptor.name) {
            return Err(OrmError::configuration(
                self.owner,
                format!("duplicate property '{}'", descriptor.name),
            ));
        }
        self.index.insert(descriptor.name, self.items.len());
        self.items.push(Arc::new(descriptor));
        Ok(self)
    }

    /// Remove a descriptor by name, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Arc<PropertyDescriptor>> {
        let position = self.index.remove(name)?;
        let removed = self.items.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&Arc<PropertyDescriptor>> {
        self.items.get(index)
    }

    /// Position of a property by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether this exact descriptor (by identity, not name) belongs to the set.
    pub fn contains_descriptor(&self, descriptor: &Arc<PropertyDescriptor>) -> bool {
        self.items.iter().any(|item| Arc::ptr_eq(item, descriptor))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PropertyDescriptor>> {
        self.items.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.items.iter().map(|item| item.name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rust type name of the owning struct.
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

impl<'a> IntoIterator for &'a PropertySet {
    type Item = &'a Arc<PropertyDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<PropertyDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
