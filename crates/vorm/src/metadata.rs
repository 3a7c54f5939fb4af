//! Per-aggregate configuration.
//!
//! An [`AggregateMetadata`] records where an aggregate lives (schema, entity),
//! which properties form its key, which are database-assigned identities or
//! carry database defaults, and which are not mapped at all. It is built once
//! through a [`MetadataBuilder`], usually from `#[derive(Aggregate)]`:
//!
//! ```ignore
//! #[derive(Debug, Default, Structure, Aggregate)]
//! #[orm(entity = "Users", schema = "dbo")]
//! struct User {
//!     #[orm(key, identity)]
//!     id: i64,
//!     name: String,
//!     #[orm(ignore)]
//!     session: Option<String>,
//! }
//! ```
//!
//! or by hand:
//!
//! ```ignore
//! impl Aggregate for User {
//!     fn configure(b: MetadataBuilder<Self>) -> OrmResult<MetadataBuilder<Self>> {
//!         b.entity("Users").schema("dbo").has_key(&["id"])?.has_identity("id")
//!     }
//! }
//! ```

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::Defaults;
use crate::descriptor::{PropertyDescriptor, PropertySet};
use crate::error::{OrmError, OrmResult};
use crate::mapper::StructuralMapper;
use crate::query::Dialect;
use crate::shape::{Structure, TypeShape};

/// A persisted domain object.
pub trait Aggregate: Structure {
    /// Declare entity, keys, identities, defaults and ignored properties.
    fn configure(builder: MetadataBuilder<Self>) -> OrmResult<MetadataBuilder<Self>> {
        Ok(builder)
    }

    /// Build validated metadata for this aggregate.
    fn metadata(mapper: &StructuralMapper) -> OrmResult<AggregateMetadata> {
        Self::configure(MetadataBuilder::new()?)?.build(mapper)
    }
}

/// Validated, immutable configuration of one aggregate type.
#[derive(Debug, Clone)]
pub struct AggregateMetadata {
    type_id: TypeId,
    type_name: &'static str,
    shape: TypeShape,
    properties: Arc<PropertySet>,
    entity: String,
    schema: Option<String>,
    keys: Vec<&'static str>,
    identities: Vec<&'static str>,
    defaults: Vec<&'static str>,
    ignored: Vec<&'static str>,
    value_objects: Vec<&'static str>,
    has_triggers: bool,
    dialect: Option<Dialect>,
    defaulted: bool,
}

impl AggregateMetadata {
    pub fn aggregate_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Short Rust type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    pub fn properties(&self) -> &Arc<PropertySet> {
        &self.properties
    }

    /// Look up a top-level property, failing with a mapping error.
    pub fn property(&self, name: &str) -> OrmResult<&Arc<PropertyDescriptor>> {
        self.properties.get(name).ok_or_else(|| {
            OrmError::mapping(self.type_name, format!("unknown property '{name}'"))
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Key properties in declaration order.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    pub fn identities(&self) -> &[&'static str] {
        &self.identities
    }

    /// Properties whose column has a database default.
    pub fn defaults(&self) -> &[&'static str] {
        &self.defaults
    }

    pub fn ignored(&self) -> &[&'static str] {
        &self.ignored
    }

    /// Mapped top-level properties that are decomposed into several columns.
    pub fn value_objects(&self) -> &[&'static str] {
        &self.value_objects
    }

    pub fn has_triggers(&self) -> bool {
        self.has_triggers
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.keys.contains(&name)
    }

    pub fn is_identity(&self, name: &str) -> bool {
        self.identities.contains(&name)
    }

    pub fn is_default(&self, name: &str) -> bool {
        self.defaults.contains(&name)
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(&name)
    }

    /// Fill unset schema and dialect from `defaults`. Applies once; later
    /// calls are no-ops. A schema default is never applied to MySQL.
    pub fn apply_defaults(&mut self, defaults: &Defaults) -> &mut Self {
        if self.defaulted {
            return self;
        }
        if self.dialect.is_none() {
            self.dialect = defaults.dialect;
        }
        if self.schema.is_none() && self.dialect != Some(Dialect::MySql) {
            self.schema = defaults.schema.clone();
        }
        self.defaulted = true;
        self
    }
}

/// Builder for [`AggregateMetadata`].
///
/// Property names are checked against the aggregate's properties as each
/// declaration is made.
pub struct MetadataBuilder<T> {
    properties: PropertySet,
    entity: Option<String>,
    schema: Option<String>,
    keys: Option<Vec<&'static str>>,
    identities: Vec<&'static str>,
    defaults: Vec<&'static str>,
    ignored: Vec<&'static str>,
    has_triggers: bool,
    dialect: Option<Dialect>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Structure> MetadataBuilder<T> {
    pub fn new() -> OrmResult<Self> {
        Ok(Self {
            properties: T::properties()?,
            entity: None,
            schema: None,
            keys: None,
            identities: Vec::new(),
            defaults: Vec::new(),
            ignored: Vec::new(),
            has_triggers: false,
            dialect: None,
            _marker: PhantomData,
        })
    }

    fn type_name() -> &'static str {
        T::shape().short_name()
    }

    fn resolve(&self, name: &str) -> OrmResult<&'static str> {
        self.properties
            .get(name)
            .map(|property| property.name())
            .ok_or_else(|| {
                OrmError::mapping(Self::type_name(), format!("unknown property '{name}'"))
            })
    }

    /// Table (or view) name. Defaults to the type name.
    pub fn entity(mut self, name: impl Into<String>) -> Self {
        self.entity = Some(name.into());
        self
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema = Some(name.into());
        self
    }

    /// The table has triggers; T-SQL output clauses are replaced by
    /// follow-up queries.
    pub fn has_triggers(mut self) -> Self {
        self.has_triggers = true;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Declare the key, single or composite. May be declared once.
    pub fn has_key(mut self, names: &[&str]) -> OrmResult<Self> {
        if self.keys.is_some() {
            return Err(OrmError::configuration(
                Self::type_name(),
                "key may only be declared once",
            ));
        }
        if names.is_empty() {
            return Err(OrmError::configuration(
                Self::type_name(),
                "key must name at least one property",
            ));
        }
        let mut keys = Vec::with_capacity(names.len());
        for name in names {
            let name = self.resolve(name)?;
            if keys.contains(&name) {
                return Err(OrmError::configuration(
                    Self::type_name(),
                    format!("property '{name}' appears twice in the key"),
                ));
            }
            keys.push(name);
        }
        self.keys = Some(keys);
        Ok(self)
    }

    /// Declare a database-assigned identity property.
    pub fn has_identity(mut self, name: &str) -> OrmResult<Self> {
        let name = self.resolve(name)?;
        Self::declare(&mut self.identities, name, "identity")?;
        Ok(self)
    }

    /// Declare a property whose column has a database default.
    pub fn has_default(mut self, name: &str) -> OrmResult<Self> {
        let name = self.resolve(name)?;
        Self::declare(&mut self.defaults, name, "default")?;
        Ok(self)
    }

    /// Exclude a property from every generated statement.
    pub fn ignore(mut self, name: &str) -> OrmResult<Self> {
        let name = self.resolve(name)?;
        Self::declare(&mut self.ignored, name, "ignored")?;
        Ok(self)
    }

    fn declare(list: &mut Vec<&'static str>, name: &'static str, what: &str) -> OrmResult<()> {
        if list.contains(&name) {
            return Err(OrmError::configuration(
                Self::type_name(),
                format!("property '{name}' is already declared {what}"),
            ));
        }
        list.push(name);
        Ok(())
    }

    /// Validate the declarations and compute the aggregate's flat layout.
    pub fn build(self, mapper: &StructuralMapper) -> OrmResult<AggregateMetadata> {
        let shape = T::shape();
        let type_name = shape.short_name();
        let keys = self.keys.unwrap_or_default();

        for name in keys.iter().chain(&self.identities) {
            if self.ignored.contains(name) {
                return Err(OrmError::configuration(
                    type_name,
                    format!("key or identity property '{name}' cannot be ignored"),
                ));
            }
        }

        // Classifies every property and rejects unmappable structures.
        mapper.layout(&shape)?;

        let mut value_objects = Vec::new();
        for property in self.properties.iter() {
            if self.ignored.contains(&property.name()) {
                continue;
            }
            if mapper.should_flatten_shape(&property.shape())? {
                value_objects.push(property.name());
            }
        }

        let entity = self.entity.unwrap_or_else(|| type_name.to_string());
        tracing::debug!(
            target: "vorm.metadata",
            aggregate = type_name,
            entity = %entity,
            keys = ?keys,
            identities = ?self.identities,
            "built aggregate metadata"
        );

        Ok(AggregateMetadata {
            type_id: TypeId::of::<T>(),
            type_name,
            shape,
            properties: mapper.properties(&shape)?,
            entity,
            schema: self.schema,
            keys,
            identities: self.identities,
            defaults: self.defaults,
            ignored: self.ignored,
            value_objects,
            has_triggers: self.has_triggers,
            dialect: self.dialect,
            defaulted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TypeConverterRegistry;
    use crate::fixtures::*;

    fn mapper() -> StructuralMapper {
        let mut converters = TypeConverterRegistry::new();
        converters
            .register::<CustomerId, i64>(|id| id.0, CustomerId)
            .unwrap();
        StructuralMapper::new(converters)
    }

    #[test]
    fn builds_from_configure() {
        let metadata = Customer::metadata(&mapper()).unwrap();
        assert_eq!(metadata.entity(), "Customers");
        assert_eq!(metadata.schema(), Some("dbo"));
        assert_eq!(metadata.keys(), &["Id"]);
        assert_eq!(metadata.identities(), &["Id"]);
        assert_eq!(metadata.ignored(), &["Notes"]);
        assert_eq!(metadata.value_objects(), &["Address", "Billing"]);
        assert!(!metadata.has_triggers());
    }

    #[test]
    fn entity_defaults_to_type_name() {
        let metadata = MetadataBuilder::<Address>::new()
            .unwrap()
            .build(&mapper())
            .unwrap();
        assert_eq!(metadata.entity(), "Address");
        assert!(metadata.keys().is_empty());
    }

    #[test]
    fn key_may_be_declared_once() {
        let err = MetadataBuilder::<Customer>::new()
            .unwrap()
            .has_key(&["Id"])
            .unwrap()
            .has_key(&["Name"])
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let builder = MetadataBuilder::<Customer>::new()
            .unwrap()
            .has_default("Name")
            .unwrap();
        assert!(builder.has_default("Name").err().unwrap().is_configuration());

        let builder = MetadataBuilder::<Customer>::new()
            .unwrap()
            .ignore("Notes")
            .unwrap();
        assert!(builder.ignore("Notes").err().unwrap().is_configuration());
    }

    #[test]
    fn unknown_property_is_mapping_error() {
        let err = MetadataBuilder::<Customer>::new()
            .unwrap()
            .has_identity("Missing")
            .err()
            .unwrap();
        assert!(err.is_mapping());
    }

    #[test]
    fn key_cannot_be_ignored() {
        let err = MetadataBuilder::<Customer>::new()
            .unwrap()
            .has_key(&["Id"])
            .unwrap()
            .ignore("Id")
            .unwrap()
            .build(&mapper())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn build_rejects_unmappable_structure() {
        let err = MetadataBuilder::<Customer>::new()
            .unwrap()
            .build(&StructuralMapper::default())
            .unwrap_err();
        assert!(err.to_string().contains("no type converter"));
    }

    #[test]
    fn defaults_apply_once_and_skip_mysql_schema() {
        let mapper = mapper();
        let mut metadata = MetadataBuilder::<Address>::new()
            .unwrap()
            .dialect(Dialect::MySql)
            .build(&mapper)
            .unwrap();
        metadata.apply_defaults(&Defaults::new().schema("dbo"));
        assert_eq!(metadata.schema(), None);

        let mut metadata = MetadataBuilder::<Address>::new()
            .unwrap()
            .build(&mapper)
            .unwrap();
        metadata.apply_defaults(&Defaults::new().schema("dbo").dialect(Dialect::SqlServer));
        metadata.apply_defaults(&Defaults::new().schema("other"));
        assert_eq!(metadata.schema(), Some("dbo"));
        assert_eq!(metadata.dialect(), Some(Dialect::SqlServer));
    }
}
