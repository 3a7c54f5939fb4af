//! Hand-written `Structure` impls shared by unit tests.

use crate::descriptor::{PropertyDescriptor, PropertySet};
use crate::error::OrmResult;
use crate::metadata::{Aggregate, MetadataBuilder};
use crate::shape::{Mapped, Structure, TypeShape};

macro_rules! composite {
    ($ty:ty) => {
        impl Mapped for $ty {
            fn shape() -> TypeShape {
                TypeShape::composite::<Self>()
            }
        }
    };
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Geo {
    pub lat: f64,
    pub lng: f64,
}

composite!(Geo);

impl Structure for Geo {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, f64>("lat", |o| &o.lat, |o, v| o.lat = v))?
            .add(PropertyDescriptor::new::<Self, f64>("lng", |o| &o.lng, |o, v| o.lng = v))?;
        Ok(set)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub geo: Geo,
}

composite!(Address);

impl Structure for Address {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, String>(
            "street",
            |o| &o.street,
            |o, v| o.street = v,
        ))?
        .add(PropertyDescriptor::new::<Self, String>(
            "city",
            |o| &o.city,
            |o, v| o.city = v,
        ))?
        .add(PropertyDescriptor::new::<Self, Geo>("geo", |o| &o.geo, |o, v| o.geo = v))?;
        Ok(set)
    }
}

/// Strongly-typed id, storable only through a converter.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CustomerId(pub i64);

impl Mapped for CustomerId {
    fn shape() -> TypeShape {
        TypeShape::opaque::<Self>()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub nickname: Option<String>,
    pub address: Address,
    pub billing: Option<Address>,
    pub version: i32,
    pub notes: String,
}

composite!(Customer);

impl Structure for Customer {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, CustomerId>("Id", |o| &o.id, |o, v| o.id = v))?
            .add(PropertyDescriptor::new::<Self, String>(
                "Name",
                |o| &o.name,
                |o, v| o.name = v,
            ))?
            .add(PropertyDescriptor::new::<Self, Option<String>>(
                "Nickname",
                |o| &o.nickname,
                |o, v| o.nickname = v,
            ))?
            .add(PropertyDescriptor::new::<Self, Address>(
                "Address",
                |o| &o.address,
                |o, v| o.address = v,
            ))?
            .add(PropertyDescriptor::new::<Self, Option<Address>>(
                "Billing",
                |o| &o.billing,
                |o, v| o.billing = v,
            ))?
            .add(PropertyDescriptor::read_only::<Self, i32>("Version", |o| &o.version))?
            .add(PropertyDescriptor::new::<Self, String>(
                "Notes",
                |o| &o.notes,
                |o, v| o.notes = v,
            ))?;
        Ok(set)
    }
}

impl Aggregate for Customer {
    fn configure(builder: MetadataBuilder<Self>) -> OrmResult<MetadataBuilder<Self>> {
        builder
            .entity("Customers")
            .schema("dbo")
            .has_key(&["Id"])?
            .has_identity("Id")?
            .ignore("Notes")
    }
}

/// A value object whose property set refers back to itself.
#[derive(Debug, Default)]
pub struct Looping {
    pub name: String,
}

composite!(Looping);

impl Structure for Looping {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, String>(
            "name",
            |o| &o.name,
            |o, v| o.name = v,
        ))?
        .add(PropertyDescriptor::new::<Self, Looping>("again", |o| o, |o, v| *o = v))?;
        Ok(set)
    }
}

#[derive(Debug, Default)]
pub struct Empty;

composite!(Empty);

impl Structure for Empty {
    fn properties() -> OrmResult<PropertySet> {
        Ok(PropertySet::of::<Self>())
    }
}

#[derive(Debug, Default)]
pub struct HasEmpty {
    pub id: i64,
    pub nothing: Empty,
}

composite!(HasEmpty);

impl Structure for HasEmpty {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, i64>("Id", |o| &o.id, |o, v| o.id = v))?
            .add(PropertyDescriptor::new::<Self, Empty>(
                "Nothing",
                |o| &o.nothing,
                |o, v| o.nothing = v,
            ))?;
        Ok(set)
    }
}

/// A top-level property whose name equals a flattened value-object path.
#[derive(Debug, Default)]
pub struct Clashing {
    pub address_city: String,
    pub address: Address,
}

composite!(Clashing);

impl Structure for Clashing {
    fn properties() -> OrmResult<PropertySet> {
        let mut set = PropertySet::of::<Self>();
        set.add(PropertyDescriptor::new::<Self, String>(
            "Address_city",
            |o| &o.address_city,
            |o, v| o.address_city = v,
        ))?
        .add(PropertyDescriptor::new::<Self, Address>(
            "Address",
            |o| &o.address,
            |o, v| o.address = v,
        ))?;
        Ok(set)
    }
}
