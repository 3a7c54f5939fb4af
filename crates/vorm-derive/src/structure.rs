//! `#[derive(Structure)]`: property descriptors for a struct with named fields.

use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::{ContainerAttrs, FieldAttrs};

/// A mapped field: its Rust name, declared type, property name and attributes.
pub(crate) struct MappedField<'a> {
    pub ident: &'a syn::Ident,
    pub ty: &'a syn::Type,
    pub name: String,
    pub attrs: FieldAttrs,
}

/// Named fields of `input`, excluding `#[orm(skip)]`.
pub(crate) fn mapped_fields<'a>(
    input: &'a DeriveInput,
    container: &ContainerAttrs,
    derive: &str,
) -> Result<Vec<MappedField<'a>>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    format!("{derive} can only be derived for structs with named fields"),
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs"),
            ));
        }
    };

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let attrs = FieldAttrs::from_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = attrs.property_name(ident, container.rename_all, field.span())?;
        if out.iter().any(|f: &MappedField<'_>| f.name == name) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate property name '{name}'"),
            ));
        }
        out.push(MappedField {
            ident,
            ty: &field.ty,
            name,
            attrs,
        });
    }
    Ok(out)
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let container = ContainerAttrs::from_attrs(&input.attrs)?;
    let fields = mapped_fields(&input, &container, "Structure")?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let descriptors = fields.iter().map(|field| {
        let ident = field.ident;
        let ty = field.ty;
        let property = &field.name;
        if field.attrs.read_only {
            quote! {
                set.add(::vorm::PropertyDescriptor::read_only::<Self, #ty>(
                    #property,
                    |o| &o.#ident,
                ))?;
            }
        } else {
            quote! {
                set.add(::vorm::PropertyDescriptor::new::<Self, #ty>(
                    #property,
                    |o| &o.#ident,
                    |o, v| o.#ident = v,
                ))?;
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::vorm::Mapped for #name #ty_generics #where_clause {
            fn shape() -> ::vorm::TypeShape {
                ::vorm::TypeShape::composite::<Self>()
            }
        }

        impl #impl_generics ::vorm::Structure for #name #ty_generics #where_clause {
            fn properties() -> ::vorm::OrmResult<::vorm::PropertySet> {
                let mut set = ::vorm::PropertySet::of::<Self>();
                #(#descriptors)*
                ::std::result::Result::Ok(set)
            }
        }
    })
}
