//! `#[derive(Aggregate)]`: metadata configuration from `#[orm(...)]` attributes.
//!
//! Pairs with `#[derive(Structure)]`, which provides the property set the
//! generated `configure` refers to by name.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::ContainerAttrs;
use crate::structure::mapped_fields;

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let container = ContainerAttrs::from_attrs(&input.attrs)?;
    let fields = mapped_fields(&input, &container, "Aggregate")?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut steps = Vec::new();

    if let Some(entity) = &container.entity {
        steps.push(quote! { let builder = builder.entity(#entity); });
    }
    if let Some(schema) = &container.schema {
        steps.push(quote! { let builder = builder.schema(#schema); });
    }
    if let Some(dialect) = &container.dialect {
        steps.push(quote! { let builder = builder.dialect(::vorm::Dialect::#dialect); });
    }
    if container.triggers {
        steps.push(quote! { let builder = builder.has_triggers(); });
    }

    let keys: Vec<&str> = fields
        .iter()
        .filter(|f| f.attrs.key)
        .map(|f| f.name.as_str())
        .collect();
    if !keys.is_empty() {
        steps.push(quote! { let builder = builder.has_key(&[#(#keys),*])?; });
    }

    for field in &fields {
        let property = &field.name;
        if field.attrs.identity {
            steps.push(quote! { let builder = builder.has_identity(#property)?; });
        }
        if field.attrs.default {
            steps.push(quote! { let builder = builder.has_default(#property)?; });
        }
        if field.attrs.ignore {
            steps.push(quote! { let builder = builder.ignore(#property)?; });
        }
    }

    Ok(quote! {
        impl #impl_generics ::vorm::Aggregate for #name #ty_generics #where_clause {
            fn configure(
                builder: ::vorm::MetadataBuilder<Self>,
            ) -> ::vorm::OrmResult<::vorm::MetadataBuilder<Self>> {
                #(#steps)*
                ::std::result::Result::Ok(builder)
            }
        }
    })
}
