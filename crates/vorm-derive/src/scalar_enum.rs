//! `#[derive(ScalarEnum)]`: store a unit-only enum as a text column.

use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

use crate::attrs::{ContainerAttrs, VariantAttrs};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(e) => &e.variants,
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "ScalarEnum can only be derived for enums",
            ));
        }
    };
    if variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input,
            "ScalarEnum requires at least one variant",
        ));
    }

    let container = ContainerAttrs::from_attrs(&input.attrs)?;
    let type_name = name.to_string();

    let mut to_value_arms = Vec::new();
    let mut from_value_arms = Vec::new();
    let mut seen = Vec::new();

    for variant in variants {
        if !matches!(&variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "ScalarEnum variants must be unit variants (no fields)",
            ));
        }

        let variant_ident = &variant.ident;
        let attrs = VariantAttrs::from_attrs(&variant.attrs)?;
        let raw = variant_ident.to_string();
        let stored = match (attrs.rename, container.rename_all) {
            (Some(rename), _) => rename,
            (None, Some(rule)) => rule.apply(&raw),
            (None, None) => raw.to_snake_case(),
        };
        if seen.contains(&stored) {
            return Err(syn::Error::new_spanned(
                variant,
                format!("duplicate stored value '{stored}'"),
            ));
        }

        to_value_arms.push(quote! {
            #name::#variant_ident => #stored,
        });
        from_value_arms.push(quote! {
            #stored => ::std::result::Result::Ok(#name::#variant_ident),
        });
        seen.push(stored);
    }

    Ok(quote! {
        impl ::vorm::Scalar for #name {
            const KIND: ::vorm::ScalarKind = ::vorm::ScalarKind::String;

            fn to_value(&self) -> ::vorm::Value {
                let s: &str = match self {
                    #(#to_value_arms)*
                };
                ::vorm::Value::String(::std::string::ToString::to_string(s))
            }

            fn from_value(
                value: ::vorm::Value,
            ) -> ::std::result::Result<Self, ::std::string::String> {
                match value {
                    ::vorm::Value::String(s) => match s.as_str() {
                        #(#from_value_arms)*
                        other => ::std::result::Result::Err(::std::format!(
                            "unknown {} variant: {:?}",
                            #type_name,
                            other
                        )),
                    },
                    other => ::std::result::Result::Err(::std::format!(
                        "expected string for {}, got {}",
                        #type_name,
                        other.kind_name()
                    )),
                }
            }
        }

        impl ::vorm::Mapped for #name {
            fn shape() -> ::vorm::TypeShape {
                ::vorm::TypeShape::scalar::<Self>()
            }
        }
    })
}
