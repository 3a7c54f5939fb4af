//! `#[derive(Opaque)]`: a type stored only through a registered converter.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::vorm::Mapped for #name #ty_generics #where_clause {
            fn shape() -> ::vorm::TypeShape {
                ::vorm::TypeShape::opaque::<Self>()
            }
        }
    })
}
