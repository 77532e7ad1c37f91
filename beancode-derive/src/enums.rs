//! `#[derive(EnumValue)]`: declaration-order ordinals for unit enums.
use {
    crate::common::crate_path,
    darling::{Error, FromDeriveInput, Result},
    proc_macro2::TokenStream,
    quote::quote,
    syn::{DeriveInput, Fields, Generics, Ident},
};

#[derive(FromDeriveInput)]
#[darling(attributes(externalize))]
struct EnumArgs {
    ident: Ident,
    generics: Generics,
    #[darling(default)]
    internal: bool,
}

pub(crate) fn generate(input: DeriveInput) -> Result<TokenStream> {
    let args = EnumArgs::from_derive_input(&input)?;
    if !args.generics.params.is_empty() {
        return Err(Error::custom("generic enums are not supported").with_span(&args.generics));
    }
    let variants = match &input.data {
        syn::Data::Enum(data) => &data.variants,
        _ => {
            return Err(Error::custom("EnumValue can only be derived for enums").with_span(&input))
        }
    };
    let mut idents = Vec::with_capacity(variants.len());
    for variant in variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(
                Error::custom("EnumValue variants must not carry data").with_span(variant)
            );
        }
        idents.push(&variant.ident);
    }

    let krate = crate_path(args.internal);
    let ident = &args.ident;
    let count = idents.len();
    // The wire ordinal is the declaration position; explicit Rust
    // discriminants do not change it.
    let ordinals = (0..count as u32).collect::<Vec<_>>();

    let ordinal_body = if idents.is_empty() {
        quote!(match *self {})
    } else {
        quote! {
            match self {
                #(#ident::#idents => #ordinals,)*
            }
        }
    };

    Ok(quote! {
        #[automatically_derived]
        impl #krate::EnumValue for #ident {
            const VARIANT_COUNT: usize = #count;

            fn ordinal(&self) -> u32 {
                #ordinal_body
            }

            fn from_ordinal(ordinal: u32) -> Option<Self> {
                match ordinal {
                    #(#ordinals => Some(#ident::#idents),)*
                    _ => None,
                }
            }
        }
    })
}
