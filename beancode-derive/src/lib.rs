//! Derive macros for `beancode`.
//!
//! Refer to the [`beancode`](https://docs.rs/beancode) crate for the
//! attribute reference and examples.
use {
    proc_macro::TokenStream,
    syn::{parse_macro_input, DeriveInput},
};

mod common;
mod enums;
mod record;

/// Implement `Externalizable` for a struct with named fields.
///
/// Fields carrying `#[externalize(index = N)]` are serialized; everything
/// else is invisible to the codec. Indices are the wire contract: stable,
/// unique within the record, and never reused with a different meaning.
#[proc_macro_derive(Externalizable, attributes(externalize))]
pub fn derive_externalizable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match record::generate(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.write_errors().into(),
    }
}

/// Implement `EnumValue` for a unit enum, assigning wire ordinals in
/// declaration order.
///
/// Appending variants keeps old bytes readable; reordering or removing
/// variants silently remaps them.
#[proc_macro_derive(EnumValue, attributes(externalize))]
pub fn derive_enum_value(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match enums::generate(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.write_errors().into(),
    }
}
