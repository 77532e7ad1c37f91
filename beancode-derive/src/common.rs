use {
    darling::{util::Flag, FromDeriveInput, FromField},
    syn::{Generics, Ident, Path, Type},
};

/// Type-level `#[externalize(...)]` arguments.
#[derive(FromDeriveInput)]
#[darling(attributes(externalize))]
pub(crate) struct RecordArgs {
    pub(crate) ident: Ident,
    pub(crate) generics: Generics,

    /// Generate `crate::` paths instead of `::beancode::`. Only for use
    /// inside the beancode crate itself.
    #[darling(default)]
    pub(crate) internal: bool,
    /// Wire class name override. Defaults to the module path plus the type
    /// name, which ties the wire format to the Rust namespace; set this when
    /// the name must stay stable across refactors or match a foreign dump.
    #[darling(default)]
    pub(crate) name: Option<String>,
}

/// Field-level `#[externalize(...)]` arguments.
///
/// Only fields carrying the attribute are externalized; everything else is
/// invisible to the codec.
#[derive(FromField)]
#[darling(attributes(externalize))]
pub(crate) struct FieldArgs {
    pub(crate) ident: Option<Ident>,
    pub(crate) ty: Type,

    /// Stable wire index in 0..=127. Required.
    #[darling(default)]
    pub(crate) index: Option<u8>,
    /// The field is `Option<E>` for an `EnumValue` enum. Needed because a
    /// bare type path cannot be told apart from a nested record.
    pub(crate) enum_value: Flag,
    /// Encode through the opaque serde fallback instead of a specialized
    /// wire encoding.
    pub(crate) object: Flag,
    /// Default element class for polymorphic (`Box<dyn>`) record fields and
    /// record lists; instances of this class travel without a class name.
    #[darling(default)]
    pub(crate) default: Option<Path>,
    /// Getter method used instead of reading the field directly. Must
    /// return the field's wire view (e.g. `Option<&str>` for a string
    /// field).
    #[darling(default)]
    pub(crate) get: Option<Ident>,
    /// Setter method used instead of assigning the field directly. Must
    /// accept the owned wire value.
    #[darling(default)]
    pub(crate) set: Option<Ident>,
}

/// Path prefix for the beancode crate in generated code.
pub(crate) fn crate_path(internal: bool) -> syn::Path {
    if internal {
        syn::parse_quote!(crate)
    } else {
        syn::parse_quote!(::beancode)
    }
}
