//! `#[derive(Externalizable)]`: classify each annotated field's declared
//! type into a wire encoding and generate the record's field table.
use {
    crate::common::{crate_path, FieldArgs, RecordArgs},
    darling::{Error, FromDeriveInput, FromField, Result},
    proc_macro2::TokenStream,
    quote::{format_ident, quote},
    syn::{DeriveInput, GenericArgument, Ident, PathArguments, PathSegment, Type},
};

#[derive(Clone, Copy, PartialEq)]
enum Prim {
    I32,
    Bool,
    I8,
    U16,
    F64,
    F32,
    I64,
    I16,
}

impl Prim {
    fn of(ty: &Type) -> Option<Prim> {
        let seg = last_segment(ty)?;
        if !seg.arguments.is_none() {
            return None;
        }
        Some(match seg.ident.to_string().as_str() {
            "i32" => Prim::I32,
            "bool" => Prim::Bool,
            "i8" => Prim::I8,
            "u16" => Prim::U16,
            "f64" => Prim::F64,
            "f32" => Prim::F32,
            "i64" => Prim::I64,
            "i16" => Prim::I16,
            _ => return None,
        })
    }

    fn accessor(self) -> Ident {
        let name = match self {
            Prim::I32 => "I32",
            Prim::Bool => "Bool",
            Prim::I8 => "I8",
            Prim::U16 => "Char16",
            Prim::F64 => "F64",
            Prim::F32 => "F32",
            Prim::I64 => "I64",
            Prim::I16 => "I16",
        };
        format_ident!("{name}")
    }

    fn opt_accessor(self) -> Ident {
        format_ident!("Opt{}", self.accessor())
    }

    /// Only int, byte, double, float and long have array encodings.
    fn array_accessor(self) -> Option<Ident> {
        match self {
            Prim::I32 | Prim::I8 | Prim::F64 | Prim::F32 | Prim::I64 => {
                Some(format_ident!("{}Array", self.accessor()))
            }
            Prim::Bool | Prim::U16 | Prim::I16 => None,
        }
    }
}

enum FieldKind {
    Prim(Prim),
    OptPrim(Prim),
    Str,
    Date,
    Uuid,
    Object,
    Enum(Type),
    EnumSet(Type),
    Record(Option<Type>),
    StrArray,
    DateArray,
    PrimArray(Prim),
    StrArrayArray,
    DateArrayArray,
    PrimArrayArray(Prim),
    RecordArray(Option<Type>),
    RecordArrayArray(Option<Type>),
    RecordList,
    StrList,
}

pub(crate) fn generate(input: DeriveInput) -> Result<TokenStream> {
    let args = RecordArgs::from_derive_input(&input)?;
    if !args.generics.params.is_empty() {
        return Err(
            Error::custom("generic record types are not supported").with_span(&args.generics)
        );
    }
    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::custom(
                    "Externalizable can only be derived for structs with named fields",
                )
                .with_span(&input))
            }
        },
        _ => {
            return Err(Error::custom(
                "Externalizable can only be derived for structs with named fields",
            )
            .with_span(&input))
        }
    };

    let krate = crate_path(args.internal);
    let mut errors = Vec::new();
    let mut metas = Vec::new();
    for field in fields {
        if !field
            .attrs
            .iter()
            .any(|attr| attr.path().is_ident("externalize"))
        {
            continue;
        }
        match FieldArgs::from_field(field).and_then(|fargs| field_meta(&krate, field, fargs)) {
            Ok(meta) => metas.push(meta),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(Error::multiple(errors));
    }

    let ident = &args.ident;
    let class_name = match &args.name {
        Some(name) => quote!(#name),
        None => quote!(concat!(module_path!(), "::", stringify!(#ident))),
    };

    Ok(quote! {
        const _: () = {
            #[allow(unused_imports)]
            use #krate::{
                Accessor, ClassEntry, DecodeResult, EncodeResult, EnumSet, EnumValue,
                ErasedExternalizable, FieldMeta, Input, Output,
            };

            #[automatically_derived]
            impl #krate::Externalizable for #ident {
                const CLASS_NAME: &'static str = #class_name;

                fn field_metas() -> Vec<FieldMeta<Self>> {
                    vec![#(#metas),*]
                }
            }

            #krate::inventory::submit! { #krate::ClassEntry::of::<#ident>() }
        };
    })
}

fn field_meta(krate: &syn::Path, field: &syn::Field, args: FieldArgs) -> Result<TokenStream> {
    let Some(member) = args.ident.clone() else {
        return Err(Error::custom("externalized fields must be named").with_span(field));
    };
    let Some(index) = args.index else {
        return Err(Error::custom("#[externalize] requires an index").with_span(field));
    };
    if index > 127 {
        return Err(Error::custom("field index must be in 0..=127").with_span(field));
    }
    if args.enum_value.is_present() && args.object.is_present() {
        return Err(Error::custom("a field cannot be both enum_value and object").with_span(field));
    }

    let kind = classify(field, &args)?;
    let accessor = accessor_tokens(krate, &member, &args, &kind);

    let mut builders = TokenStream::new();
    match (&kind, &args.default) {
        (FieldKind::RecordList, None) => {
            return Err(Error::custom(
                "record list fields require a default element class: \
                 #[externalize(index = ..., default = SomeRecord)]",
            )
            .with_span(field));
        }
        (
            FieldKind::Record(None)
            | FieldKind::RecordArray(None)
            | FieldKind::RecordArrayArray(None)
            | FieldKind::RecordList,
            Some(default),
        ) => {
            builders.extend(quote!(.with_default_class(ClassEntry::of::<#default>())));
        }
        (
            FieldKind::Record(Some(elem))
            | FieldKind::RecordArray(Some(elem))
            | FieldKind::RecordArrayArray(Some(elem)),
            None,
        ) => {
            builders.extend(quote!(.with_default_class(ClassEntry::of::<#elem>())));
        }
        (
            FieldKind::Record(Some(_))
            | FieldKind::RecordArray(Some(_))
            | FieldKind::RecordArrayArray(Some(_)),
            Some(_),
        ) => {
            return Err(Error::custom(
                "`default` only applies to Box<dyn ErasedExternalizable> fields; \
                 a concrete record field already has a default class",
            )
            .with_span(field));
        }
        (_, Some(_)) => {
            return Err(Error::custom("`default` only applies to record fields").with_span(field));
        }
        _ => {}
    }
    if let FieldKind::EnumSet(elem) = &kind {
        builders.extend(quote!(.with_enum_arity(<#elem as EnumValue>::VARIANT_COUNT)));
    }

    let name = member.to_string();
    Ok(quote!(FieldMeta::new(#index, #name, #accessor)#builders))
}

fn classify(field: &syn::Field, args: &FieldArgs) -> Result<FieldKind> {
    let ty = &args.ty;
    let unsupported = || {
        Error::custom(
            "no wire encoding for this field type; see the crate docs for the supported set",
        )
        .with_span(&field.ty)
    };

    if args.object.is_present() {
        return match inner_of(ty, "Option") {
            Some(_) => Ok(FieldKind::Object),
            None => Err(Error::custom("object fields must be Option<T>").with_span(&field.ty)),
        };
    }
    if args.enum_value.is_present() {
        return match inner_of(ty, "Option") {
            Some(elem) => Ok(FieldKind::Enum(elem.clone())),
            None => Err(Error::custom("enum fields must be Option<E>").with_span(&field.ty)),
        };
    }
    if let Some(prim) = Prim::of(ty) {
        return Ok(FieldKind::Prim(prim));
    }
    let Some(inner) = inner_of(ty, "Option") else {
        return Err(unsupported());
    };
    if let Some(prim) = Prim::of(inner) {
        return Ok(FieldKind::OptPrim(prim));
    }
    if is_bare(inner, "String") {
        return Ok(FieldKind::Str);
    }
    if is_datetime(inner) {
        return Ok(FieldKind::Date);
    }
    if is_bare(inner, "Uuid") {
        return Ok(FieldKind::Uuid);
    }
    if let Some(elem) = inner_of(inner, "EnumSet") {
        return Ok(FieldKind::EnumSet(elem.clone()));
    }
    if let Some(elem) = inner_of(inner, "WireList") {
        return if is_bare(elem, "String") {
            Ok(FieldKind::StrList)
        } else if is_box_dyn(elem) {
            Ok(FieldKind::RecordList)
        } else {
            Err(Error::custom(
                "WireList fields must hold String or Box<dyn ErasedExternalizable> elements",
            )
            .with_span(&field.ty))
        };
    }
    if is_box_dyn(inner) {
        return Ok(FieldKind::Record(None));
    }
    if let Some(elem) = inner_of(inner, "Vec") {
        // Option<Vec<...>>: the one- and two-dimensional array encodings.
        if let Some(prim) = Prim::of(elem) {
            return match prim.array_accessor() {
                Some(_) => Ok(FieldKind::PrimArray(prim)),
                None => Err(unsupported()),
            };
        }
        let Some(elem) = inner_of(elem, "Option") else {
            return Err(Error::custom(
                "array elements of reference types are nullable; use Vec<Option<...>>",
            )
            .with_span(&field.ty));
        };
        if is_bare(elem, "String") {
            return Ok(FieldKind::StrArray);
        }
        if is_datetime(elem) {
            return Ok(FieldKind::DateArray);
        }
        if is_box_dyn(elem) {
            return Ok(FieldKind::RecordArray(None));
        }
        if let Some(row) = inner_of(elem, "Vec") {
            if let Some(prim) = Prim::of(row) {
                return match prim.array_accessor() {
                    Some(_) => Ok(FieldKind::PrimArrayArray(prim)),
                    None => Err(unsupported()),
                };
            }
            let Some(row_elem) = inner_of(row, "Option") else {
                return Err(Error::custom(
                    "array elements of reference types are nullable; use Vec<Option<...>>",
                )
                .with_span(&field.ty));
            };
            if is_bare(row_elem, "String") {
                return Ok(FieldKind::StrArrayArray);
            }
            if is_datetime(row_elem) {
                return Ok(FieldKind::DateArrayArray);
            }
            if is_box_dyn(row_elem) {
                return Ok(FieldKind::RecordArrayArray(None));
            }
            if is_user_path(row_elem) {
                return Ok(FieldKind::RecordArrayArray(Some(row_elem.clone())));
            }
            return Err(unsupported());
        }
        if is_user_path(elem) {
            return Ok(FieldKind::RecordArray(Some(elem.clone())));
        }
        return Err(unsupported());
    }
    if is_user_path(inner) {
        return Ok(FieldKind::Record(Some(inner.clone())));
    }
    Err(unsupported())
}

/// Generate the `Accessor` expression for one field.
fn accessor_tokens(
    krate: &syn::Path,
    member: &Ident,
    args: &FieldArgs,
    kind: &FieldKind,
) -> TokenStream {
    // Direct field access or a getter/setter method pair; the descriptor
    // cannot tell the two apart.
    let view = |direct: TokenStream| match &args.get {
        Some(getter) => quote!(record.#getter()),
        None => direct,
    };
    let store = |value: TokenStream| match &args.set {
        Some(setter) => quote!(record.#setter(#value);),
        None => quote!(record.#member = #value;),
    };

    let by_value = view(quote!(record.#member));
    let as_deref = view(quote!(record.#member.as_deref()));
    let as_ref = view(quote!(record.#member.as_ref()));
    let assign = store(quote!(value));

    match kind {
        FieldKind::Prim(prim) => {
            let variant = prim.accessor();
            quote! {
                Accessor::#variant(|record: &Self| #by_value, |record: &mut Self, value| { #assign })
            }
        }
        FieldKind::OptPrim(prim) => {
            let variant = prim.opt_accessor();
            quote! {
                Accessor::#variant(|record: &Self| #by_value, |record: &mut Self, value| { #assign })
            }
        }
        FieldKind::Str => quote! {
            Accessor::Str(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
        },
        FieldKind::Date => quote! {
            Accessor::Date(|record: &Self| #by_value, |record: &mut Self, value| { #assign })
        },
        FieldKind::Uuid => quote! {
            Accessor::Uuid(|record: &Self| #by_value, |record: &mut Self, value| { #assign })
        },
        FieldKind::Object => quote! {
            Accessor::Object(
                |record: &Self, out| -> EncodeResult<()> {
                    let value = #as_ref;
                    out.write_bool(value.is_some())?;
                    if let Some(value) = value {
                        #krate::bincode::serialize_into(#krate::io::IoWriter(out), value)?;
                    }
                    Ok(())
                },
                |record: &mut Self, input| -> DecodeResult<()> {
                    let value = if input.read_bool()? {
                        Some(#krate::bincode::deserialize_from(#krate::io::IoReader(input))?)
                    } else {
                        None
                    };
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::Enum(elem) => {
            let get = match &args.get {
                Some(getter) => quote!(record.#getter().map(|value| EnumValue::ordinal(&value))),
                None => quote!(record.#member.as_ref().map(EnumValue::ordinal)),
            };
            let set = store(quote!(value.and_then(<#elem as EnumValue>::from_ordinal)));
            quote! {
                Accessor::Enum(|record: &Self| #get, |record: &mut Self, value| { #set })
            }
        }
        FieldKind::EnumSet(_) => {
            let set = store(quote!(value.map(EnumSet::from_bits)));
            quote! {
                Accessor::EnumSet(
                    |record: &Self| #by_value.map(|set| set.bits()),
                    |record: &mut Self, value| { #set },
                )
            }
        }
        FieldKind::Record(Some(elem)) => quote! {
            Accessor::Record(
                |record: &Self| #as_ref.map(|value| value as &dyn ErasedExternalizable),
                |record: &mut Self, value| -> DecodeResult<()> {
                    let value = match value {
                        Some(instance) => Some(#krate::downcast_record::<#elem>(instance)?),
                        None => None,
                    };
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::Record(None) => quote! {
            Accessor::Record(
                |record: &Self| #as_deref,
                |record: &mut Self, value| -> DecodeResult<()> {
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::StrArray => quote! {
            Accessor::StrArray(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
        },
        FieldKind::DateArray => quote! {
            Accessor::DateArray(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
        },
        FieldKind::PrimArray(prim) => {
            let variant = prim
                .array_accessor()
                .expect("classification admits only arrayable primitives");
            quote! {
                Accessor::#variant(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
            }
        }
        FieldKind::StrArrayArray => quote! {
            Accessor::StrArrayArray(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
        },
        FieldKind::DateArrayArray => quote! {
            Accessor::DateArrayArray(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
        },
        FieldKind::PrimArrayArray(prim) => {
            let variant = format_ident!(
                "{}Array",
                prim.array_accessor()
                    .expect("classification admits only arrayable primitives")
            );
            quote! {
                Accessor::#variant(|record: &Self| #as_deref, |record: &mut Self, value| { #assign })
            }
        }
        FieldKind::RecordArray(Some(elem)) => quote! {
            Accessor::RecordArray(
                |record: &Self| #as_ref.map(|items| {
                    items
                        .iter()
                        .map(|item| item.as_ref().map(|value| value as &dyn ErasedExternalizable))
                        .collect()
                }),
                |record: &mut Self, value| -> DecodeResult<()> {
                    let value = match value {
                        Some(items) => {
                            let mut out = Vec::with_capacity(items.len());
                            for item in items {
                                out.push(match item {
                                    Some(instance) => {
                                        Some(#krate::downcast_record::<#elem>(instance)?)
                                    }
                                    None => None,
                                });
                            }
                            Some(out)
                        }
                        None => None,
                    };
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::RecordArray(None) => quote! {
            Accessor::RecordArray(
                |record: &Self| #as_ref.map(|items| {
                    items.iter().map(|item| item.as_deref()).collect()
                }),
                |record: &mut Self, value| -> DecodeResult<()> {
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::RecordArrayArray(Some(elem)) => quote! {
            Accessor::RecordArrayArray(
                |record: &Self| #as_ref.map(|rows| {
                    rows.iter()
                        .map(|row| row.as_ref().map(|items| {
                            items
                                .iter()
                                .map(|item| {
                                    item.as_ref().map(|value| value as &dyn ErasedExternalizable)
                                })
                                .collect()
                        }))
                        .collect()
                }),
                |record: &mut Self, value| -> DecodeResult<()> {
                    let value = match value {
                        Some(rows) => {
                            let mut out_rows = Vec::with_capacity(rows.len());
                            for row in rows {
                                out_rows.push(match row {
                                    Some(items) => {
                                        let mut out = Vec::with_capacity(items.len());
                                        for item in items {
                                            out.push(match item {
                                                Some(instance) => Some(
                                                    #krate::downcast_record::<#elem>(instance)?,
                                                ),
                                                None => None,
                                            });
                                        }
                                        Some(out)
                                    }
                                    None => None,
                                });
                            }
                            Some(out_rows)
                        }
                        None => None,
                    };
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::RecordArrayArray(None) => quote! {
            Accessor::RecordArrayArray(
                |record: &Self| #as_ref.map(|rows| {
                    rows.iter()
                        .map(|row| {
                            row.as_ref()
                                .map(|items| items.iter().map(|item| item.as_deref()).collect())
                        })
                        .collect()
                }),
                |record: &mut Self, value| -> DecodeResult<()> {
                    #assign
                    Ok(())
                },
            )
        },
        FieldKind::RecordList => quote! {
            Accessor::RecordList(|record: &Self| #as_ref, |record: &mut Self, value| { #assign })
        },
        FieldKind::StrList => quote! {
            Accessor::StrList(|record: &Self| #as_ref, |record: &mut Self, value| { #assign })
        },
    }
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn single_type_arg(seg: &PathSegment) -> Option<&Type> {
    match &seg.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(ty)) => Some(ty),
            _ => None,
        },
        _ => None,
    }
}

/// `name<T>` -> `T`.
fn inner_of<'a>(ty: &'a Type, name: &str) -> Option<&'a Type> {
    let seg = last_segment(ty)?;
    if seg.ident == name {
        single_type_arg(seg)
    } else {
        None
    }
}

fn is_bare(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|seg| seg.ident == name && seg.arguments.is_none())
}

/// `DateTime<Utc>` by any path.
fn is_datetime(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|seg| seg.ident == "DateTime")
}

/// `Box<dyn ...>`, a polymorphic record slot.
fn is_box_dyn(ty: &Type) -> bool {
    inner_of(ty, "Box").is_some_and(|inner| matches!(inner, Type::TraitObject(_)))
}

/// A type path we do not otherwise recognize, taken to be a nested record.
fn is_user_path(ty: &Type) -> bool {
    matches!(ty, Type::Path(_))
}
