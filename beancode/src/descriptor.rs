//! Per-record field descriptors.
//!
//! A [`Descriptor`] is the frozen table that drives encode and decode: one
//! entry per externalized member, sorted ascending by field index. It is
//! built once per record type, on first use, and installed in a
//! process-wide cache keyed by `TypeId`. Two threads may race to build the
//! same descriptor; both results are structurally equal, either may win the
//! install and the loser is dropped. A declaration error is never cached;
//! it is rebuilt and re-reported on every use.
use {
    crate::{
        error::{ConfigError, DecodeResult, EncodeResult},
        field_type::FieldType,
        io::{Input, Output},
        list::WireList,
        registry::ClassEntry,
        ErasedExternalizable, Externalizable,
    },
    chrono::{DateTime, Utc},
    parking_lot::RwLock,
    std::{
        any::{Any, TypeId},
        collections::HashMap,
        sync::LazyLock,
    },
    uuid::Uuid,
};

type Get<R, V> = fn(&R) -> V;
type Set<R, V> = fn(&mut R, V);
type SetChecked<R, V> = fn(&mut R, V) -> DecodeResult<()>;

/// Borrowed view of a nullable nested record.
pub type RecordRef<'a> = Option<&'a dyn ErasedExternalizable>;
/// Owned nullable nested record, as produced by the decoder.
pub type RecordBox = Option<Box<dyn ErasedExternalizable>>;

/// Typed access to one field of a record.
///
/// Each variant pairs a getter and a setter over the field's wire view;
/// together with the field index this is everything the encoder and decoder
/// need. The variant also fixes the field's wire encoding: enum access is
/// erased to ordinals, enum-set access to bitsets, and nested-record access
/// to [`ErasedExternalizable`] trait objects, so the state machines never
/// see user types.
///
/// The derive macro builds accessors from non-capturing closures, either
/// over the field itself or over a getter/setter method pair; the two are
/// indistinguishable here.
pub enum Accessor<R> {
    I32(Get<R, i32>, Set<R, i32>),
    Bool(Get<R, bool>, Set<R, bool>),
    I8(Get<R, i8>, Set<R, i8>),
    /// A UTF-16 code unit; the wire stores exactly two bytes.
    Char16(Get<R, u16>, Set<R, u16>),
    F64(Get<R, f64>, Set<R, f64>),
    F32(Get<R, f32>, Set<R, f32>),
    I64(Get<R, i64>, Set<R, i64>),
    I16(Get<R, i16>, Set<R, i16>),
    Str(for<'a> fn(&'a R) -> Option<&'a str>, Set<R, Option<String>>),
    Date(Get<R, Option<DateTime<Utc>>>, Set<R, Option<DateTime<Utc>>>),
    OptI32(Get<R, Option<i32>>, Set<R, Option<i32>>),
    OptBool(Get<R, Option<bool>>, Set<R, Option<bool>>),
    OptI8(Get<R, Option<i8>>, Set<R, Option<i8>>),
    OptChar16(Get<R, Option<u16>>, Set<R, Option<u16>>),
    OptF64(Get<R, Option<f64>>, Set<R, Option<f64>>),
    OptF32(Get<R, Option<f32>>, Set<R, Option<f32>>),
    OptI64(Get<R, Option<i64>>, Set<R, Option<i64>>),
    OptI16(Get<R, Option<i16>>, Set<R, Option<i16>>),
    Record(for<'a> fn(&'a R) -> RecordRef<'a>, SetChecked<R, RecordBox>),
    StrArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<String>]>,
        Set<R, Option<Vec<Option<String>>>>,
    ),
    DateArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<DateTime<Utc>>]>,
        Set<R, Option<Vec<Option<DateTime<Utc>>>>>,
    ),
    I32Array(for<'a> fn(&'a R) -> Option<&'a [i32]>, Set<R, Option<Vec<i32>>>),
    I8Array(for<'a> fn(&'a R) -> Option<&'a [i8]>, Set<R, Option<Vec<i8>>>),
    F64Array(for<'a> fn(&'a R) -> Option<&'a [f64]>, Set<R, Option<Vec<f64>>>),
    F32Array(for<'a> fn(&'a R) -> Option<&'a [f32]>, Set<R, Option<Vec<f32>>>),
    I64Array(for<'a> fn(&'a R) -> Option<&'a [i64]>, Set<R, Option<Vec<i64>>>),
    RecordList(
        for<'a> fn(&'a R) -> Option<&'a WireList<Box<dyn ErasedExternalizable>>>,
        Set<R, Option<WireList<Box<dyn ErasedExternalizable>>>>,
    ),
    RecordArray(
        for<'a> fn(&'a R) -> Option<Vec<RecordRef<'a>>>,
        SetChecked<R, Option<Vec<RecordBox>>>,
    ),
    RecordArrayArray(
        for<'a> fn(&'a R) -> Option<Vec<Option<Vec<RecordRef<'a>>>>>,
        SetChecked<R, Option<Vec<Option<Vec<RecordBox>>>>>,
    ),
    /// Opaque fallback: the pair writes and reads the whole payload,
    /// including the null flag, through the stream's object primitive.
    Object(
        fn(&R, &mut dyn Output) -> EncodeResult<()>,
        fn(&mut R, &mut dyn Input) -> DecodeResult<()>,
    ),
    Uuid(Get<R, Option<Uuid>>, Set<R, Option<Uuid>>),
    StrArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<Option<String>>>]>,
        Set<R, Option<Vec<Option<Vec<Option<String>>>>>>,
    ),
    DateArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<Option<DateTime<Utc>>>>]>,
        Set<R, Option<Vec<Option<Vec<Option<DateTime<Utc>>>>>>>,
    ),
    I32ArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<i32>>]>,
        Set<R, Option<Vec<Option<Vec<i32>>>>>,
    ),
    I8ArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<i8>>]>,
        Set<R, Option<Vec<Option<Vec<i8>>>>>,
    ),
    F64ArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<f64>>]>,
        Set<R, Option<Vec<Option<Vec<f64>>>>>,
    ),
    F32ArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<f32>>]>,
        Set<R, Option<Vec<Option<Vec<f32>>>>>,
    ),
    I64ArrayArray(
        for<'a> fn(&'a R) -> Option<&'a [Option<Vec<i64>>]>,
        Set<R, Option<Vec<Option<Vec<i64>>>>>,
    ),
    /// Ordinal view of a nullable enum field. The setter receives the wire
    /// ordinal; unknown ordinals must store as the field's default.
    Enum(Get<R, Option<u32>>, Set<R, Option<u32>>),
    /// Bitset view of a nullable enum-set field.
    EnumSet(Get<R, Option<u64>>, Set<R, Option<u64>>),
    StrList(
        for<'a> fn(&'a R) -> Option<&'a WireList<String>>,
        Set<R, Option<WireList<String>>>,
    ),
}

impl<R> Accessor<R> {
    /// The wire encoding this accessor implies.
    pub const fn field_type(&self) -> FieldType {
        match self {
            Accessor::I32(..) => FieldType::PInt,
            Accessor::Bool(..) => FieldType::PBoolean,
            Accessor::I8(..) => FieldType::PByte,
            Accessor::Char16(..) => FieldType::PChar,
            Accessor::F64(..) => FieldType::PDouble,
            Accessor::F32(..) => FieldType::PFloat,
            Accessor::I64(..) => FieldType::PLong,
            Accessor::I16(..) => FieldType::PShort,
            Accessor::Str(..) => FieldType::String,
            Accessor::Date(..) => FieldType::Date,
            Accessor::OptI32(..) => FieldType::Integer,
            Accessor::OptBool(..) => FieldType::Boolean,
            Accessor::OptI8(..) => FieldType::Byte,
            Accessor::OptChar16(..) => FieldType::Character,
            Accessor::OptF64(..) => FieldType::Double,
            Accessor::OptF32(..) => FieldType::Float,
            Accessor::OptI64(..) => FieldType::Long,
            Accessor::OptI16(..) => FieldType::Short,
            Accessor::Record(..) => FieldType::Externalizable,
            Accessor::StrArray(..) => FieldType::StringArray,
            Accessor::DateArray(..) => FieldType::DateArray,
            Accessor::I32Array(..) => FieldType::PIntArray,
            Accessor::I8Array(..) => FieldType::PByteArray,
            Accessor::F64Array(..) => FieldType::PDoubleArray,
            Accessor::F32Array(..) => FieldType::PFloatArray,
            Accessor::I64Array(..) => FieldType::PLongArray,
            Accessor::RecordList(..) => FieldType::ListOfExternalizables,
            Accessor::RecordArray(..) => FieldType::ExternalizableArray,
            Accessor::RecordArrayArray(..) => FieldType::ExternalizableArrayArray,
            Accessor::Object(..) => FieldType::Object,
            Accessor::Uuid(..) => FieldType::Uuid,
            Accessor::StrArrayArray(..) => FieldType::StringArrayArray,
            Accessor::DateArrayArray(..) => FieldType::DateArrayArray,
            Accessor::I32ArrayArray(..) => FieldType::PIntArrayArray,
            Accessor::I8ArrayArray(..) => FieldType::PByteArrayArray,
            Accessor::F64ArrayArray(..) => FieldType::PDoubleArrayArray,
            Accessor::F32ArrayArray(..) => FieldType::PFloatArrayArray,
            Accessor::I64ArrayArray(..) => FieldType::PLongArrayArray,
            Accessor::Enum(..) => FieldType::Enum,
            Accessor::EnumSet(..) => FieldType::EnumSet,
            Accessor::StrList(..) => FieldType::ListOfStrings,
        }
    }
}

/// One externalized member of a record.
pub struct FieldMeta<R> {
    /// Stable wire identifier, 0..=127, never reused with a new meaning.
    pub index: u8,
    /// Member name, for error messages.
    pub name: &'static str,
    pub accessor: Accessor<R>,
    /// Class whose name is elided on the wire for nested-record fields:
    /// the declared type for a concrete field, the `default =` class for a
    /// polymorphic one. `None` means every instance writes its class name.
    pub default_class: Option<ClassEntry>,
    /// Declared variant count of an enum-set field, checked against the
    /// 64-bit bitset at descriptor build.
    pub enum_arity: Option<usize>,
}

impl<R> FieldMeta<R> {
    pub fn new(index: u8, name: &'static str, accessor: Accessor<R>) -> Self {
        FieldMeta {
            index,
            name,
            accessor,
            default_class: None,
            enum_arity: None,
        }
    }

    pub fn with_default_class(mut self, entry: ClassEntry) -> Self {
        self.default_class = Some(entry);
        self
    }

    pub fn with_enum_arity(mut self, count: usize) -> Self {
        self.enum_arity = Some(count);
        self
    }
}

/// The frozen field table of one record type.
pub struct Descriptor<R> {
    class_name: &'static str,
    fields: Vec<FieldMeta<R>>,
}

impl<R: Externalizable> Descriptor<R> {
    fn build() -> Result<Self, ConfigError> {
        let class = R::CLASS_NAME;
        let mut fields = R::field_metas();
        if fields.is_empty() {
            return Err(ConfigError::NoFields { class });
        }
        for field in &fields {
            if field.index > 127 {
                return Err(ConfigError::IndexOutOfRange {
                    class,
                    field: field.name,
                    index: field.index,
                });
            }
            if let Some(count) = field.enum_arity {
                if count > 64 {
                    return Err(ConfigError::TooManyEnumValues {
                        class,
                        field: field.name,
                        count,
                    });
                }
            }
        }
        fields.sort_by_key(|field| field.index);
        for pair in fields.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(ConfigError::DuplicateIndex {
                    class,
                    field: pair[1].name,
                    index: pair[1].index,
                });
            }
        }
        Ok(Descriptor {
            class_name: class,
            fields,
        })
    }

    /// The cached descriptor for `R`, building it on first use.
    pub fn get() -> Result<&'static Descriptor<R>, ConfigError> {
        let key = TypeId::of::<R>();
        if let Some(&cached) = CACHE.read().get(&key) {
            return Ok(expect_descriptor(cached));
        }
        let built = Descriptor::<R>::build()?;
        let mut cache = CACHE.write();
        let installed = cache
            .entry(key)
            .or_insert_with(|| Box::leak(Box::new(built)));
        Ok(expect_descriptor(*installed))
    }
}

impl<R> Descriptor<R> {
    #[inline]
    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    /// Entries sorted ascending by field index.
    #[inline]
    pub fn fields(&self) -> &[FieldMeta<R>] {
        &self.fields
    }
}

static CACHE: LazyLock<RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn expect_descriptor<R: Externalizable>(
    entry: &'static (dyn Any + Send + Sync),
) -> &'static Descriptor<R> {
    entry
        .downcast_ref()
        .expect("descriptor cache entry keyed by a foreign TypeId")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain {
        a: i32,
        b: i64,
    }

    impl Externalizable for Plain {
        const CLASS_NAME: &'static str = "descriptor.tests.Plain";

        fn field_metas() -> Vec<FieldMeta<Self>> {
            vec![
                FieldMeta::new(9, "b", Accessor::I64(|r| r.b, |r, v| r.b = v)),
                FieldMeta::new(2, "a", Accessor::I32(|r| r.a, |r, v| r.a = v)),
            ]
        }
    }

    #[derive(Default)]
    struct Duplicated {
        a: i32,
        b: i32,
    }

    impl Externalizable for Duplicated {
        const CLASS_NAME: &'static str = "descriptor.tests.Duplicated";

        fn field_metas() -> Vec<FieldMeta<Self>> {
            vec![
                FieldMeta::new(1, "a", Accessor::I32(|r| r.a, |r, v| r.a = v)),
                FieldMeta::new(1, "b", Accessor::I32(|r| r.b, |r, v| r.b = v)),
            ]
        }
    }

    #[derive(Default)]
    struct Empty;

    impl Externalizable for Empty {
        const CLASS_NAME: &'static str = "descriptor.tests.Empty";

        fn field_metas() -> Vec<FieldMeta<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn fields_are_sorted_by_index() {
        let desc = Descriptor::<Plain>::get().unwrap();
        let indexes: Vec<u8> = desc.fields().iter().map(|f| f.index).collect();
        assert_eq!(indexes, [2, 9]);
    }

    #[test]
    fn cache_returns_the_same_table() {
        let first = Descriptor::<Plain>::get().unwrap() as *const _;
        let second = Descriptor::<Plain>::get().unwrap() as *const _;
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_index_is_rejected() {
        assert!(matches!(
            Descriptor::<Duplicated>::get(),
            Err(ConfigError::DuplicateIndex { index: 1, .. })
        ));
        // Errors are not cached; the rejection repeats.
        assert!(Descriptor::<Duplicated>::get().is_err());
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            Descriptor::<Empty>::get(),
            Err(ConfigError::NoFields { .. })
        ));
    }
}
