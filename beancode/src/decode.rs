//! The decoder: a two-sided sorted merge between the record's descriptor
//! and the fields actually present on the wire.
//!
//! Known fields are decoded through their accessor. Unknown length-dynamic
//! fields are skipped via their 4-byte prefix; other unknown fields are read
//! per their wire tag and discarded. Unknown tag ids are rejected; there is
//! no safe way to guess a payload shape.
use {
    crate::{
        descriptor::{Accessor, Descriptor, FieldMeta, RecordBox},
        error::{invalid_value, unknown_field_type, unskippable_field, DecodeResult},
        field_type::FieldType,
        io::Input,
        list::{ListKind, WireList},
        registry::{self, ClassEntry},
        ErasedExternalizable, Externalizable,
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

/// Ceiling for speculative `Vec::with_capacity` from wire-declared sizes.
/// The declared length itself is honored; only the up-front reservation is
/// capped so a corrupt size cannot reserve gigabytes before the first
/// element read fails.
const PREALLOC_CAP: usize = 1024;

pub(crate) fn read_fields<R: Externalizable>(
    record: &mut R,
    desc: &Descriptor<R>,
    input: &mut dyn Input,
) -> DecodeResult<()> {
    let field_count = input.read_u8()?;
    let fields = desc.fields();
    let mut j = 0;
    for _ in 0..field_count {
        let index = input.read_u8()?;
        let tag = input.read_u8()?;

        // Wire fields arrive in ascending index order, as does the
        // descriptor; one linear cursor resolves the merge.
        while fields[j].index < index && j < fields.len() - 1 {
            j += 1;
        }

        if fields[j].index == index {
            let field = &fields[j];
            if field.accessor.field_type().is_length_dynamic() {
                input.read_u32()?;
            }
            read_value(record, field, input)?;
        } else {
            let field_type = FieldType::from_id(tag).ok_or_else(|| unknown_field_type(tag))?;
            if field_type.is_length_dynamic() {
                let size = input.read_u32()?;
                input.skip_bytes(size as usize)?;
            } else {
                discard_value(field_type, input)?;
            }
        }
    }
    Ok(())
}

macro_rules! read_boxed {
    ($record:ident, $input:ident, $set:ident, $read:ident) => {{
        let value = if $input.read_bool()? {
            Some($input.$read()?)
        } else {
            None
        };
        $set($record, value);
        Ok(())
    }};
}

fn read_value<R>(record: &mut R, field: &FieldMeta<R>, input: &mut dyn Input) -> DecodeResult<()> {
    let default_class = field.default_class.as_ref();
    match &field.accessor {
        Accessor::I32(_, set) => {
            set(record, input.read_i32()?);
            Ok(())
        }
        Accessor::Bool(_, set) => {
            set(record, input.read_bool()?);
            Ok(())
        }
        Accessor::I8(_, set) => {
            set(record, input.read_i8()?);
            Ok(())
        }
        Accessor::Char16(_, set) => {
            set(record, input.read_u16()?);
            Ok(())
        }
        Accessor::F64(_, set) => {
            set(record, input.read_f64()?);
            Ok(())
        }
        Accessor::F32(_, set) => {
            set(record, input.read_f32()?);
            Ok(())
        }
        Accessor::I64(_, set) => {
            set(record, input.read_i64()?);
            Ok(())
        }
        Accessor::I16(_, set) => {
            set(record, input.read_i16()?);
            Ok(())
        }
        Accessor::Str(_, set) => {
            let value = read_opt_str(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::Date(_, set) => {
            let value = read_opt_date(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::OptI32(_, set) => read_boxed!(record, input, set, read_i32),
        Accessor::OptBool(_, set) => read_boxed!(record, input, set, read_bool),
        Accessor::OptI8(_, set) => read_boxed!(record, input, set, read_i8),
        Accessor::OptChar16(_, set) => read_boxed!(record, input, set, read_u16),
        Accessor::OptF64(_, set) => read_boxed!(record, input, set, read_f64),
        Accessor::OptF32(_, set) => read_boxed!(record, input, set, read_f32),
        Accessor::OptI64(_, set) => read_boxed!(record, input, set, read_i64),
        Accessor::OptI16(_, set) => read_boxed!(record, input, set, read_i16),
        Accessor::Record(_, set) => {
            let value = read_nested(input, default_class)?;
            set(record, value)
        }
        Accessor::StrArray(_, set) => {
            let value = read_str_array(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::DateArray(_, set) => {
            let value = read_date_array(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::I32Array(_, set) => {
            let value = read_prim_array(input, |input| input.read_i32())?;
            set(record, value);
            Ok(())
        }
        Accessor::I8Array(_, set) => {
            let value = read_prim_array(input, |input| input.read_i8())?;
            set(record, value);
            Ok(())
        }
        Accessor::F64Array(_, set) => {
            let value = read_prim_array(input, |input| input.read_f64())?;
            set(record, value);
            Ok(())
        }
        Accessor::F32Array(_, set) => {
            let value = read_prim_array(input, |input| input.read_f32())?;
            set(record, value);
            Ok(())
        }
        Accessor::I64Array(_, set) => {
            let value = read_prim_array(input, |input| input.read_i64())?;
            set(record, value);
            Ok(())
        }
        Accessor::RecordList(_, set) => {
            let value = read_record_list(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::RecordArray(_, set) => {
            let value = read_record_array(input, default_class)?;
            set(record, value)
        }
        Accessor::RecordArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_record_array(input, default_class))?;
            set(record, value)
        }
        Accessor::Object(_, read) => read(record, input),
        Accessor::Uuid(_, set) => {
            let value = read_opt_uuid(input)?;
            set(record, value);
            Ok(())
        }
        Accessor::StrArrayArray(_, set) => {
            let value = read_array_of(input, read_str_array)?;
            set(record, value);
            Ok(())
        }
        Accessor::DateArrayArray(_, set) => {
            let value = read_array_of(input, read_date_array)?;
            set(record, value);
            Ok(())
        }
        Accessor::I32ArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_prim_array(input, |i| i.read_i32()))?;
            set(record, value);
            Ok(())
        }
        Accessor::I8ArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_prim_array(input, |i| i.read_i8()))?;
            set(record, value);
            Ok(())
        }
        Accessor::F64ArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_prim_array(input, |i| i.read_f64()))?;
            set(record, value);
            Ok(())
        }
        Accessor::F32ArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_prim_array(input, |i| i.read_f32()))?;
            set(record, value);
            Ok(())
        }
        Accessor::I64ArrayArray(_, set) => {
            let value = read_array_of(input, |input| read_prim_array(input, |i| i.read_i64()))?;
            set(record, value);
            Ok(())
        }
        Accessor::Enum(_, set) => {
            let value = if input.read_bool()? {
                Some(input.read_i32()? as u32)
            } else {
                None
            };
            set(record, value);
            Ok(())
        }
        Accessor::EnumSet(_, set) => read_boxed!(record, input, set, read_u64),
        Accessor::StrList(_, set) => {
            let value = read_str_list(input)?;
            set(record, value);
            Ok(())
        }
    }
}

fn read_opt_str(input: &mut dyn Input) -> DecodeResult<Option<String>> {
    if input.read_bool()? {
        Ok(Some(input.read_utf()?))
    } else {
        Ok(None)
    }
}

fn read_opt_date(input: &mut dyn Input) -> DecodeResult<Option<DateTime<Utc>>> {
    if input.read_bool()? {
        let millis = input.read_i64()?;
        DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| invalid_value("date is out of the representable range"))
    } else {
        Ok(None)
    }
}

fn read_opt_uuid(input: &mut dyn Input) -> DecodeResult<Option<Uuid>> {
    if input.read_bool()? {
        let msb = input.read_u64()?;
        let lsb = input.read_u64()?;
        Ok(Some(Uuid::from_u64_pair(msb, lsb)))
    } else {
        Ok(None)
    }
}

fn read_str_array(input: &mut dyn Input) -> DecodeResult<Option<Vec<Option<String>>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let size = input.read_u32()? as usize;
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    for _ in 0..size {
        items.push(read_opt_str(input)?);
    }
    Ok(Some(items))
}

fn read_date_array(input: &mut dyn Input) -> DecodeResult<Option<Vec<Option<DateTime<Utc>>>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let size = input.read_u32()? as usize;
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    for _ in 0..size {
        items.push(read_opt_date(input)?);
    }
    Ok(Some(items))
}

fn read_prim_array<T>(
    input: &mut dyn Input,
    read_elem: fn(&mut dyn Input) -> DecodeResult<T>,
) -> DecodeResult<Option<Vec<T>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let size = input.read_u32()? as usize;
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    for _ in 0..size {
        items.push(read_elem(input)?);
    }
    Ok(Some(items))
}

/// Outer layer of the two-dimensional encodings.
fn read_array_of<T>(
    input: &mut dyn Input,
    mut read_row: impl FnMut(&mut dyn Input) -> DecodeResult<T>,
) -> DecodeResult<Option<Vec<T>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let size = input.read_u32()? as usize;
    let mut rows = Vec::with_capacity(size.min(PREALLOC_CAP));
    for _ in 0..size {
        rows.push(read_row(input)?);
    }
    Ok(Some(rows))
}

fn read_nested(input: &mut dyn Input, default: Option<&ClassEntry>) -> DecodeResult<RecordBox> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let mut instance = if input.read_bool()? {
        declared_default(default)?.construct()
    } else {
        registry::construct_by_name(&input.read_utf()?)?
    };
    instance.read_record(input)?;
    Ok(Some(instance))
}

fn read_record_array(
    input: &mut dyn Input,
    default: Option<&ClassEntry>,
) -> DecodeResult<Option<Vec<RecordBox>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let size = input.read_u32()? as usize;
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    let mut last_non_default = None;
    for _ in 0..size {
        items.push(read_element(input, default, &mut last_non_default)?);
    }
    Ok(Some(items))
}

fn read_element(
    input: &mut dyn Input,
    default: Option<&ClassEntry>,
    last_non_default: &mut Option<&'static ClassEntry>,
) -> DecodeResult<RecordBox> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let mut instance = if input.read_bool()? {
        declared_default(default)?.construct()
    } else if input.read_bool()? {
        last_non_default
            .ok_or_else(|| invalid_value("same-as-last class flag before any class name"))?
            .construct()
    } else {
        let entry = registry::lookup(&input.read_utf()?)?;
        *last_non_default = Some(entry);
        entry.construct()
    };
    instance.read_record(input)?;
    Ok(Some(instance))
}

fn read_record_list(
    input: &mut dyn Input,
) -> DecodeResult<Option<WireList<Box<dyn ErasedExternalizable>>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let is_default_kind = input.read_bool()?;
    let size = input.read_u32()? as usize;
    let kind = if is_default_kind {
        ListKind::Default
    } else {
        ListKind::Named(input.read_utf()?)
    };
    // The default element class travels on the wire, so the list decodes
    // without any help from the descriptor.
    let default = registry::lookup(&input.read_utf()?)?;
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    let mut last_non_default = None;
    for _ in 0..size {
        items.push(read_element(input, Some(default), &mut last_non_default)?);
    }
    Ok(Some(WireList::with_kind(kind, items)))
}

fn read_str_list(input: &mut dyn Input) -> DecodeResult<Option<WireList<String>>> {
    if !input.read_bool()? {
        return Ok(None);
    }
    let is_default_kind = input.read_bool()?;
    let size = input.read_u32()? as usize;
    let kind = if is_default_kind {
        ListKind::Default
    } else {
        ListKind::Named(input.read_utf()?)
    };
    let mut items = Vec::with_capacity(size.min(PREALLOC_CAP));
    for _ in 0..size {
        items.push(read_opt_str(input)?);
    }
    Ok(Some(WireList::with_kind(kind, items)))
}

fn declared_default<'a>(default: Option<&'a ClassEntry>) -> DecodeResult<&'a ClassEntry> {
    default.ok_or_else(|| invalid_value("default-class instance without a declared default class"))
}

/// Read and drop an unknown field of fixed wire shape. Payload bytes are
/// traversed structurally; values are not validated.
fn discard_value(field_type: FieldType, input: &mut dyn Input) -> DecodeResult<()> {
    match field_type {
        FieldType::PInt | FieldType::PFloat => input.skip_bytes(4),
        FieldType::PBoolean | FieldType::PByte => input.skip_bytes(1),
        FieldType::PChar | FieldType::PShort => input.skip_bytes(2),
        FieldType::PDouble | FieldType::PLong => input.skip_bytes(8),
        FieldType::String => discard_flagged(input, skip_utf),
        FieldType::Date | FieldType::Long | FieldType::Double => {
            discard_flagged(input, |input| input.skip_bytes(8))
        }
        FieldType::Integer | FieldType::Float | FieldType::Enum => {
            discard_flagged(input, |input| input.skip_bytes(4))
        }
        FieldType::Boolean | FieldType::Byte => discard_flagged(input, |input| input.skip_bytes(1)),
        FieldType::Character | FieldType::Short => {
            discard_flagged(input, |input| input.skip_bytes(2))
        }
        FieldType::EnumSet => discard_flagged(input, |input| input.skip_bytes(8)),
        FieldType::Uuid => discard_flagged(input, |input| input.skip_bytes(16)),
        FieldType::StringArray => discard_counted(input, |input| discard_flagged(input, skip_utf)),
        FieldType::DateArray => {
            discard_counted(input, |input| discard_flagged(input, |i| i.skip_bytes(8)))
        }
        FieldType::PIntArray => discard_prim_array(input, 4),
        FieldType::PByteArray => discard_prim_array(input, 1),
        FieldType::PDoubleArray => discard_prim_array(input, 8),
        FieldType::PFloatArray => discard_prim_array(input, 4),
        FieldType::PLongArray => discard_prim_array(input, 8),
        FieldType::StringArrayArray => {
            discard_counted(input, |input| discard_value(FieldType::StringArray, input))
        }
        FieldType::DateArrayArray => {
            discard_counted(input, |input| discard_value(FieldType::DateArray, input))
        }
        FieldType::PIntArrayArray => discard_counted(input, |input| discard_prim_array(input, 4)),
        FieldType::PByteArrayArray => discard_counted(input, |input| discard_prim_array(input, 1)),
        FieldType::PDoubleArrayArray => {
            discard_counted(input, |input| discard_prim_array(input, 8))
        }
        FieldType::PFloatArrayArray => discard_counted(input, |input| discard_prim_array(input, 4)),
        FieldType::PLongArrayArray => discard_counted(input, |input| discard_prim_array(input, 8)),
        FieldType::ListOfStrings => {
            if !input.read_bool()? {
                return Ok(());
            }
            let is_default_kind = input.read_bool()?;
            let size = input.read_u32()? as usize;
            if !is_default_kind {
                skip_utf(input)?;
            }
            for _ in 0..size {
                discard_flagged(input, skip_utf)?;
            }
            Ok(())
        }
        // Element payloads have no length markers; the list can only be
        // traversed by decoding its elements through the registry.
        FieldType::ListOfExternalizables => read_record_list(input).map(drop),
        // The payload is an opaque object stream of unknowable length.
        FieldType::Object => Err(unskippable_field(field_type.id())),
        FieldType::Externalizable
        | FieldType::ExternalizableArray
        | FieldType::ExternalizableArrayArray => {
            unreachable!("length-dynamic fields are skipped by their length prefix")
        }
    }
}

fn discard_flagged(
    input: &mut dyn Input,
    skip_payload: impl FnOnce(&mut dyn Input) -> DecodeResult<()>,
) -> DecodeResult<()> {
    if input.read_bool()? {
        skip_payload(input)?;
    }
    Ok(())
}

fn discard_counted(
    input: &mut dyn Input,
    mut skip_elem: impl FnMut(&mut dyn Input) -> DecodeResult<()>,
) -> DecodeResult<()> {
    if !input.read_bool()? {
        return Ok(());
    }
    let size = input.read_u32()? as usize;
    for _ in 0..size {
        skip_elem(input)?;
    }
    Ok(())
}

fn discard_prim_array(input: &mut dyn Input, elem_width: usize) -> DecodeResult<()> {
    if !input.read_bool()? {
        return Ok(());
    }
    let size = input.read_u32()? as usize;
    input.skip_bytes(size.saturating_mul(elem_width))
}

fn skip_utf(input: &mut dyn Input) -> DecodeResult<()> {
    let len = input.read_u16()? as usize;
    input.skip_bytes(len)
}

#[cfg(all(test, feature = "derive"))]
mod tests {
    use {
        crate::{decode_from_slice, encode_to_vec},
        beancode_derive::{EnumValue, Externalizable},
    };

    #[derive(EnumValue, Debug, PartialEq, Clone, Copy)]
    #[externalize(internal)]
    enum Level {
        Low,
        High,
    }

    #[derive(Externalizable, Default, Debug, PartialEq)]
    #[externalize(internal)]
    struct Writer {
        #[externalize(index = 0)]
        count: i32,
        #[externalize(index = 1)]
        tags: Option<Vec<Option<String>>>,
        #[externalize(index = 2, enum_value)]
        level: Option<Level>,
        #[externalize(index = 3)]
        ratio: Option<f64>,
        #[externalize(index = 4)]
        tail: i64,
    }

    #[derive(Externalizable, Default, Debug, PartialEq)]
    #[externalize(internal)]
    struct TailOnly {
        #[externalize(index = 4)]
        tail: i64,
    }

    #[derive(Externalizable, Default, Debug, PartialEq)]
    #[externalize(internal)]
    struct Ends {
        #[externalize(index = 0)]
        count: i32,
        #[externalize(index = 4)]
        tail: i64,
    }

    fn writer() -> Writer {
        Writer {
            count: 3,
            tags: Some(vec![Some("a".into()), None]),
            level: Some(Level::High),
            ratio: Some(0.25),
            tail: -1,
        }
    }

    #[test]
    fn unknown_fixed_shape_fields_are_read_and_dropped() {
        let bytes = encode_to_vec(&writer()).unwrap();
        let read: TailOnly = decode_from_slice(&bytes).unwrap();
        assert_eq!(read.tail, -1);
    }

    #[test]
    fn merge_cursor_resolves_interleaved_unknowns() {
        let bytes = encode_to_vec(&writer()).unwrap();
        let read: Ends = decode_from_slice(&bytes).unwrap();
        assert_eq!(read, Ends { count: 3, tail: -1 });
    }

    #[test]
    fn absent_wire_fields_keep_their_defaults() {
        let bytes = encode_to_vec(&TailOnly { tail: 8 }).unwrap();
        let read: Writer = decode_from_slice(&bytes).unwrap();
        assert_eq!(
            read,
            Writer {
                tail: 8,
                ..Writer::default()
            }
        );
    }
}
