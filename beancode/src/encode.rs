//! The encoder: walks a record's descriptor in field-index order and emits
//! the wire form.
//!
//! Length-dynamic fields are materialized into a per-thread scratch buffer
//! first, then flushed behind their 4-byte length prefix.
use {
    crate::{
        descriptor::{Accessor, Descriptor, FieldMeta, RecordRef},
        error::{sequence_too_long, ConfigError, EncodeResult},
        io::Output,
        list::{ListKind, WireList},
        registry::ClassEntry,
        scratch::with_scratch,
        ErasedExternalizable, Externalizable,
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

pub(crate) fn write_fields<R: Externalizable>(
    record: &R,
    desc: &Descriptor<R>,
    out: &mut dyn Output,
) -> EncodeResult<()> {
    out.write_u8(desc.fields().len() as u8)?;
    for field in desc.fields() {
        let field_type = field.accessor.field_type();
        out.write_u8(field.index)?;
        out.write_u8(field_type.id())?;
        if field_type.is_length_dynamic() {
            with_scratch(|buf| {
                write_value(record, field, &mut *buf)?;
                out.write_u32(seq_len(buf.len())?)?;
                out.write_bytes(buf)
            })?;
        } else {
            write_value(record, field, out)?;
        }
    }
    Ok(())
}

macro_rules! write_boxed {
    ($out:ident, $value:expr, $write:ident) => {{
        let value = $value;
        $out.write_bool(value.is_some())?;
        if let Some(value) = value {
            $out.$write(value)?;
        }
        Ok(())
    }};
}

fn write_value<R>(record: &R, field: &FieldMeta<R>, out: &mut dyn Output) -> EncodeResult<()> {
    let default_class = field.default_class.as_ref();
    match &field.accessor {
        Accessor::I32(get, _) => out.write_i32(get(record)),
        Accessor::Bool(get, _) => out.write_bool(get(record)),
        Accessor::I8(get, _) => out.write_i8(get(record)),
        Accessor::Char16(get, _) => out.write_u16(get(record)),
        Accessor::F64(get, _) => out.write_f64(get(record)),
        Accessor::F32(get, _) => out.write_f32(get(record)),
        Accessor::I64(get, _) => out.write_i64(get(record)),
        Accessor::I16(get, _) => out.write_i16(get(record)),
        Accessor::Str(get, _) => write_opt_str(out, get(record)),
        Accessor::Date(get, _) => write_opt_date(out, get(record)),
        Accessor::OptI32(get, _) => write_boxed!(out, get(record), write_i32),
        Accessor::OptBool(get, _) => write_boxed!(out, get(record), write_bool),
        Accessor::OptI8(get, _) => write_boxed!(out, get(record), write_i8),
        Accessor::OptChar16(get, _) => write_boxed!(out, get(record), write_u16),
        Accessor::OptF64(get, _) => write_boxed!(out, get(record), write_f64),
        Accessor::OptF32(get, _) => write_boxed!(out, get(record), write_f32),
        Accessor::OptI64(get, _) => write_boxed!(out, get(record), write_i64),
        Accessor::OptI16(get, _) => write_boxed!(out, get(record), write_i16),
        Accessor::Record(get, _) => write_nested(out, get(record), default_class),
        Accessor::StrArray(get, _) => write_str_array(out, get(record)),
        Accessor::DateArray(get, _) => write_date_array(out, get(record)),
        Accessor::I32Array(get, _) => write_prim_array(out, get(record), |out, v| out.write_i32(*v)),
        Accessor::I8Array(get, _) => write_prim_array(out, get(record), |out, v| out.write_i8(*v)),
        Accessor::F64Array(get, _) => write_prim_array(out, get(record), |out, v| out.write_f64(*v)),
        Accessor::F32Array(get, _) => write_prim_array(out, get(record), |out, v| out.write_f32(*v)),
        Accessor::I64Array(get, _) => write_prim_array(out, get(record), |out, v| out.write_i64(*v)),
        Accessor::RecordList(get, _) => match default_class {
            Some(default) => write_record_list(out, get(record), default),
            None => Err(missing_default(field)),
        },
        Accessor::RecordArray(get, _) => write_record_array(out, get(record), default_class),
        Accessor::RecordArrayArray(get, _) => {
            let rows = get(record);
            out.write_bool(rows.is_some())?;
            if let Some(rows) = rows {
                out.write_u32(seq_len(rows.len())?)?;
                for row in rows {
                    write_record_array(out, row, default_class)?;
                }
            }
            Ok(())
        }
        Accessor::Object(write, _) => write(record, out),
        Accessor::Uuid(get, _) => write_opt_uuid(out, get(record)),
        Accessor::StrArrayArray(get, _) => {
            write_array_of(out, get(record), |out, row| {
                write_str_array(out, row.as_deref())
            })
        }
        Accessor::DateArrayArray(get, _) => {
            write_array_of(out, get(record), |out, row| {
                write_date_array(out, row.as_deref())
            })
        }
        Accessor::I32ArrayArray(get, _) => write_array_of(out, get(record), |out, row| {
            write_prim_array(out, row.as_deref(), |out, v| out.write_i32(*v))
        }),
        Accessor::I8ArrayArray(get, _) => write_array_of(out, get(record), |out, row| {
            write_prim_array(out, row.as_deref(), |out, v| out.write_i8(*v))
        }),
        Accessor::F64ArrayArray(get, _) => write_array_of(out, get(record), |out, row| {
            write_prim_array(out, row.as_deref(), |out, v| out.write_f64(*v))
        }),
        Accessor::F32ArrayArray(get, _) => write_array_of(out, get(record), |out, row| {
            write_prim_array(out, row.as_deref(), |out, v| out.write_f32(*v))
        }),
        Accessor::I64ArrayArray(get, _) => write_array_of(out, get(record), |out, row| {
            write_prim_array(out, row.as_deref(), |out, v| out.write_i64(*v))
        }),
        Accessor::Enum(get, _) => {
            let ordinal = get(record);
            out.write_bool(ordinal.is_some())?;
            if let Some(ordinal) = ordinal {
                out.write_i32(ordinal as i32)?;
            }
            Ok(())
        }
        Accessor::EnumSet(get, _) => write_boxed!(out, get(record), write_u64),
        Accessor::StrList(get, _) => write_str_list(out, get(record)),
    }
}

fn write_opt_str(out: &mut dyn Output, value: Option<&str>) -> EncodeResult<()> {
    out.write_bool(value.is_some())?;
    if let Some(value) = value {
        out.write_utf(value)?;
    }
    Ok(())
}

fn write_opt_date(out: &mut dyn Output, value: Option<DateTime<Utc>>) -> EncodeResult<()> {
    out.write_bool(value.is_some())?;
    if let Some(value) = value {
        out.write_i64(value.timestamp_millis())?;
    }
    Ok(())
}

fn write_opt_uuid(out: &mut dyn Output, value: Option<Uuid>) -> EncodeResult<()> {
    out.write_bool(value.is_some())?;
    if let Some(value) = value {
        let (msb, lsb) = value.as_u64_pair();
        out.write_u64(msb)?;
        out.write_u64(lsb)?;
    }
    Ok(())
}

fn write_str_array(out: &mut dyn Output, items: Option<&[Option<String>]>) -> EncodeResult<()> {
    out.write_bool(items.is_some())?;
    if let Some(items) = items {
        out.write_u32(seq_len(items.len())?)?;
        for item in items {
            write_opt_str(out, item.as_deref())?;
        }
    }
    Ok(())
}

fn write_date_array(
    out: &mut dyn Output,
    items: Option<&[Option<DateTime<Utc>>]>,
) -> EncodeResult<()> {
    out.write_bool(items.is_some())?;
    if let Some(items) = items {
        out.write_u32(seq_len(items.len())?)?;
        for item in items {
            write_opt_date(out, *item)?;
        }
    }
    Ok(())
}

fn write_prim_array<T>(
    out: &mut dyn Output,
    items: Option<&[T]>,
    write_elem: fn(&mut dyn Output, &T) -> EncodeResult<()>,
) -> EncodeResult<()> {
    out.write_bool(items.is_some())?;
    if let Some(items) = items {
        out.write_u32(seq_len(items.len())?)?;
        for item in items {
            write_elem(out, item)?;
        }
    }
    Ok(())
}

/// Outer layer of the two-dimensional encodings: a null flag, a row count,
/// then one full inner-array payload per row.
fn write_array_of<T>(
    out: &mut dyn Output,
    rows: Option<&[T]>,
    mut write_row: impl FnMut(&mut dyn Output, &T) -> EncodeResult<()>,
) -> EncodeResult<()> {
    out.write_bool(rows.is_some())?;
    if let Some(rows) = rows {
        out.write_u32(seq_len(rows.len())?)?;
        for row in rows {
            write_row(out, row)?;
        }
    }
    Ok(())
}

fn write_nested(
    out: &mut dyn Output,
    instance: RecordRef<'_>,
    default: Option<&ClassEntry>,
) -> EncodeResult<()> {
    out.write_bool(instance.is_some())?;
    if let Some(instance) = instance {
        let name = instance.class_name();
        let is_default = default.is_some_and(|d| d.name() == name);
        out.write_bool(is_default)?;
        if !is_default {
            out.write_utf(name)?;
        }
        instance.write_record(out)?;
    }
    Ok(())
}

fn write_record_array(
    out: &mut dyn Output,
    items: Option<Vec<RecordRef<'_>>>,
    default: Option<&ClassEntry>,
) -> EncodeResult<()> {
    out.write_bool(items.is_some())?;
    if let Some(items) = items {
        out.write_u32(seq_len(items.len())?)?;
        let mut last_non_default = None;
        for instance in items {
            write_element(out, instance, default, &mut last_non_default)?;
        }
    }
    Ok(())
}

/// One element of an externalizable array or list. A run of elements of the
/// same non-default class emits the class name once; followers carry only
/// the same-as-last flag.
fn write_element(
    out: &mut dyn Output,
    instance: RecordRef<'_>,
    default: Option<&ClassEntry>,
    last_non_default: &mut Option<&'static str>,
) -> EncodeResult<()> {
    out.write_bool(instance.is_some())?;
    if let Some(instance) = instance {
        let name = instance.class_name();
        let is_default = default.is_some_and(|d| d.name() == name);
        out.write_bool(is_default)?;
        if !is_default {
            let same_as_last = *last_non_default == Some(name);
            out.write_bool(same_as_last)?;
            if !same_as_last {
                out.write_utf(name)?;
                *last_non_default = Some(name);
            }
        }
        instance.write_record(out)?;
    }
    Ok(())
}

fn write_record_list(
    out: &mut dyn Output,
    list: Option<&WireList<Box<dyn ErasedExternalizable>>>,
    default: &ClassEntry,
) -> EncodeResult<()> {
    out.write_bool(list.is_some())?;
    if let Some(list) = list {
        out.write_bool(list.kind.is_default())?;
        out.write_u32(seq_len(list.items.len())?)?;
        if let ListKind::Named(name) = &list.kind {
            out.write_utf(name)?;
        }
        out.write_utf(default.name())?;
        let mut last_non_default = None;
        for instance in &list.items {
            write_element(out, instance.as_deref(), Some(default), &mut last_non_default)?;
        }
    }
    Ok(())
}

fn write_str_list(out: &mut dyn Output, list: Option<&WireList<String>>) -> EncodeResult<()> {
    out.write_bool(list.is_some())?;
    if let Some(list) = list {
        out.write_bool(list.kind.is_default())?;
        out.write_u32(seq_len(list.items.len())?)?;
        if let ListKind::Named(name) = &list.kind {
            out.write_utf(name)?;
        }
        for item in &list.items {
            write_opt_str(out, item.as_deref())?;
        }
    }
    Ok(())
}

#[inline]
fn seq_len(len: usize) -> EncodeResult<u32> {
    u32::try_from(len).map_err(|_| sequence_too_long(len))
}

#[cold]
fn missing_default<R>(field: &FieldMeta<R>) -> crate::error::EncodeError {
    ConfigError::MissingDefaultClass {
        field: field.name,
        index: field.index,
    }
    .into()
}
