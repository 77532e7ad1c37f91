//! beancode is a compact binary codec for user-defined record types with
//! stable per-field indices.
//!
//! Every serialized record is self-describing: each field carries a 1-byte
//! index and a 1-byte wire-type tag, so readers and writers may disagree
//! about which fields exist. You can add, remove and reorder fields between
//! revisions of a record and old bytes stay readable by new code (and vice
//! versa); the one rule is that an index, once used, is never reused with a
//! different meaning.
//!
//! # Quickstart
//!
//! ```
//! use beancode::{Externalizable, decode_from_slice, encode_to_vec};
//!
//! #[derive(Externalizable, Default, Debug, PartialEq)]
//! struct Account {
//!     #[externalize(index = 0)]
//!     id: i64,
//!     #[externalize(index = 1)]
//!     name: Option<String>,
//!     #[externalize(index = 2)]
//!     balance: f64,
//! }
//!
//! let account = Account { id: 7, name: Some("maria".into()), balance: 12.5 };
//! let bytes = encode_to_vec(&account).unwrap();
//! let copy: Account = decode_from_slice(&bytes).unwrap();
//! assert_eq!(account, copy);
//! ```
//!
//! # Compatibility rules
//!
//! - Fields are written in ascending index order regardless of declaration
//!   order; the wire bytes do not depend on how the struct is laid out.
//! - A reader skips wire fields it does not declare, and leaves declared
//!   fields that are absent from the wire at their `Default` values.
//! - Enum fields are encoded by declaration-order ordinal: appending
//!   variants is compatible, reordering or removing them is not.
//! - The wire format follows Java data-stream conventions: big-endian
//!   integers and modified UTF-8 strings, so dumps written by the original
//!   JVM externalizer stay readable when class names are mapped with
//!   `#[externalize(name = "...")]`.
//!
//! # Supported field types
//!
//! Primitives (`i32`, `bool`, `i8`, `u16`, `f64`, `f32`, `i64`, `i16`) and
//! their nullable `Option` counterparts, `Option<String>`,
//! `Option<DateTime<Utc>>`, `Option<Uuid>`, one- and two-dimensional arrays
//! of primitives, strings and dates, nested records (concrete or boxed
//! `dyn` [`ErasedExternalizable`]), one- and two-dimensional arrays of
//! records, [`WireList`]s of strings or records, enums and [`EnumSet`]s.
//! Any other `serde`-serializable type can be carried with the opaque
//! `object` fallback, at the cost of cross-revision compatibility for that
//! field.
//!
//! # Derive attributes
//!
//! |Attribute|Where|Description|
//! |---|---|---|
//! |`index = N`|field|Stable wire index, 0..=127. Required.|
//! |`enum_value`|field|The field is `Option<E>` for an `EnumValue` enum.|
//! |`object`|field|Encode via the opaque `serde` fallback.|
//! |`default = Path`|field|Default element class for polymorphic record fields.|
//! |`get = path`, `set = path`|field|Access through a getter/setter pair instead of the field.|
//! |`name = "..."`|type|Wire class name (defaults to the module path + type name).|
//!
//! # Streams of records
//!
//! [`decode`] reports a clean end of input as [`DecodeError::Eof`], distinct
//! from decode failures, so concatenated records can be drained with a plain
//! loop:
//!
//! ```no_run
//! # use beancode::{DecodeError, Externalizable};
//! # #[derive(Externalizable, Default)]
//! # struct Event { #[externalize(index = 0)] id: i64 }
//! # fn run(mut reader: std::fs::File) -> Result<Vec<Event>, DecodeError> {
//! let mut events = Vec::new();
//! loop {
//!     match beancode::decode::<Event>(&mut reader) {
//!         Ok(event) => events.push(event),
//!         Err(e) if e.is_eof() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(events)
//! # }
//! ```
//!
//! # Concurrency
//!
//! The codec spawns no threads and never suspends. Field descriptors live in
//! a process-wide cache and are immutable once built; encode and decode are
//! safe concurrent readers. Scratch buffers for length-prefixed fields are
//! per thread. A single record instance must not be mutated while it is
//! being encoded or decoded.
use std::any::Any;

pub mod error;
pub use error::{ConfigError, DecodeError, DecodeResult, EncodeError, EncodeResult};
pub mod io;
pub use io::{Input, Output};
mod field_type;
pub use field_type::FieldType;
mod descriptor;
pub use descriptor::{Accessor, Descriptor, FieldMeta, RecordBox, RecordRef};
pub mod registry;
pub use registry::ClassEntry;
mod scratch;
mod decode;
mod encode;
mod enums;
pub use enums::{EnumSet, EnumValue};
mod list;
pub use list::{ListKind, WireList};
#[cfg(test)]
mod proptest_config;

#[cfg(feature = "derive")]
pub use beancode_derive::{EnumValue, Externalizable};

// Used by the code the derive macros expand to.
#[doc(hidden)]
pub use {bincode, inventory};

/// A record type the codec can serialize.
///
/// Usually implemented with `#[derive(Externalizable)]`. The `Default`
/// bound is the codec's nullary constructor: decoding starts from a default
/// instance, and fields absent from the wire keep their default values.
pub trait Externalizable: Default + Sized + 'static {
    /// Stable wire name of this record class, written whenever an instance
    /// travels in a slot declared as a different (or `dyn`) type.
    const CLASS_NAME: &'static str;

    /// The externalized members in declaration order. Validated and sorted
    /// into a [`Descriptor`] on first use.
    fn field_metas() -> Vec<FieldMeta<Self>>;
}

/// Object-safe view of [`Externalizable`], for polymorphic fields and the
/// class-name registry.
pub trait ErasedExternalizable: Any {
    fn class_name(&self) -> &'static str;

    /// Serialize this record's fields at the current output position.
    fn write_record(&self, out: &mut dyn Output) -> EncodeResult<()>;

    /// Populate this record from the wire, skipping unknown fields.
    fn read_record(&mut self, input: &mut dyn Input) -> DecodeResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Externalizable> ErasedExternalizable for T {
    fn class_name(&self) -> &'static str {
        T::CLASS_NAME
    }

    fn write_record(&self, out: &mut dyn Output) -> EncodeResult<()> {
        Descriptor::<T>::get()
            .map_err(EncodeError::from)
            .and_then(|desc| encode::write_fields(self, desc, out))
            .map_err(|e| error::record_write_failed(T::CLASS_NAME, e))
    }

    fn read_record(&mut self, input: &mut dyn Input) -> DecodeResult<()> {
        let result = Descriptor::<T>::get()
            .map_err(DecodeError::from)
            .and_then(|desc| decode::read_fields(self, desc, input));
        match result {
            // End of input is a signal, not a failure; it crosses record
            // boundaries unwrapped.
            Err(e) if !e.is_eof() => Err(error::record_read_failed(T::CLASS_NAME, e)),
            other => other,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Recover the concrete record behind a decoded [`RecordBox`] element.
pub fn downcast_record<T: Externalizable>(
    instance: Box<dyn ErasedExternalizable>,
) -> DecodeResult<T> {
    instance
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| error::class_mismatch(T::CLASS_NAME))
}

/// Serialize `value` at the writer's current position.
pub fn encode<T: Externalizable>(value: &T, out: &mut impl Output) -> EncodeResult<()> {
    value.write_record(out)
}

/// Serialize `value` into a fresh byte vector.
pub fn encode_to_vec<T: Externalizable>(value: &T) -> EncodeResult<Vec<u8>> {
    let mut buf = Vec::new();
    encode(value, &mut buf)?;
    Ok(buf)
}

/// Decode one record from the reader's current position.
pub fn decode<T: Externalizable>(input: &mut impl Input) -> DecodeResult<T> {
    let mut value = T::default();
    decode_into(&mut value, input)?;
    Ok(value)
}

/// Decode one record into an existing default-constructed instance.
pub fn decode_into<T: Externalizable>(value: &mut T, input: &mut impl Input) -> DecodeResult<()> {
    value.read_record(input)
}

/// Decode one record from the front of `bytes`. Trailing bytes are ignored.
pub fn decode_from_slice<T: Externalizable>(bytes: &[u8]) -> DecodeResult<T> {
    let mut input = bytes;
    decode(&mut input)
}
