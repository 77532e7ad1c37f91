//! Error types and helpers.
use {std::io, thiserror::Error};

/// Errors raised while building a record's field descriptor.
///
/// These are programming errors in the record declaration. They surface on
/// the first encode or decode of the offending type and on every use after
/// that; nothing about a broken declaration is cached.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{class} has no externalized fields")]
    NoFields { class: &'static str },
    #[error("{class} field `{field}` reuses index {index}")]
    DuplicateIndex {
        class: &'static str,
        field: &'static str,
        index: u8,
    },
    #[error("{class} field `{field}` has index {index} outside 0..=127")]
    IndexOutOfRange {
        class: &'static str,
        field: &'static str,
        index: u8,
    },
    #[error("{class} field `{field}`: enum has {count} values, EnumSet supports at most 64")]
    TooManyEnumValues {
        class: &'static str,
        field: &'static str,
        count: usize,
    },
    #[error("field `{field}` (index {index}) is a list of externalizables but declares no default element class")]
    MissingDefaultClass { field: &'static str, index: u8 },
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("i/o error")]
    Io(#[source] io::Error),
    #[error("string of {0} bytes exceeds the 65535-byte UTF length prefix")]
    StringTooLong(usize),
    #[error("sequence of {0} elements exceeds the wire length range")]
    SequenceTooLong(usize),
    #[error("opaque object encoding failed")]
    Object(#[source] bincode::Error),
    #[error("failed to externalize {class}")]
    Record {
        class: &'static str,
        #[source]
        source: Box<EncodeError>,
    },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input ended on a record boundary (or inside one). Propagated
    /// verbatim, never wrapped in [`DecodeError::Record`], so callers
    /// draining a concatenated stream of records can use it as the loop
    /// terminator.
    #[error("end of input")]
    Eof,
    #[error("i/o error")]
    Io(#[source] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown field type id {0}")]
    UnknownFieldType(u8),
    #[error("field type id {0} has no length prefix and cannot be skipped")]
    UnskippableField(u8),
    #[error("unknown class name {0:?}")]
    UnknownClassName(String),
    #[error("class name {0:?} is registered by more than one type")]
    AmbiguousClassName(String),
    #[error("expected an instance of {expected}")]
    ClassMismatch { expected: &'static str },
    #[error("invalid modified UTF-8 at byte {position}")]
    InvalidUtf { position: usize },
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("opaque object decoding failed")]
    Object(#[source] bincode::Error),
    #[error("failed to read externalized instance of {class}; was the field order changed?")]
    Record {
        class: &'static str,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Whether this error is the end-of-input signal rather than a failure.
    #[inline]
    pub const fn is_eof(&self) -> bool {
        matches!(self, DecodeError::Eof)
    }
}

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type DecodeResult<T> = Result<T, DecodeError>;

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        EncodeError::Io(err)
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Eof
        } else {
            DecodeError::Io(err)
        }
    }
}

impl From<bincode::Error> for EncodeError {
    fn from(err: bincode::Error) -> Self {
        EncodeError::Object(err)
    }
}

impl From<bincode::Error> for DecodeError {
    fn from(err: bincode::Error) -> Self {
        DecodeError::Object(err)
    }
}

#[cold]
pub const fn string_too_long(len: usize) -> EncodeError {
    EncodeError::StringTooLong(len)
}

#[cold]
pub const fn sequence_too_long(len: usize) -> EncodeError {
    EncodeError::SequenceTooLong(len)
}

#[cold]
pub const fn unknown_field_type(id: u8) -> DecodeError {
    DecodeError::UnknownFieldType(id)
}

#[cold]
pub const fn unskippable_field(id: u8) -> DecodeError {
    DecodeError::UnskippableField(id)
}

#[cold]
pub fn unknown_class_name(name: impl Into<String>) -> DecodeError {
    DecodeError::UnknownClassName(name.into())
}

#[cold]
pub fn ambiguous_class_name(name: impl Into<String>) -> DecodeError {
    DecodeError::AmbiguousClassName(name.into())
}

#[cold]
pub const fn class_mismatch(expected: &'static str) -> DecodeError {
    DecodeError::ClassMismatch { expected }
}

#[cold]
pub const fn invalid_value(msg: &'static str) -> DecodeError {
    DecodeError::InvalidValue(msg)
}

#[cold]
pub fn record_write_failed(class: &'static str, source: EncodeError) -> EncodeError {
    EncodeError::Record {
        class,
        source: Box::new(source),
    }
}

#[cold]
pub fn record_read_failed(class: &'static str, source: DecodeError) -> DecodeError {
    DecodeError::Record {
        class,
        source: Box::new(source),
    }
}
