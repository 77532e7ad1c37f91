//! Process-wide registry mapping wire class names to constructors.
//!
//! The wire identifies a non-default externalizable class by name. Without
//! runtime class loading, decoding such a name needs a registered
//! constructor; `#[derive(Externalizable)]` submits one per record type, so
//! every derived type in the linked program is decodable by name. Entries
//! are collected before `main` runs and frozen into a lookup map on first
//! use.
use {
    crate::{
        error::{ambiguous_class_name, unknown_class_name, DecodeResult},
        ErasedExternalizable, Externalizable,
    },
    std::{
        collections::{hash_map::Entry, HashMap},
        sync::LazyLock,
    },
};

/// A wire class name paired with a constructor for a default instance.
#[derive(Clone, Copy, Debug)]
pub struct ClassEntry {
    name: &'static str,
    construct: fn() -> Box<dyn ErasedExternalizable>,
}

impl ClassEntry {
    /// Entry for a record type, using its wire class name.
    pub const fn of<T: Externalizable>() -> Self {
        fn construct<T: Externalizable>() -> Box<dyn ErasedExternalizable> {
            Box::new(T::default())
        }
        ClassEntry {
            name: T::CLASS_NAME,
            construct: construct::<T>,
        }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Construct a default instance of the registered class.
    #[inline]
    pub fn construct(&self) -> Box<dyn ErasedExternalizable> {
        (self.construct)()
    }
}

inventory::collect!(ClassEntry);

/// A name registered by two different types decodes as an error rather than
/// as whichever entry the linker saw first.
static REGISTRY: LazyLock<HashMap<&'static str, Option<&'static ClassEntry>>> =
    LazyLock::new(|| {
        let mut registry = HashMap::new();
        for entry in inventory::iter::<ClassEntry> {
            match registry.entry(entry.name) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(entry));
                }
                Entry::Occupied(mut slot) => {
                    slot.insert(None);
                }
            }
        }
        registry
    });

/// Look up the entry for a wire class name.
pub fn lookup(name: &str) -> DecodeResult<&'static ClassEntry> {
    match REGISTRY.get(name) {
        Some(&Some(entry)) => Ok(entry),
        Some(None) => Err(ambiguous_class_name(name)),
        None => Err(unknown_class_name(name)),
    }
}

/// Construct a default instance of the class registered under `name`.
pub fn construct_by_name(name: &str) -> DecodeResult<Box<dyn ErasedExternalizable>> {
    Ok(lookup(name)?.construct())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::DecodeError};

    #[test]
    fn unknown_name_is_an_error() {
        assert!(matches!(
            lookup("no.such.Class"),
            Err(DecodeError::UnknownClassName(_))
        ));
    }
}
