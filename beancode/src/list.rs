//! Lists that round-trip their concrete kind.
//!
//! The wire format records which concrete sequence class a list value had,
//! so that a reader can reconstruct "the same kind of list". Rust has a
//! single growable sequence type, so the kind travels as data on
//! [`WireList`] instead: the default kind maps to the wire's built-in
//! resizable-array flag, and any other kind is carried by name.
use std::ops::{Deref, DerefMut};

/// The concrete sequence kind of a [`WireList`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListKind {
    /// The built-in resizable-array list. Encoded as a single flag, no name.
    #[default]
    Default,
    /// Any other ordered sequence kind, carried by name.
    Named(String),
}

impl ListKind {
    #[inline]
    pub const fn is_default(&self) -> bool {
        matches!(self, ListKind::Default)
    }
}

/// An ordered sequence of nullable elements plus the concrete kind it had
/// when written.
///
/// Dereferences to its element vector, so the usual `Vec` API applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireList<T> {
    pub kind: ListKind,
    pub items: Vec<Option<T>>,
}

impl<T> WireList<T> {
    pub const fn new() -> Self {
        WireList {
            kind: ListKind::Default,
            items: Vec::new(),
        }
    }

    pub fn with_kind(kind: ListKind, items: Vec<Option<T>>) -> Self {
        WireList { kind, items }
    }
}

impl<T> Default for WireList<T> {
    fn default() -> Self {
        WireList::new()
    }
}

impl<T> Deref for WireList<T> {
    type Target = Vec<Option<T>>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> DerefMut for WireList<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl<T> From<Vec<T>> for WireList<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T> FromIterator<T> for WireList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        WireList {
            kind: ListKind::Default,
            items: iter.into_iter().map(Some).collect(),
        }
    }
}

impl<T> FromIterator<Option<T>> for WireList<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        WireList {
            kind: ListKind::Default,
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_into_default_kind() {
        let list: WireList<String> = ["a".to_owned(), "b".to_owned()].into_iter().collect();
        assert!(list.kind.is_default());
        assert_eq!(list.len(), 2);
        assert_eq!(list.items[0].as_deref(), Some("a"));
    }

    #[test]
    fn named_kind_survives() {
        let list = WireList::with_kind(
            ListKind::Named("java.util.LinkedList".to_owned()),
            vec![Some(1i32), None],
        );
        assert!(!list.kind.is_default());
        assert_eq!(list.items[1], None);
    }
}
