//! Field access abstraction for hierarchy records.
//!
//! The flattener never inspects records directly. It asks a `RecordAccessor`
//! for the three capabilities it needs, resolved once per call instead of per
//! field lookup.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Reads identifier, branch marker and parent reference from a record.
pub trait RecordAccessor<R: ?Sized> {
    /// Comparable identifier value; also used as the "current root".
    type Key: fmt::Debug;

    /// Hashable form of a key, used to index children by parent.
    type Group: Hash + Eq;

    /// The top-level sentinel.
    fn root_key(&self) -> Self::Key;

    /// Identifier of `record`, used as the root for its children.
    fn identifier(&self, record: &R) -> Self::Key;

    /// Whether `record` may have children (and is always expanded).
    fn is_branch(&self, record: &R) -> bool;

    /// Whether the parent field of `record` equals `key`.
    fn has_parent(&self, record: &R, key: &Self::Key) -> bool;

    /// Group of `key`; `None` for keys equal to nothing.
    ///
    /// Must agree with `has_parent`: `has_parent(r, k)` holds exactly when
    /// `parent_group(r)` is `Some` and equals `group(k)`.
    fn group(&self, key: &Self::Key) -> Option<Self::Group>;

    /// Group of the parent reference of `record`.
    fn parent_group(&self, record: &R) -> Option<Self::Group>;

    /// Human readable form of a key for diagnostics.
    fn describe(&self, key: &Self::Key) -> String {
        format!("{:?}", key)
    }
}

/// A statically typed hierarchy record.
///
/// `parent() == None` marks a top-level record.
pub trait HierarchyRecord {
    type Id: Clone + Eq + Hash + fmt::Debug;

    fn id(&self) -> Self::Id;
    fn is_node(&self) -> bool;
    fn parent(&self) -> Option<Self::Id>;
}

/// Accessor for any `HierarchyRecord` type.
pub struct TypedAccessor<R> {
    _record: PhantomData<fn(&R)>,
}

impl<R> TypedAccessor<R> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<R> Default for TypedAccessor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for TypedAccessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TypedAccessor")
    }
}

impl<R: HierarchyRecord> RecordAccessor<R> for TypedAccessor<R> {
    type Key = Option<R::Id>;
    type Group = Option<R::Id>;

    fn root_key(&self) -> Self::Key {
        None
    }

    fn identifier(&self, record: &R) -> Self::Key {
        Some(record.id())
    }

    fn is_branch(&self, record: &R) -> bool {
        record.is_node()
    }

    fn has_parent(&self, record: &R, key: &Self::Key) -> bool {
        record.parent() == *key
    }

    fn group(&self, key: &Self::Key) -> Option<Self::Group> {
        Some(key.clone())
    }

    fn parent_group(&self, record: &R) -> Option<Self::Group> {
        Some(record.parent())
    }

    fn describe(&self, key: &Self::Key) -> String {
        match key {
            Some(id) => format!("{:?}", id),
            None => "<top level>".to_string(),
        }
    }
}
