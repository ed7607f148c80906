//! Non-owning identity set.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::host::{ObjectRef, WeakObject};

/// A set of objects keyed by identity that never keeps its members alive.
///
/// Dead entries are pruned on insert. The set is never serialized.
#[derive(Debug, Default)]
pub struct WeakIdentitySet {
    entries: RefCell<HashMap<usize, WeakObject>>,
}

impl WeakIdentitySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `object`.
    pub fn insert(&self, object: &ObjectRef) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, weak| weak.upgrade().is_some());
        entries.insert(object.id(), object.downgrade());
    }

    /// Returns true if `object` is a live member.
    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.entries
            .borrow()
            .get(&object.id())
            .and_then(WeakObject::upgrade)
            .is_some_and(|member| member.ptr_eq(object))
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }

    /// Returns true if no member is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_by_identity() {
        let set = WeakIdentitySet::new();
        let a = ObjectRef::plain();
        let b = ObjectRef::plain();
        set.insert(&a);
        assert!(set.contains(&a));
        assert!(!set.contains(&b));
    }

    #[test]
    fn members_are_not_kept_alive() {
        let set = WeakIdentitySet::new();
        let a = ObjectRef::plain();
        set.insert(&a);
        assert_eq!(set.len(), 1);
        drop(a);
        assert!(set.is_empty());
    }
}
