//! Bidirectional identifier ↔ dense index mapping for one matrix axis.

use std::fmt::Debug;
use std::hash::Hash;

use ahash::AHashMap;
use coexlink_common::{CoexLinkError, Result};

/// Maps identifiers to contiguous indices `0..len()` in first-insertion order.
///
/// Indices are never reused or reassigned. Once [`freeze`](Self::freeze) is
/// called the axis only answers lookups: assigning an unseen identifier fails
/// with [`CoexLinkError::FrozenAxis`].
#[derive(Debug, Clone)]
pub struct IndexedAxis<K> {
    index: AHashMap<K, usize>,
    ids: Vec<K>,
    frozen: bool,
}

impl<K> IndexedAxis<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            index: AHashMap::new(),
            ids: Vec::new(),
            frozen: false,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: AHashMap::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
            frozen: false,
        }
    }

    /// Build an axis from `ids`, dropping repeats, and freeze it.
    pub fn frozen_from<I: IntoIterator<Item = K>>(ids: I) -> Self {
        let iter = ids.into_iter();
        let mut axis = Self::with_capacity(iter.size_hint().0);
        for id in iter {
            if !axis.index.contains_key(&id) {
                axis.push(id);
            }
        }
        axis.freeze();
        axis
    }

    fn push(&mut self, id: K) -> usize {
        let next = self.ids.len();
        self.index.insert(id.clone(), next);
        self.ids.push(id);
        next
    }

    /// Existing index of `id`, or the next free index if `id` is new.
    pub fn get_or_assign_index(&mut self, id: K) -> Result<usize> {
        if let Some(&existing) = self.index.get(&id) {
            return Ok(existing);
        }
        if self.frozen {
            return Err(CoexLinkError::FrozenAxis(format!("{id:?}")));
        }
        Ok(self.push(id))
    }

    #[inline]
    pub fn index_of(&self, id: &K) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_at(&self, index: usize) -> Result<&K> {
        self.ids
            .get(index)
            .ok_or_else(|| CoexLinkError::out_of_range("axis", index, self.ids.len()))
    }

    pub fn contains(&self, id: &K) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Identifiers in index order.
    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[K] {
        &self.ids
    }
}

impl<K> Default for IndexedAxis<K>
where
    K: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_insertion_order() {
        let mut axis = IndexedAxis::new();
        assert_eq!(axis.get_or_assign_index(30u64).unwrap(), 0);
        assert_eq!(axis.get_or_assign_index(10u64).unwrap(), 1);
        assert_eq!(axis.get_or_assign_index(20u64).unwrap(), 2);
        assert_eq!(axis.get_or_assign_index(10u64).unwrap(), 1);
        assert_eq!(axis.len(), 3);
        assert_eq!(axis.as_slice(), &[30, 10, 20]);
    }

    #[test]
    fn test_index_of_distinguishes_missing_from_zero() {
        let mut axis = IndexedAxis::new();
        axis.get_or_assign_index("first").unwrap();
        assert_eq!(axis.index_of(&"first"), Some(0));
        assert_eq!(axis.index_of(&"absent"), None);
    }

    #[test]
    fn test_id_at_bounds() {
        let axis = IndexedAxis::frozen_from([5u64, 6]);
        assert_eq!(*axis.id_at(1).unwrap(), 6);
        assert!(matches!(
            axis.id_at(2),
            Err(CoexLinkError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn test_frozen_axis_never_grows() {
        let mut axis = IndexedAxis::frozen_from([1u64, 2, 2, 3]);
        assert!(axis.is_frozen());
        assert_eq!(axis.len(), 3);
        assert_eq!(axis.get_or_assign_index(2).unwrap(), 1);
        assert!(matches!(axis.get_or_assign_index(99), Err(CoexLinkError::FrozenAxis(_))));
        assert_eq!(axis.len(), 3);
        assert!(!axis.contains(&99));
    }
}
