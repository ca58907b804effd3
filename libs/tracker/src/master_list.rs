//! Master List
//!
//! Canonical sorted, identity-deduplicated store of every known entity.
//! Entities are owned in a keyed map (one canonical instance per identity,
//! ever); sort order is a separate vector of keys. A partial key → index
//! cache avoids linear scans on the hot lookup path: entries are populated
//! lazily on a miss and kept exact through every insert, remove, and swap.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;
use types::Trackable;

/// Caller-supplied ordering override.
pub type OrderFn<T> = Box<dyn Fn(&T, &T) -> Ordering + Send>;

pub(crate) struct MasterList<T: Trackable> {
    entities: HashMap<T::Key, T>,
    order: Vec<T::Key>,
    sorted_index: HashMap<T::Key, usize>,
}

impl<T: Trackable> MasterList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            sorted_index: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn get(&self, key: &T::Key) -> Option<&T> {
        self.entities.get(key)
    }

    pub(crate) fn get_at(&self, index: usize) -> Option<&T> {
        self.order.get(index).and_then(|key| self.entities.get(key))
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<&T::Key> {
        self.order.get(index)
    }

    /// Master index of `key`, if tracked. A cache miss falls back to a
    /// linear scan and caches the result; a miss is not an error.
    pub(crate) fn index_of(&mut self, key: &T::Key) -> Option<usize> {
        if !self.entities.contains_key(key) {
            return None;
        }
        if let Some(&index) = self.sorted_index.get(key) {
            return Some(index);
        }
        let index = self.order.iter().position(|k| k == key)?;
        trace!(?key, index, "sorted index cache miss");
        self.sorted_index.insert(key.clone(), index);
        Some(index)
    }

    pub(crate) fn append(&mut self, entity: T) {
        let key = entity.identity();
        self.order.push(key.clone());
        self.entities.insert(key, entity);
    }

    /// Insert at `index`; every cached index at or past it shifts by one.
    pub(crate) fn insert_at(&mut self, index: usize, entity: T) {
        let key = entity.identity();
        for cached in self.sorted_index.values_mut() {
            if *cached >= index {
                *cached += 1;
            }
        }
        self.order.insert(index, key.clone());
        self.entities.insert(key, entity);
    }

    pub(crate) fn remove(&mut self, key: &T::Key) -> Option<(usize, T)> {
        let index = self.index_of(key)?;
        self.order.remove(index);
        self.sorted_index.remove(key);
        for cached in self.sorted_index.values_mut() {
            if *cached > index {
                *cached -= 1;
            }
        }
        let entity = self.entities.remove(key)?;
        Some((index, entity))
    }

    /// Copy field values from `newer` into the stored instance. The stored
    /// instance stays canonical; its identity never changes.
    pub(crate) fn merge_into(&mut self, key: &T::Key, newer: &T) {
        if let Some(stored) = self.entities.get_mut(key) {
            stored.merge_from(newer);
        }
    }

    /// Bubble the entity at `start` one slot at a time toward its new sort
    /// position, stopping once order is restored on both sides. Only one
    /// entity's sort key changed, so the rest of the list is already
    /// internally sorted and a full resort is unnecessary.
    pub(crate) fn reposition(&mut self, start: usize, cmp: &dyn Fn(&T, &T) -> Ordering) -> usize {
        let mut index = start;
        while index > 0 && self.out_of_order(index - 1, index, cmp) {
            self.swap(index - 1, index);
            index -= 1;
        }
        while index + 1 < self.order.len() && self.out_of_order(index, index + 1, cmp) {
            self.swap(index, index + 1);
            index += 1;
        }
        index
    }

    /// Binary search for the insertion point of `probe` under `cmp`.
    pub(crate) fn search(
        &self,
        probe: &T,
        cmp: &dyn Fn(&T, &T) -> Ordering,
    ) -> Result<usize, usize> {
        self.order.binary_search_by(|key| match self.entities.get(key) {
            Some(stored) => cmp(stored, probe),
            None => Ordering::Less,
        })
    }

    /// Full resort under a new comparator; the index cache is rebuilt
    /// lazily afterwards.
    pub(crate) fn resort(&mut self, cmp: &dyn Fn(&T, &T) -> Ordering) {
        let entities = &self.entities;
        self.order.sort_by(|a, b| match (entities.get(a), entities.get(b)) {
            (Some(x), Some(y)) => cmp(x, y),
            _ => Ordering::Equal,
        });
        self.sorted_index.clear();
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|key| self.entities.get(key))
            .cloned()
            .collect()
    }

    fn out_of_order(&self, left: usize, right: usize, cmp: &dyn Fn(&T, &T) -> Ordering) -> bool {
        match (self.get_at(left), self.get_at(right)) {
            (Some(a), Some(b)) => cmp(a, b) == Ordering::Greater,
            _ => false,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.order.swap(a, b);
        for index in [a, b] {
            if let Some(key) = self.order.get(index) {
                if let Some(cached) = self.sorted_index.get_mut(key) {
                    *cached = index;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn cache_is_consistent(&self) -> bool {
        self.sorted_index
            .iter()
            .all(|(key, &index)| self.order.get(index) == Some(key))
    }
}
