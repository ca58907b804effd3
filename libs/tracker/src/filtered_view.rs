//! Filtered View Projection
//!
//! The externally observed subsequence of the master list: every member
//! satisfies the active predicate, in master relative order. The view keeps
//! a total key → index cache that is corrected in the same step as every
//! structural change, so reverse lookups never scan.
//!
//! `recalculate_filter` is the single routine that reconciles the view with
//! the master list after a mutation: it walks a master sub-range once,
//! comparing cached inclusion against freshly evaluated inclusion, and
//! emits the minimal add/remove sequence. The whole-list form of the same
//! walk serves comparator and predicate replacement.

use std::collections::HashMap;
use std::ops::Range;

use types::{ListChange, Trackable};

use crate::master_list::MasterList;

/// Caller-supplied visibility predicate: entity, its master index, and a
/// read-only accessor over the current filtered view.
pub type FilterFn<T> = Box<dyn Fn(&T, usize, ViewRef<'_, T>) -> bool + Send>;

/// Read-only access to the filtered view, handed to predicates so
/// position-sensitive filters can consult what is currently visible.
pub struct ViewRef<'a, T: Trackable> {
    master: &'a MasterList<T>,
    view: &'a FilteredView<T>,
}

impl<'a, T: Trackable> ViewRef<'a, T> {
    pub(crate) fn new(master: &'a MasterList<T>, view: &'a FilteredView<T>) -> Self {
        Self { master, view }
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&'a T> {
        self.view.key_at(index).and_then(|key| self.master.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }
}

pub(crate) struct FilteredView<T: Trackable> {
    visible: Vec<T::Key>,
    visible_index: HashMap<T::Key, usize>,
}

impl<T: Trackable> FilteredView<T> {
    pub(crate) fn new() -> Self {
        Self {
            visible: Vec::new(),
            visible_index: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.visible.len()
    }

    pub(crate) fn key_at(&self, index: usize) -> Option<&T::Key> {
        self.visible.get(index)
    }

    /// View index of `key`. The cache is total over visible entities, so a
    /// miss means "not visible".
    pub(crate) fn index_of(&self, key: &T::Key) -> Option<usize> {
        self.visible_index.get(key).copied()
    }

    pub(crate) fn first_key(&self) -> Option<&T::Key> {
        self.visible.first()
    }

    pub(crate) fn last_key(&self) -> Option<&T::Key> {
        self.visible.last()
    }

    pub(crate) fn insert_at(&mut self, index: usize, key: T::Key) {
        for cached in self.visible_index.values_mut() {
            if *cached >= index {
                *cached += 1;
            }
        }
        self.visible.insert(index, key.clone());
        self.visible_index.insert(key, index);
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Option<T::Key> {
        if index >= self.visible.len() {
            return None;
        }
        let key = self.visible.remove(index);
        self.visible_index.remove(&key);
        for cached in self.visible_index.values_mut() {
            if *cached > index {
                *cached -= 1;
            }
        }
        Some(key)
    }

    pub(crate) fn clear(&mut self) {
        self.visible.clear();
        self.visible_index.clear();
    }

    #[cfg(test)]
    pub(crate) fn cache_is_exact(&self) -> bool {
        self.visible_index.len() == self.visible.len()
            && self
                .visible
                .iter()
                .enumerate()
                .all(|(index, key)| self.visible_index.get(key) == Some(&index))
    }
}

/// Evaluate inclusion for `entity` at `master_index` under the active
/// predicate. No predicate means everything is visible.
pub(crate) fn evaluate<T: Trackable>(
    filter: Option<&FilterFn<T>>,
    master: &MasterList<T>,
    view: &FilteredView<T>,
    entity: &T,
    master_index: usize,
) -> bool {
    match filter {
        Some(predicate) => predicate(entity, master_index, ViewRef::new(master, view)),
        None => true,
    }
}

/// View insertion index for an entity landing at `master_index`: one past
/// the nearest already-visible entity at a lower master index, or 0.
pub(crate) fn pivot_for<T: Trackable>(
    master: &MasterList<T>,
    view: &FilteredView<T>,
    master_index: usize,
) -> usize {
    let mut probe = master_index;
    while probe > 0 {
        probe -= 1;
        if let Some(key) = master.key_at(probe) {
            if let Some(visible_at) = view.index_of(key) {
                return visible_at + 1;
            }
        }
    }
    0
}

/// One reconciling pass over `range`: newly included entities insert at the
/// cursor, newly excluded ones are removed, already-visible ones advance
/// the cursor past themselves.
pub(crate) fn recalculate_filter<T: Trackable>(
    master: &MasterList<T>,
    view: &mut FilteredView<T>,
    filter: Option<&FilterFn<T>>,
    range: Range<usize>,
    mut cursor: usize,
    events: &mut Vec<ListChange<T>>,
) {
    for index in range {
        let Some(key) = master.key_at(index).cloned() else {
            break;
        };
        let Some(entity) = master.get(&key) else {
            continue;
        };
        let previously = view.index_of(&key);
        let included = evaluate(filter, master, view, entity, index);
        match (previously, included) {
            (None, true) => {
                let item = entity.clone();
                view.insert_at(cursor, key);
                events.push(ListChange::Added { item, index: cursor });
                cursor += 1;
            }
            (Some(at), false) => {
                let item = entity.clone();
                view.remove_at(at);
                events.push(ListChange::Removed { item, index: at });
            }
            (Some(at), true) => cursor = at + 1,
            (None, false) => {}
        }
    }
}
