//! Sort-Order Classification
//!
//! Decides, for one dequeued entity, which transition the master list must
//! apply: merge in place, reorder the existing instance, or insert/append a
//! new one. Reads the master list and its index cache; mutation happens in
//! the processing step that consumes the returned action.

use std::cmp::Ordering;

use types::Trackable;

use crate::master_list::MasterList;

/// The transition to apply for one processed entity. Each variant carries
/// only the positions that transition needs; a `Move`'s destination is
/// resolved later by local repositioning, not by a fresh search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingAction {
    /// Same identity, same sort position: update payload only.
    None { pos: usize },
    /// New identity that sorts at (or past) the end.
    Add,
    /// New identity with a known interior position.
    Insert { pos: usize },
    /// Known identity whose sort key changed; starts bubbling from `old_pos`.
    Move { old_pos: usize },
}

pub(crate) fn classify<T: Trackable>(
    master: &mut MasterList<T>,
    cmp: &dyn Fn(&T, &T) -> Ordering,
    incoming: &T,
) -> PendingAction {
    let key = incoming.identity();

    if let Some(pos) = master.index_of(&key) {
        if let Some(stored) = master.get_at(pos) {
            return if cmp(incoming, stored) == Ordering::Equal {
                PendingAction::None { pos }
            } else {
                PendingAction::Move { old_pos: pos }
            };
        }
    }

    if master.is_empty() {
        return PendingAction::Add;
    }

    // Producers are not required to emit in comparator order, so probe the
    // boundaries first and fall back to binary search for the interior.
    if let Some(first) = master.get_at(0) {
        if cmp(incoming, first) != Ordering::Greater {
            return PendingAction::Insert { pos: 0 };
        }
    }
    if let Some(last) = master.get_at(master.len() - 1) {
        if cmp(incoming, last) != Ordering::Less {
            return PendingAction::Add;
        }
    }

    let pos = match master.search(incoming, cmp) {
        Ok(pos) | Err(pos) => pos,
    };
    if pos == master.len() {
        PendingAction::Add
    } else {
        PendingAction::Insert { pos }
    }
}
