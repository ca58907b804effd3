//! Entity Contract and Change Events
//!
//! Core types shared between the tracking engine and its consumers:
//! - `Trackable`: the capability set an entity must provide to be tracked
//!   (stable identity, in-place merge, natural order)
//! - `ListChange`: structural change notifications emitted by the filtered
//!   view, one per mutation, in the order the mutation occurred

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

/// Capability contract for values tracked by the engine.
///
/// An entity, not the engine, defines what "the same logical entity" means:
/// repeated observations carrying the same identity are merged into the one
/// canonical stored instance rather than inserted again.
pub trait Trackable: Clone + Send + 'static {
    /// Stable identity used to recognize re-emissions of the same entity.
    type Key: Eq + Hash + Clone + Send + Debug;

    /// The identity of this observation.
    fn identity(&self) -> Self::Key;

    /// Copy mutable field values from a newer observation into this
    /// (canonical) instance. Must not change the identity.
    fn merge_from(&mut self, newer: &Self);

    /// Natural order, used whenever no comparator override is installed.
    fn default_order(&self, other: &Self) -> Ordering;
}

/// A structural change to the filtered view.
///
/// Indices are positions in the filtered view at the moment the change was
/// applied, so a consumer replaying the sequence against its own copy stays
/// exactly in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<T> {
    /// `item` became visible at `index`.
    Added { item: T, index: usize },
    /// `item` stopped being visible; it was at `index`.
    Removed { item: T, index: usize },
    /// `item` moved from `from` to `to` within the view.
    Moved { item: T, from: usize, to: usize },
    /// The whole view was rebuilt; consumers should re-snapshot.
    Reset,
}

impl<T> ListChange<T> {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ListChange::Added { .. } => "added",
            ListChange::Removed { .. } => "removed",
            ListChange::Moved { .. } => "moved",
            ListChange::Reset => "reset",
        }
    }

    /// Whether replaying this change requires a fresh snapshot instead of an
    /// incremental edit.
    pub fn is_reset(&self) -> bool {
        matches!(self, ListChange::Reset)
    }
}
