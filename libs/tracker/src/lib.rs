//! LiveList Tracking Engine
//!
//! Maintains a live, ordered, filtered view over an unbounded stream of
//! domain entities. Entities may be re-emitted to signal updates; they are
//! matched by identity and merged into the one canonical stored instance,
//! never duplicated. The engine keeps two collections consistent under
//! every mutation:
//!
//! - the master list: every known entity, sorted by the active comparator
//! - the filtered view: the visible subsequence satisfying the active
//!   predicate, surfaced through minimal add/remove/move notifications
//!
//! All mutable state is confined to one processing task. Producers push
//! through [`Tracker::enqueue`]; an adaptive pacing controller spaces the
//! drain so long-run throughput tracks the configured interval; comparator
//! and predicate can be swapped at runtime.
//!
//! ```no_run
//! use std::cmp::Ordering;
//! use tracker::{filter_fn, Trackable, Tracker, TrackerConfig};
//!
//! #[derive(Debug, Clone)]
//! struct Order {
//!     id: u64,
//!     price: i64,
//! }
//!
//! impl Trackable for Order {
//!     type Key = u64;
//!
//!     fn identity(&self) -> u64 {
//!         self.id
//!     }
//!
//!     fn merge_from(&mut self, newer: &Self) {
//!         self.price = newer.price;
//!     }
//!
//!     fn default_order(&self, other: &Self) -> Ordering {
//!         self.price.cmp(&other.price).then(self.id.cmp(&other.id))
//!     }
//! }
//!
//! # async fn demo() -> Result<(), tracker::TrackError> {
//! let tracker = Tracker::spawn(TrackerConfig::default());
//! tracker.set_filter(Some(filter_fn(|_: &Order, index, _| index < 10))).await?;
//! tracker.enqueue(Order { id: 1, price: 100 })?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

mod classify;
mod engine;
mod filtered_view;
mod handle;
mod master_list;
mod metrics;
mod pacing;

use std::cmp::Ordering;

pub use config::TrackerConfig;
pub use error::TrackError;
pub use filtered_view::{FilterFn, ViewRef};
pub use handle::Tracker;
pub use master_list::OrderFn;
pub use metrics::{TrackerMetrics, TrackerStats};
pub use types::{ListChange, Trackable};

/// Box a closure as a comparator override.
pub fn order_fn<T, F>(order: F) -> OrderFn<T>
where
    F: Fn(&T, &T) -> Ordering + Send + 'static,
{
    Box::new(order)
}

/// Box a closure as a visibility predicate.
pub fn filter_fn<T, F>(predicate: F) -> FilterFn<T>
where
    T: Trackable,
    F: Fn(&T, usize, ViewRef<'_, T>) -> bool + Send + 'static,
{
    Box::new(predicate)
}
