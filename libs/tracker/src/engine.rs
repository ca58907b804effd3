//! Tracking Engine
//!
//! `EngineCore` is the synchronous dequeue-classify-mutate-project state
//! machine: it owns the master list, the filtered view, and the active
//! comparator/predicate, and turns one incoming entity (or one control
//! operation) into the minimal sequence of view changes. The async `Engine`
//! wraps it in the confined processing task: a `biased` select over the
//! control channel and the pacing timer, draining at most one entity per
//! tick. All mutable state lives on this one task; nothing else ever
//! touches it.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use types::{ListChange, Trackable};

use crate::classify::{classify, PendingAction};
use crate::config::TrackerConfig;
use crate::filtered_view::{evaluate, pivot_for, recalculate_filter, FilterFn, FilteredView};
use crate::master_list::{MasterList, OrderFn};
use crate::metrics::TrackerMetrics;
use crate::pacing::PacingController;

/// Control operations serialized with processing ticks on the engine task.
pub(crate) enum Command<T: Trackable> {
    Remove { entity: T, ack: oneshot::Sender<()> },
    SetComparator { comparator: Option<OrderFn<T>>, ack: oneshot::Sender<()> },
    SetFilter { filter: Option<FilterFn<T>>, ack: oneshot::Sender<()> },
    SetInterval { interval: Duration, ack: oneshot::Sender<()> },
    ViewSnapshot { reply: oneshot::Sender<Vec<T>> },
    MasterSnapshot { reply: oneshot::Sender<Vec<T>> },
    Dispose { ack: oneshot::Sender<()> },
}

pub(crate) struct ProcessOutcome<T: Trackable> {
    pub(crate) action: PendingAction,
    pub(crate) item: T,
    pub(crate) events: Vec<ListChange<T>>,
}

pub(crate) struct EngineCore<T: Trackable> {
    master: MasterList<T>,
    view: FilteredView<T>,
    comparator: Option<OrderFn<T>>,
    filter: Option<FilterFn<T>>,
}

impl<T: Trackable> EngineCore<T> {
    pub(crate) fn new() -> Self {
        Self {
            master: MasterList::new(),
            view: FilteredView::new(),
            comparator: None,
            filter: None,
        }
    }

    /// Apply one dequeued entity: classify, mutate the master list, project
    /// onto the filtered view. Returns the canonical post-merge instance
    /// and the change notifications, in order.
    pub(crate) fn process_entity(&mut self, incoming: T) -> ProcessOutcome<T> {
        let key = incoming.identity();
        let Self { master, view, comparator, filter } = self;
        let comparator = &*comparator;
        let cmp = |a: &T, b: &T| match comparator {
            Some(order) => order(a, b),
            None => a.default_order(b),
        };

        let action = classify(master, &cmp, &incoming);
        let mut events = Vec::new();

        match action {
            PendingAction::None { pos } => {
                master.merge_into(&key, &incoming);
                let previously = view.index_of(&key);
                let included = match master.get(&key) {
                    Some(entity) => evaluate(filter.as_ref(), master, view, entity, pos),
                    None => false,
                };
                match (previously, included) {
                    (None, true) => {
                        let target = pivot_for(master, view, pos);
                        if let Some(entity) = master.get(&key) {
                            let item = entity.clone();
                            view.insert_at(target, key.clone());
                            events.push(ListChange::Added { item, index: target });
                        }
                    }
                    (Some(at), false) => {
                        if let Some(entity) = master.get(&key) {
                            let item = entity.clone();
                            view.remove_at(at);
                            events.push(ListChange::Removed { item, index: at });
                        }
                    }
                    _ => {}
                }
            }
            PendingAction::Add => {
                let pos = master.len();
                master.append(incoming.clone());
                let cursor = pivot_for(master, view, pos);
                recalculate_filter(master, view, filter.as_ref(), pos..master.len(), cursor, &mut events);
            }
            PendingAction::Insert { pos } => {
                master.insert_at(pos, incoming.clone());
                let cursor = pivot_for(master, view, pos);
                recalculate_filter(master, view, filter.as_ref(), pos..master.len(), cursor, &mut events);
            }
            PendingAction::Move { old_pos } => {
                master.merge_into(&key, &incoming);
                let new_pos = master.reposition(old_pos, &cmp);
                Self::project_move(master, view, filter, &key, old_pos, new_pos, &mut events);
            }
        }

        let item = match self.master.get(&key) {
            Some(entity) => entity.clone(),
            None => incoming,
        };
        ProcessOutcome { action, item, events }
    }

    /// Immediate removal, outside the ingestion queue. Removing an absent
    /// identity is a silent no-op. Removal shifts master indices, so with a
    /// predicate active the tail from the removal point is re-scanned.
    pub(crate) fn remove(&mut self, entity: &T) -> Vec<ListChange<T>> {
        let key = entity.identity();
        let mut events = Vec::new();
        let Self { master, view, filter, .. } = self;
        if let Some((index, removed)) = master.remove(&key) {
            if let Some(at) = view.index_of(&key) {
                view.remove_at(at);
                events.push(ListChange::Removed { item: removed, index: at });
            }
            if filter.is_some() && index < master.len() {
                let cursor = pivot_for(master, view, index);
                recalculate_filter(master, view, filter.as_ref(), index..master.len(), cursor, &mut events);
            }
        }
        events
    }

    /// Replace (or clear) the comparator: full resort, silent view rebuild,
    /// one `Reset`.
    pub(crate) fn set_comparator(&mut self, comparator: Option<OrderFn<T>>) -> Vec<ListChange<T>> {
        self.comparator = comparator;
        let Self { master, view, comparator, filter } = self;
        let comparator = &*comparator;
        let cmp = |a: &T, b: &T| match comparator {
            Some(order) => order(a, b),
            None => a.default_order(b),
        };
        master.resort(&cmp);
        view.clear();
        recalculate_filter(master, view, filter.as_ref(), 0..master.len(), 0, &mut Vec::new());
        vec![ListChange::Reset]
    }

    /// Replace, install, or clear the predicate. Clearing re-inserts every
    /// hidden entity in master order without re-evaluating anything;
    /// installing or replacing reconciles the view against the new
    /// predicate, emitting only the membership diffs.
    pub(crate) fn set_filter(&mut self, filter: Option<FilterFn<T>>) -> Vec<ListChange<T>> {
        let had = self.filter.is_some();
        let installing = filter.is_some();
        self.filter = filter;

        let mut events = Vec::new();
        match (had, installing) {
            (false, false) => {}
            (true, false) => {
                let Self { master, view, .. } = self;
                let mut cursor = 0;
                for index in 0..master.len() {
                    let Some(key) = master.key_at(index).cloned() else {
                        break;
                    };
                    if let Some(at) = view.index_of(&key) {
                        cursor = at + 1;
                        continue;
                    }
                    if let Some(entity) = master.get(&key) {
                        let item = entity.clone();
                        view.insert_at(cursor, key);
                        events.push(ListChange::Added { item, index: cursor });
                        cursor += 1;
                    }
                }
            }
            _ => {
                let Self { master, view, filter, .. } = self;
                recalculate_filter(master, view, filter.as_ref(), 0..master.len(), 0, &mut events);
            }
        }
        events
    }

    pub(crate) fn visible_items(&self) -> Vec<T> {
        (0..self.view.len())
            .filter_map(|index| self.view.key_at(index))
            .filter_map(|key| self.master.get(key))
            .cloned()
            .collect()
    }

    pub(crate) fn master_items(&self) -> Vec<T> {
        self.master.items()
    }

    fn project_move(
        master: &mut MasterList<T>,
        view: &mut FilteredView<T>,
        filter: &Option<FilterFn<T>>,
        key: &T::Key,
        old_pos: usize,
        new_pos: usize,
        events: &mut Vec<ListChange<T>>,
    ) {
        if filter.is_none() {
            // Unfiltered, the view mirrors the master list one to one.
            if old_pos != new_pos {
                if let Some(entity) = master.get(key) {
                    let item = entity.clone();
                    view.remove_at(old_pos);
                    view.insert_at(new_pos, key.clone());
                    events.push(ListChange::Moved { item, from: old_pos, to: new_pos });
                }
            }
            return;
        }

        // Probe the view's boundary members at their current master
        // positions. Losing either means the move disturbed positional
        // filtering beyond the moved span, so the whole list is
        // reconciled. The probe only inspects first/last and can
        // under-detect far effects of pathological predicates.
        let mut widen = false;
        for boundary in [view.first_key().cloned(), view.last_key().cloned()] {
            if widen {
                break;
            }
            let Some(boundary_key) = boundary else {
                continue;
            };
            if let Some(boundary_index) = master.index_of(&boundary_key) {
                if let Some(entity) = master.get(&boundary_key) {
                    if !evaluate(filter.as_ref(), master, view, entity, boundary_index) {
                        widen = true;
                    }
                }
            }
        }
        if widen {
            debug!(from = old_pos, to = new_pos, "boundary member displaced, re-scanning whole list");
            recalculate_filter(master, view, filter.as_ref(), 0..master.len(), 0, events);
            return;
        }

        let previously = view.index_of(key);
        let included = match master.get(key) {
            Some(entity) => evaluate(filter.as_ref(), master, view, entity, new_pos),
            None => false,
        };
        match (previously, included) {
            (Some(at), true) => {
                view.remove_at(at);
                let target = pivot_for(master, view, new_pos);
                view.insert_at(target, key.clone());
                if at != target {
                    if let Some(entity) = master.get(key) {
                        events.push(ListChange::Moved { item: entity.clone(), from: at, to: target });
                    }
                }
            }
            (Some(at), false) => {
                if let Some(entity) = master.get(key) {
                    let item = entity.clone();
                    view.remove_at(at);
                    events.push(ListChange::Removed { item, index: at });
                }
            }
            (None, true) => {
                let target = pivot_for(master, view, new_pos);
                if let Some(entity) = master.get(key) {
                    let item = entity.clone();
                    view.insert_at(target, key.clone());
                    events.push(ListChange::Added { item, index: target });
                }
            }
            (None, false) => {}
        }

        let lo = old_pos.min(new_pos);
        let hi = old_pos.max(new_pos);
        let cursor = pivot_for(master, view, lo);
        recalculate_filter(master, view, filter.as_ref(), lo..hi + 1, cursor, events);
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let items = self.master.items();
        for pair in items.windows(2) {
            let ord = match &self.comparator {
                Some(order) => order(&pair[0], &pair[1]),
                None => pair[0].default_order(&pair[1]),
            };
            assert_ne!(ord, std::cmp::Ordering::Greater, "master list out of order");
        }

        let mut expected = Vec::new();
        for (index, entity) in items.iter().enumerate() {
            if evaluate(self.filter.as_ref(), &self.master, &self.view, entity, index) {
                expected.push(entity.identity());
            }
        }
        let actual: Vec<T::Key> = (0..self.view.len())
            .filter_map(|index| self.view.key_at(index).cloned())
            .collect();
        assert_eq!(actual, expected, "filtered view diverged from master projection");
        assert!(self.view.cache_is_exact(), "filtered index cache inexact");
        assert!(self.master.cache_is_consistent(), "sorted index cache inexact");
    }
}

pub(crate) struct Engine<T: Trackable> {
    ingest: mpsc::UnboundedReceiver<T>,
    control: mpsc::UnboundedReceiver<Command<T>>,
    worker: Worker<T>,
}

struct Worker<T: Trackable> {
    core: EngineCore<T>,
    pacing: PacingController,
    items_tx: broadcast::Sender<T>,
    changes_tx: broadcast::Sender<ListChange<T>>,
    metrics: Arc<TrackerMetrics>,
}

impl<T: Trackable> Engine<T> {
    pub(crate) fn new(
        config: &TrackerConfig,
        ingest: mpsc::UnboundedReceiver<T>,
        control: mpsc::UnboundedReceiver<Command<T>>,
        items_tx: broadcast::Sender<T>,
        changes_tx: broadcast::Sender<ListChange<T>>,
        metrics: Arc<TrackerMetrics>,
    ) -> Self {
        Self {
            ingest,
            control,
            worker: Worker {
                core: EngineCore::new(),
                pacing: PacingController::new(config.processing_interval, config.pacing_fuzziness),
                items_tx,
                changes_tx,
                metrics,
            },
        }
    }

    pub(crate) async fn run(self) {
        let Engine { mut ingest, mut control, mut worker } = self;
        info!(interval = ?worker.pacing.requested(), "tracker engine started");

        let mut parked = false;
        let mut ingest_closed = false;
        'main: loop {
            if parked {
                // Queue was empty at the last tick: wait for work instead
                // of spinning the pacing timer against nothing.
                tokio::select! {
                    biased;
                    command = control.recv() => match command {
                        Some(command) => {
                            if worker.handle_command(command).is_break() {
                                break 'main;
                            }
                        }
                        None => break 'main,
                    },
                    entity = ingest.recv(), if !ingest_closed => match entity {
                        Some(entity) => {
                            parked = false;
                            worker.process(entity, true);
                        }
                        None => ingest_closed = true,
                    },
                }
            } else {
                // One pinned timer per tick; control traffic is served
                // while it runs and must not reset it.
                let tick = tokio::time::sleep(worker.pacing.current_delay());
                tokio::pin!(tick);
                loop {
                    tokio::select! {
                        biased;
                        command = control.recv() => match command {
                            Some(command) => {
                                if worker.handle_command(command).is_break() {
                                    break 'main;
                                }
                            }
                            None => break 'main,
                        },
                        () = &mut tick => {
                            match ingest.try_recv() {
                                Ok(entity) => worker.process(entity, false),
                                Err(TryRecvError::Empty) => {
                                    worker.metrics.record_idle_park();
                                    parked = true;
                                }
                                Err(TryRecvError::Disconnected) => {
                                    ingest_closed = true;
                                    parked = true;
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }

        info!("tracker engine stopped");
    }
}

impl<T: Trackable> Worker<T> {
    fn handle_command(&mut self, command: Command<T>) -> ControlFlow<()> {
        match command {
            Command::Remove { entity, ack } => {
                let events = self.core.remove(&entity);
                self.emit(events);
                let _ = ack.send(());
            }
            Command::SetComparator { comparator, ack } => {
                debug!(installed = comparator.is_some(), "replacing comparator");
                let events = self.core.set_comparator(comparator);
                self.emit(events);
                let _ = ack.send(());
            }
            Command::SetFilter { filter, ack } => {
                debug!(installed = filter.is_some(), "replacing filter");
                let events = self.core.set_filter(filter);
                self.emit(events);
                let _ = ack.send(());
            }
            Command::SetInterval { interval, ack } => {
                self.pacing.set_interval(interval);
                let _ = ack.send(());
            }
            Command::ViewSnapshot { reply } => {
                let _ = reply.send(self.core.visible_items());
            }
            Command::MasterSnapshot { reply } => {
                let _ = reply.send(self.core.master_items());
            }
            Command::Dispose { ack } => {
                let _ = ack.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn process(&mut self, entity: T, after_idle: bool) {
        let outcome = self.core.process_entity(entity);
        self.metrics.record_processed();
        match outcome.action {
            PendingAction::None { .. } => self.metrics.record_merge(),
            PendingAction::Move { .. } => self.metrics.record_move(),
            _ => {}
        }
        debug!(action = ?outcome.action, changes = outcome.events.len(), "processed entity");

        let _ = self.items_tx.send(outcome.item);
        self.emit(outcome.events);

        if after_idle {
            // The gap spent parked is not processing cost; restart the
            // elapsed-time baseline instead of letting it crank the delay.
            self.pacing.rebaseline();
        } else {
            self.pacing.record_tick();
        }
    }

    fn emit(&self, events: Vec<ListChange<T>>) {
        for event in events {
            self.metrics.record_notification();
            let _ = self.changes_tx.send(event);
        }
    }
}
