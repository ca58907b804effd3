//! Public Tracker Handle
//!
//! `Tracker<T>` is the cloneable front door to one engine task. Producers
//! enqueue from any context through an unbounded channel; every stateful
//! operation travels over the control channel and runs on the engine task,
//! serialized with processing ticks. Two broadcast signals leave the
//! engine: the accepted-items stream (`subscribe`) and the collection
//! change stream (`changes`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;
use types::{ListChange, Trackable};

use crate::config::TrackerConfig;
use crate::engine::{Command, Engine};
use crate::error::TrackError;
use crate::filtered_view::FilterFn;
use crate::master_list::OrderFn;
use crate::metrics::{TrackerMetrics, TrackerStats};

struct Shared {
    disposed: AtomicBool,
    source_attached: AtomicBool,
}

/// Handle to a live tracking engine.
pub struct Tracker<T: Trackable> {
    ingest_tx: mpsc::UnboundedSender<T>,
    control_tx: mpsc::UnboundedSender<Command<T>>,
    items_tx: broadcast::Sender<T>,
    changes_tx: broadcast::Sender<ListChange<T>>,
    shared: Arc<Shared>,
    metrics: Arc<TrackerMetrics>,
}

impl<T: Trackable> Clone for Tracker<T> {
    fn clone(&self) -> Self {
        Self {
            ingest_tx: self.ingest_tx.clone(),
            control_tx: self.control_tx.clone(),
            items_tx: self.items_tx.clone(),
            changes_tx: self.changes_tx.clone(),
            shared: Arc::clone(&self.shared),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T: Trackable> Tracker<T> {
    /// Start an engine task and return its handle.
    pub fn spawn(config: TrackerConfig) -> Self {
        let (ingest_tx, ingest_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (items_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (changes_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let metrics = Arc::new(TrackerMetrics::default());

        let engine = Engine::new(
            &config,
            ingest_rx,
            control_rx,
            items_tx.clone(),
            changes_tx.clone(),
            Arc::clone(&metrics),
        );
        tokio::spawn(engine.run());
        debug!(interval = ?config.processing_interval, "tracker spawned");

        Self {
            ingest_tx,
            control_tx,
            items_tx,
            changes_tx,
            shared: Arc::new(Shared {
                disposed: AtomicBool::new(false),
                source_attached: AtomicBool::new(false),
            }),
            metrics,
        }
    }

    /// Queue an entity for processing. Safe from any context; enqueues from
    /// one context are drained in order.
    pub fn enqueue(&self, entity: T) -> Result<(), TrackError> {
        self.ensure_live()?;
        self.metrics.record_enqueued();
        self.ingest_tx.send(entity).map_err(|_| TrackError::Disposed)
    }

    /// Alias for [`enqueue`](Self::enqueue).
    pub fn add_item(&self, entity: T) -> Result<(), TrackError> {
        self.enqueue(entity)
    }

    /// Remove the entity with the same identity, immediately and outside
    /// the queue. Resolves once the engine has applied it.
    pub async fn remove_item(&self, entity: T) -> Result<(), TrackError> {
        self.acked(|ack| Command::Remove { entity, ack }).await
    }

    /// Replace the ordering function, or clear back to the natural order.
    /// Triggers a full resort and a single `Reset` notification.
    pub async fn set_comparator(&self, comparator: Option<OrderFn<T>>) -> Result<(), TrackError> {
        self.acked(|ack| Command::SetComparator { comparator, ack }).await
    }

    /// Replace, install, or clear the visibility predicate.
    pub async fn set_filter(&self, filter: Option<FilterFn<T>>) -> Result<(), TrackError> {
        self.acked(|ack| Command::SetFilter { filter, ack }).await
    }

    /// Replace the target processing interval.
    pub async fn set_processing_interval(&self, interval: Duration) -> Result<(), TrackError> {
        self.acked(|ack| Command::SetInterval { interval, ack }).await
    }

    /// Forward a stream of entities into the ingestion queue and mark the
    /// tracker configured for [`subscribe`](Self::subscribe).
    pub fn attach_source<S>(&self, source: S) -> Result<(), TrackError>
    where
        S: Stream<Item = T> + Send + 'static,
    {
        self.ensure_live()?;
        self.shared.source_attached.store(true, Ordering::SeqCst);

        let ingest = self.ingest_tx.clone();
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            let mut source = Box::pin(source);
            while let Some(entity) = source.next().await {
                metrics.record_enqueued();
                if ingest.send(entity).is_err() {
                    debug!("engine gone, detaching source");
                    break;
                }
            }
        });
        Ok(())
    }

    /// Receive every accepted item as the engine processes it. Fails with
    /// `NotConfigured` until a source has been attached. Dropping the
    /// receiver stops delivery, not ingestion.
    pub fn subscribe(&self) -> Result<broadcast::Receiver<T>, TrackError> {
        self.ensure_live()?;
        if !self.shared.source_attached.load(Ordering::SeqCst) {
            return Err(TrackError::NotConfigured);
        }
        Ok(self.items_tx.subscribe())
    }

    /// Receive the filtered view's structural changes, exactly one event
    /// per change, in order.
    pub fn changes(&self) -> Result<broadcast::Receiver<ListChange<T>>, TrackError> {
        self.ensure_live()?;
        Ok(self.changes_tx.subscribe())
    }

    /// Current filtered view contents.
    pub async fn snapshot(&self) -> Result<Vec<T>, TrackError> {
        self.ensure_live()?;
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(Command::ViewSnapshot { reply })
            .map_err(|_| TrackError::Disposed)?;
        response.await.map_err(|_| TrackError::Disposed)
    }

    /// Current master list contents, visible or not.
    pub async fn master_snapshot(&self) -> Result<Vec<T>, TrackError> {
        self.ensure_live()?;
        let (reply, response) = oneshot::channel();
        self.control_tx
            .send(Command::MasterSnapshot { reply })
            .map_err(|_| TrackError::Disposed)?;
        response.await.map_err(|_| TrackError::Disposed)
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> TrackerStats {
        self.metrics.snapshot()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Stop the engine. Every operation on any clone of this handle fails
    /// with `Disposed` afterwards, including a second `dispose`.
    pub async fn dispose(&self) -> Result<(), TrackError> {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return Err(TrackError::Disposed);
        }
        debug!("disposing tracker");
        let (ack, done) = oneshot::channel();
        if self.control_tx.send(Command::Dispose { ack }).is_ok() {
            let _ = done.await;
        }
        Ok(())
    }

    async fn acked(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> Command<T>,
    ) -> Result<(), TrackError> {
        self.ensure_live()?;
        let (ack, done) = oneshot::channel();
        self.control_tx.send(make(ack)).map_err(|_| TrackError::Disposed)?;
        done.await.map_err(|_| TrackError::Disposed)
    }

    fn ensure_live(&self) -> Result<(), TrackError> {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(TrackError::Disposed);
        }
        Ok(())
    }
}
