//! Shared fixtures: a market-quote entity and helpers for driving a
//! tracker to a known state.

use std::cmp::Ordering;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::broadcast;
use tracker::{ListChange, Trackable, Tracker, TrackerConfig};

/// Instrument quote keyed by symbol; price drives the natural order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub symbol: String,
    pub price_ticks: i64,
    pub size: u64,
}

impl Quote {
    pub fn new(symbol: &str, price_ticks: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_ticks,
            size: 0,
        }
    }

    pub fn sized(symbol: &str, price_ticks: i64, size: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_ticks,
            size,
        }
    }
}

impl Trackable for Quote {
    type Key = String;

    fn identity(&self) -> String {
        self.symbol.clone()
    }

    fn merge_from(&mut self, newer: &Self) {
        self.price_ticks = newer.price_ticks;
        self.size = newer.size;
    }

    fn default_order(&self, other: &Self) -> Ordering {
        self.price_ticks
            .cmp(&other.price_ticks)
            .then_with(|| self.symbol.cmp(&other.symbol))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn fast_config() -> TrackerConfig {
    TrackerConfig::default()
        .with_processing_interval(Duration::from_millis(5))
        .with_pacing_fuzziness(Duration::from_millis(1))
}

/// Poll until the view's symbols equal `expected`, returning the snapshot.
pub async fn wait_for_view(tracker: &Tracker<Quote>, expected: &[&str]) -> Result<Vec<Quote>> {
    let mut last = Vec::new();
    for attempt in 0..500 {
        let snapshot = tracker.snapshot().await?;
        let symbols: Vec<&str> = snapshot.iter().map(|q| q.symbol.as_str()).collect();
        if symbols == expected {
            tracing::debug!(attempt, ?expected, "view converged");
            return Ok(snapshot);
        }
        last = snapshot;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    bail!("view never converged to {expected:?}, last saw {last:?}")
}

/// Everything currently buffered on a change subscription.
pub fn drain_changes(rx: &mut broadcast::Receiver<ListChange<Quote>>) -> Vec<ListChange<Quote>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
