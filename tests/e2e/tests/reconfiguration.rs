//! Runtime reconfiguration scenarios: comparator swaps, predicate
//! install/replace/clear, interval changes, and disposal.

use std::time::Duration;

use assert_matches::assert_matches;
use livelist_e2e_tests::fixtures::{
    drain_changes, fast_config, init_tracing, wait_for_view, Quote,
};
use tracker::{filter_fn, order_fn, ListChange, TrackError, Trackable, Tracker};

#[tokio::test(start_paused = true)]
async fn comparator_inversion_emits_exactly_one_reset() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());

    for (symbol, price) in [("A", 10), ("B", 20), ("C", 30)] {
        tracker.enqueue(Quote::new(symbol, price)).expect("enqueue");
    }
    wait_for_view(&tracker, &["A", "B", "C"]).await.expect("converge");

    let mut changes = tracker.changes().expect("changes");
    tracker
        .set_comparator(Some(order_fn(|a: &Quote, b: &Quote| b.default_order(a))))
        .await
        .expect("set comparator");

    wait_for_view(&tracker, &["C", "B", "A"]).await.expect("converge");
    assert_eq!(drain_changes(&mut changes), vec![ListChange::Reset]);

    tracker.dispose().await.expect("dispose");
}

#[tokio::test(start_paused = true)]
async fn clearing_comparator_returns_to_natural_order() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());

    for (symbol, price) in [("A", 10), ("B", 20)] {
        tracker.enqueue(Quote::new(symbol, price)).expect("enqueue");
    }
    wait_for_view(&tracker, &["A", "B"]).await.expect("converge");

    tracker
        .set_comparator(Some(order_fn(|a: &Quote, b: &Quote| b.default_order(a))))
        .await
        .expect("invert");
    wait_for_view(&tracker, &["B", "A"]).await.expect("inverted");

    tracker.set_comparator(None).await.expect("clear");
    wait_for_view(&tracker, &["A", "B"]).await.expect("natural");

    tracker.dispose().await.expect("dispose");
}

#[tokio::test(start_paused = true)]
async fn hiding_everything_then_clearing_restores_same_instances() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());

    for (symbol, price) in [("A", 10), ("B", 20), ("C", 30)] {
        tracker.enqueue(Quote::sized(symbol, price, 7)).expect("enqueue");
    }
    wait_for_view(&tracker, &["A", "B", "C"]).await.expect("converge");

    let mut changes = tracker.changes().expect("changes");
    tracker
        .set_filter(Some(filter_fn(|_: &Quote, _, _| false)))
        .await
        .expect("hide all");

    wait_for_view(&tracker, &[]).await.expect("hidden");
    let hidden = drain_changes(&mut changes);
    assert_eq!(hidden.len(), 3);
    assert!(hidden.iter().all(|event| matches!(event, ListChange::Removed { .. })));

    tracker.set_filter(None).await.expect("clear filter");
    wait_for_view(&tracker, &["A", "B", "C"]).await.expect("restored");

    let restored = drain_changes(&mut changes);
    assert_eq!(restored.len(), 3);
    for (position, event) in restored.iter().enumerate() {
        assert_matches!(event, ListChange::Added { item, index } if *index == position && item.size == 7);
    }

    assert_eq!(tracker.master_snapshot().await.expect("master").len(), 3);
    tracker.dispose().await.expect("dispose");
}

#[tokio::test(start_paused = true)]
async fn replacing_predicate_announces_only_the_membership_diff() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());
    tracker
        .set_filter(Some(filter_fn(|quote: &Quote, _, _| quote.price_ticks < 30)))
        .await
        .expect("install");

    for (symbol, price) in [("A", 10), ("B", 20), ("C", 30)] {
        tracker.enqueue(Quote::new(symbol, price)).expect("enqueue");
    }
    wait_for_view(&tracker, &["A", "B"]).await.expect("converge");

    let mut changes = tracker.changes().expect("changes");
    tracker
        .set_filter(Some(filter_fn(|quote: &Quote, _, _| quote.price_ticks > 10)))
        .await
        .expect("replace");

    wait_for_view(&tracker, &["B", "C"]).await.expect("converge");

    // B stays visible and is not re-announced.
    let events = drain_changes(&mut changes);
    assert_eq!(events.len(), 2);
    assert_matches!(&events[0], ListChange::Removed { item, index: 0 } if item.symbol == "A");
    assert_matches!(&events[1], ListChange::Added { item, index: 1 } if item.symbol == "C");

    tracker.dispose().await.expect("dispose");
}

#[tokio::test(start_paused = true)]
async fn interval_change_takes_effect_for_subsequent_ticks() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());

    tracker.enqueue(Quote::new("A", 10)).expect("enqueue");
    wait_for_view(&tracker, &["A"]).await.expect("converge");

    tracker
        .set_processing_interval(Duration::from_millis(80))
        .await
        .expect("set interval");

    let started = tokio::time::Instant::now();
    tracker.enqueue(Quote::new("B", 20)).expect("enqueue");
    tracker.enqueue(Quote::new("C", 30)).expect("enqueue");
    wait_for_view(&tracker, &["A", "B", "C"]).await.expect("converge");

    assert!(started.elapsed() >= Duration::from_millis(80));

    tracker.dispose().await.expect("dispose");
}

#[tokio::test(start_paused = true)]
async fn disposal_is_terminal_for_every_clone() {
    init_tracing();
    let tracker = Tracker::spawn(fast_config());
    let clone = tracker.clone();

    tracker.enqueue(Quote::new("A", 10)).expect("enqueue");
    wait_for_view(&tracker, &["A"]).await.expect("converge");

    tracker.dispose().await.expect("dispose");

    assert_eq!(tracker.dispose().await.err(), Some(TrackError::Disposed));
    assert_eq!(clone.enqueue(Quote::new("B", 20)).err(), Some(TrackError::Disposed));
    assert_eq!(clone.remove_item(Quote::new("A", 10)).await.err(), Some(TrackError::Disposed));
    assert_eq!(clone.snapshot().await.err(), Some(TrackError::Disposed));
    assert_eq!(clone.subscribe().err(), Some(TrackError::Disposed));
    assert_eq!(clone.changes().err(), Some(TrackError::Disposed));
}
