//! Property-based tests for qr-ingest
//!
//! Uses proptest to check the pipeline invariants across randomized inputs

mod common;

use proptest::prelude::*;
use qr_ingest::{classify, DedupFilter, FragmentKind, IngestionQueue, ScanConfig};
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Strategies
// ============================================================================

/// Distinct fragment strings
fn fragments_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9]{1,12}", 0..80).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, s)| format!("{}-{}", i, s))
            .collect()
    })
}

/// Arbitrary scanner output
fn raw_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ".{0,40}",
        "(ur|UR):[a-z-]{1,16}/[0-9a-z/-]{0,24}",
        "B\\$[0-9A-Z]{2,20}",
        "[0-9A-Z$*+./:-]{1,40}",
    ]
}

// ============================================================================
// Queue Properties
// ============================================================================

proptest! {
    /// Property: the queue never exceeds its capacity and keeps the newest
    /// fragments in arrival order
    #[test]
    fn prop_queue_keeps_newest(
        items in fragments_strategy(),
        capacity in 1usize..32,
    ) {
        let mut queue: IngestionQueue = IngestionQueue::new(capacity);
        let mut evicted = 0usize;
        for item in &items {
            if queue.enqueue(item.clone()).is_some() {
                evicted += 1;
            }
            prop_assert!(queue.len() <= capacity);
        }

        let kept = items.len().min(capacity);
        let expected: Vec<String> = items[items.len() - kept..].to_vec();
        prop_assert_eq!(queue.iter().cloned().collect::<Vec<_>>(), expected);
        prop_assert_eq!(evicted, items.len() - kept);
    }
}

// ============================================================================
// Dedup Properties
// ============================================================================

proptest! {
    /// Property: inside the TTL a fragment is accepted exactly once, however
    /// often it is offered
    #[test]
    fn prop_dedup_single_accept_within_ttl(
        fragment in "[ -~]{1,64}",
        offsets in prop::collection::vec(0u64..2_000, 1..50),
    ) {
        let mut filter = DedupFilter::new(Duration::from_millis(2_000), 200);
        let t0 = Instant::now();
        prop_assert!(filter.should_accept(&fragment, t0));

        let mut offsets = offsets;
        offsets.sort_unstable();
        for offset in offsets {
            let now = t0 + Duration::from_millis(offset);
            prop_assert!(!filter.should_accept(&fragment, now));
        }
        prop_assert!(filter.should_accept(&fragment, t0 + Duration::from_millis(2_000)));
    }

    /// Property: sweeping keeps the table within one entry of the threshold
    #[test]
    fn prop_dedup_sweep_bounds_table(
        count in 1usize..600,
    ) {
        let mut filter = DedupFilter::new(Duration::from_millis(10), 50);
        let t0 = Instant::now();
        for i in 0..count {
            // One new fragment per millisecond: at most 10 are live at once
            let now = t0 + Duration::from_millis(i as u64);
            let key = format!("f{}", i);
            prop_assert!(filter.should_accept(&key, now));
            prop_assert!(filter.len() <= 51);
        }
    }
}

// ============================================================================
// Classification Properties
// ============================================================================

proptest! {
    /// Property: classification is total and deterministic
    #[test]
    fn prop_classify_is_total(raw in raw_strategy()) {
        let first = classify(&raw);
        prop_assert_eq!(&first, &classify(&raw));
        if raw.is_empty() {
            prop_assert_eq!(first.kind(), FragmentKind::Unrecognized);
        }
    }

    /// Property: BBQR headers always classify as BBQR parts
    #[test]
    fn prop_bbqr_prefix(body in "[0-9A-Z]{0,30}") {
        let raw = format!("B${}", body);
        prop_assert_eq!(classify(&raw).kind(), FragmentKind::BbqrPart);
    }
}

// ============================================================================
// Session Properties
// ============================================================================

proptest! {
    /// Property: whatever the scanner produces, at most one payload is
    /// delivered
    #[test]
    fn prop_at_most_once_delivery(
        raws in prop::collection::vec(raw_strategy(), 0..40),
        animated in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let config = ScanConfig { animated, ..Default::default() };
            let h = common::harness(config);
            for raw in &raws {
                h.session.on_fragment(raw);
                tokio::task::yield_now().await;
            }
            h.session.settle().await;
            assert!(h.delivered.lock().len() <= 1);
            if h.delivered.lock().len() == 1 {
                assert!(h.session.is_locked());
            }
        });
    }
}
