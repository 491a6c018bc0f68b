//! Property tests for paging and merge invariants.
//!
//! Uses proptest to verify:
//! 1. Window tiling — windows are contiguous, cover `[start, end]` exactly,
//!    and never exceed one page of candlesticks
//! 2. Window count — `ceil(span / step)`, with a single window for an empty span
//! 3. Merge ordering — `all.csv` holds every page row, sorted by time

use chrono::{DateTime, TimeDelta, Utc};
use gatebulk_core::data::{
    Candlestick, Interval, MergeOutcome, Merger, PageStore, WindowPlan, MAX_PAGE_RECORDS,
};
use proptest::prelude::*;
use std::time::Duration;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_interval() -> impl Strategy<Value = Interval> {
    prop::sample::select(Interval::ALL.to_vec())
}

/// Somewhere between 2015 and 2030, to the second.
fn arb_start() -> impl Strategy<Value = DateTime<Utc>> {
    (1_420_070_400_i64..1_893_456_000).prop_map(|ts| DateTime::from_timestamp(ts, 0).unwrap())
}

/// Up to roughly 20 years of span, including zero.
fn arb_span_secs() -> impl Strategy<Value = i64> {
    prop_oneof![Just(0_i64), 1_i64..3_600, 3_600_i64..631_152_000]
}

fn arb_page_limit() -> impl Strategy<Value = u32> {
    prop_oneof![Just(MAX_PAGE_RECORDS), 1_u32..=MAX_PAGE_RECORDS]
}

// ── 1. Tiling ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn windows_tile_the_range(
        interval in arb_interval(),
        start in arb_start(),
        span in arb_span_secs(),
        page_limit in arb_page_limit(),
    ) {
        let end = start + TimeDelta::seconds(span);
        let plan = WindowPlan::with_page_limit(interval, start, end, page_limit);
        let step = plan.step();
        let windows: Vec<_> = plan.collect();

        prop_assert!(!windows.is_empty());
        prop_assert_eq!(windows[0].start, start);
        prop_assert_eq!(windows[windows.len() - 1].end, end);

        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        for (i, window) in windows.iter().enumerate() {
            prop_assert!(window.start <= window.end);
            prop_assert!(window.span() <= step);
            if i + 1 < windows.len() {
                prop_assert_eq!(window.span(), step);
            }
        }
    }
}

// ── 2. Count ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn window_count_is_ceiling_of_span_over_step(
        interval in arb_interval(),
        start in arb_start(),
        span in arb_span_secs(),
    ) {
        let end = start + TimeDelta::seconds(span);
        let plan = WindowPlan::new(interval, start, end);
        let step = plan.step().num_seconds();
        let expected = ((span + step - 1) / step).max(1) as usize;

        prop_assert_eq!(plan.clone().count(), expected);
        // Replaying a cloned plan gives the same windows.
        prop_assert_eq!(plan.clone().collect::<Vec<_>>(), plan.collect::<Vec<_>>());
    }
}

// ── 3. Merge ordering ────────────────────────────────────────────────

fn candle(t: i64) -> Candlestick {
    Candlestick {
        t,
        v: "1".into(),
        c: "1".into(),
        h: "1".into(),
        l: "1".into(),
        o: "1".into(),
        sum: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn merged_file_is_sorted_and_complete(
        pages in prop::collection::vec(
            prop::collection::vec(0_i64..10_000_000, 1..40),
            1..6,
        ),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = PageStore::new(dir.path());
        let mut total = 0;
        for (i, page) in pages.iter().enumerate() {
            let rows: Vec<Candlestick> = page.iter().map(|&t| candle(t)).collect();
            total += rows.len();
            store
                .write_page("BTC_USDT", Interval::M1, i as i64 * 60, &rows)
                .unwrap();
        }

        let outcome = Merger::new(&store, Duration::ZERO)
            .merge("BTC_USDT", Interval::M1)
            .unwrap();
        prop_assert_eq!(
            outcome,
            MergeOutcome::Merged {
                path: store.combined_path("BTC_USDT", Interval::M1),
                pages: pages.len(),
                rows: total,
            }
        );

        let mut reader =
            csv::Reader::from_path(store.combined_path("BTC_USDT", Interval::M1)).unwrap();
        let times: Vec<String> = reader
            .records()
            .map(|r| r.unwrap().get(0).unwrap().to_string())
            .collect();
        prop_assert_eq!(times.len(), total);
        // Fixed-width "%Y-%m-%d %H:%M:%S" sorts lexically like chronologically.
        prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }
}
