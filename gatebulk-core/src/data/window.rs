//! Window planner — tiles a time span into page-sized request windows.
//!
//! Each window covers at most `page_limit × interval` so that a single
//! candlesticks request never exceeds the exchange's per-page record cap.
//! Windows are contiguous and share only their boundaries; the last one may
//! be shorter (or zero-width) and always ends exactly at the span end.

use super::interval::Interval;
use chrono::{DateTime, TimeDelta, Utc};

/// Maximum candlesticks the exchange returns for one request.
pub const MAX_PAGE_RECORDS: u32 = 2000;

/// One request window, both ends inclusive on the exchange side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn start_ts(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_ts(&self) -> i64 {
        self.end.timestamp()
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Lazy sequence of windows over `[start, end]`.
///
/// Cloning a plan yields an independent iterator from the same position,
/// so a plan can be replayed.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
    done: bool,
}

impl WindowPlan {
    /// Plan windows sized for the exchange page cap.
    pub fn new(interval: Interval, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::with_page_limit(interval, start, end, MAX_PAGE_RECORDS)
    }

    /// Plan windows of `page_limit` candlesticks each. A zero limit is treated as one.
    pub fn with_page_limit(
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_limit: u32,
    ) -> Self {
        let step = TimeDelta::minutes(i64::from(page_limit.max(1)) * interval.minutes());
        Self {
            cursor: start,
            end,
            step,
            done: false,
        }
    }

    /// Width of every full window.
    pub fn step(&self) -> TimeDelta {
        self.step
    }
}

impl Iterator for WindowPlan {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.done {
            return None;
        }

        let next = self.cursor + self.step;
        if next < self.end {
            let window = Window {
                start: self.cursor,
                end: next,
            };
            self.cursor = next;
            Some(window)
        } else {
            self.done = true;
            Some(Window {
                start: self.cursor,
                end: self.end,
            })
        }
    }
}

/// Plan the windows for `interval` over `[start, end]`.
pub fn plan_windows(interval: Interval, start: DateTime<Utc>, end: DateTime<Utc>) -> WindowPlan {
    WindowPlan::new(interval, start, end)
}
