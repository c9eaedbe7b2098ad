//! Splits a requested window into bounded sub-windows so only one batch worth of samples is held in memory at a time.

use crate::TimeRange;
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use std::time::Duration;

pub const DEFAULT_BATCH_SPAN: Duration = Duration::from_secs(6 * 60 * 60);

/// Partitions `range` into consecutive batches of at most `max_span`.
///
/// A range no longer than `max_span` comes back as a single batch equal to the range. The last batch is clipped to
/// `range.end`. A zero `max_span` disables splitting.
pub fn plan(range: &TimeRange, max_span: Duration) -> BatchPlan {
    let span = TimeDelta::from_std(max_span).unwrap_or(TimeDelta::MAX);
    let span = if span <= TimeDelta::zero() { TimeDelta::MAX } else { span };
    BatchPlan {
        next_start: range.start,
        end: range.end,
        step: range.step,
        span,
        done: false,
    }
}

/// Ordered, finite sequence of batches, fully determined by the arguments given to [`plan`].
#[derive(Debug, Clone)]
pub struct BatchPlan {
    next_start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    span: TimeDelta,
    done: bool,
}

impl Iterator for BatchPlan {
    type Item = TimeRange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.next_start;
        let end = start
            .checked_add_signed(self.span)
            .map_or(self.end, |end| end.min(self.end));
        if end >= self.end {
            self.done = true;
        } else {
            self.next_start = end;
        }
        Some(TimeRange::new(start, end, self.step))
    }
}

impl std::iter::FusedIterator for BatchPlan {}
