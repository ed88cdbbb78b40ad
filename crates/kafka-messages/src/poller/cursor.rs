//! Per-partition read cursors.

use crate::broker::PartitionInfo;
use crate::model::SeekDirection;

/// Where a partition starts, once any timestamp has been looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartPoint {
    Beginning,
    Offset(i64),
    /// First offset at or after the requested timestamp; `None` if every
    /// record is older.
    Timestamp(Option<i64>),
}

/// Reads one partition in windows of offsets.
///
/// FORWARD walks `[start, high)` upwards. BACKWARD treats `start` as an
/// exclusive upper bound and walks down to `low`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionCursor {
    pub partition: i32,
    pub direction: SeekDirection,
    next: i64,
    low: i64,
    high: i64,
}

impl PartitionCursor {
    pub fn new(info: &PartitionInfo, start: StartPoint, direction: SeekDirection) -> Self {
        let (low, high) = (info.low, info.high.max(info.low));
        let next = match (start, direction) {
            (StartPoint::Beginning, SeekDirection::Forward) => low,
            (StartPoint::Beginning, SeekDirection::Backward) => high,
            (StartPoint::Offset(offset), SeekDirection::Forward) => offset.clamp(low, high),
            (StartPoint::Offset(offset), SeekDirection::Backward) => {
                offset.saturating_add(1).clamp(low, high)
            }
            (StartPoint::Timestamp(found), _) => found.unwrap_or(high).clamp(low, high),
        };
        Self {
            partition: info.partition,
            direction,
            next,
            low,
            high,
        }
    }

    /// The next `[from, until)` window of at most `batch` offsets, or `None`
    /// when the partition is exhausted.
    pub fn next_window(&self, batch: usize) -> Option<(i64, i64)> {
        let batch = batch.max(1) as i64;
        match self.direction {
            SeekDirection::Forward if self.next < self.high => {
                Some((self.next, self.next.saturating_add(batch).min(self.high)))
            }
            SeekDirection::Backward if self.next > self.low => {
                Some(((self.next - batch).max(self.low), self.next))
            }
            _ => None,
        }
    }

    /// Moves past a window returned by [`Self::next_window`].
    pub fn advance(&mut self, (from, until): (i64, i64)) {
        match self.direction {
            SeekDirection::Forward => self.next = until,
            SeekDirection::Backward => self.next = from,
        }
    }

    /// Offsets left to read.
    pub fn remaining(&self) -> i64 {
        match self.direction {
            SeekDirection::Forward => self.high - self.next,
            SeekDirection::Backward => self.next - self.low,
        }
    }
}
