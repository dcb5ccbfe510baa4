//! Division of the grid index range across a fixed pool of workers.

use mt_types::{ConfigError, MtError, MtResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Half-open index range `[start, end)` owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRange {
    pub worker: usize,
    pub start: usize,
    pub end: usize,
}

impl WorkRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Contiguous assignment of `[0, total)` to workers `0..W`
///
/// The first `total % W` workers receive one extra index, so chunk sizes
/// differ by at most one and no index is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPartition {
    pub total: usize,
    pub ranges: Vec<WorkRange>,
}

impl WorkPartition {
    pub fn new(total: usize, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let base = total / workers;
        let remainder = total % workers;

        let mut ranges = Vec::with_capacity(workers);
        let mut start = 0;
        for worker in 0..workers {
            let len = base + usize::from(worker < remainder);
            ranges.push(WorkRange {
                worker,
                start,
                end: start + len,
            });
            start += len;
        }

        let partition = Self { total, ranges };
        debug_assert!(partition.validate().is_ok());
        Ok(partition)
    }

    pub fn worker_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn range(&self, worker: usize) -> Option<&WorkRange> {
        self.ranges.get(worker)
    }

    /// Check that the ranges are ascending, disjoint and cover `[0, total)`.
    pub fn validate(&self) -> MtResult<()> {
        let mut expected_start = 0;
        for (position, range) in self.ranges.iter().enumerate() {
            if range.worker != position {
                return Err(MtError::Partition(format!(
                    "range at position {position} belongs to worker {}",
                    range.worker
                )));
            }
            if range.start > range.end {
                return Err(MtError::Partition(format!(
                    "worker {} has inverted range [{}, {})",
                    range.worker, range.start, range.end
                )));
            }
            if range.start != expected_start {
                return Err(MtError::Partition(format!(
                    "worker {} starts at {} but {} was expected ({})",
                    range.worker,
                    range.start,
                    expected_start,
                    if range.start < expected_start { "overlap" } else { "gap" }
                )));
            }
            expected_start = range.end;
        }
        if expected_start != self.total {
            return Err(MtError::Partition(format!(
                "ranges cover [0, {expected_start}) but the grid has {} points",
                self.total
            )));
        }
        Ok(())
    }
}
