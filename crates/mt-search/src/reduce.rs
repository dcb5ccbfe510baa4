//! Reassembly of per-worker misfit segments and best-fit selection.

use mt_types::{MtError, MtResult};
use serde::{Deserialize, Serialize};

use crate::partition::WorkPartition;

/// Full misfit vector with its minimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    pub misfits: Vec<f64>,
    pub best_index: usize,
    pub best_misfit: f64,
}

/// Concatenate segments, listed in worker order, into grid order.
///
/// Segment `w` must have exactly the length of worker `w`'s range.
pub fn concatenate(partition: &WorkPartition, segments: Vec<Vec<f64>>) -> MtResult<Vec<f64>> {
    partition.validate()?;
    if segments.len() != partition.worker_count() {
        return Err(MtError::Partition(format!(
            "received {} segments for {} workers",
            segments.len(),
            partition.worker_count()
        )));
    }

    let mut misfits = Vec::with_capacity(partition.total);
    for (range, segment) in partition.ranges.iter().zip(segments) {
        if segment.len() != range.len() {
            return Err(MtError::Partition(format!(
                "worker {} returned {} values for range [{}, {})",
                range.worker,
                segment.len(),
                range.start,
                range.end
            )));
        }
        misfits.extend(segment);
    }
    Ok(misfits)
}

/// Index and value of the smallest misfit; ties go to the lowest index.
///
/// NaN entries are never selected. Returns `None` for an empty vector or one
/// containing only NaN.
pub fn argmin(misfits: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &value) in misfits.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((i, value)),
        }
    }
    best
}

/// Concatenate worker segments and select the best grid index.
pub fn reduce(partition: &WorkPartition, segments: Vec<Vec<f64>>) -> MtResult<Reduction> {
    let misfits = concatenate(partition, segments)?;
    let (best_index, best_misfit) = argmin(&misfits)
        .ok_or_else(|| MtError::Internal("no valid misfit to minimize".to_string()))?;
    Ok(Reduction {
        misfits,
        best_index,
        best_misfit,
    })
}
