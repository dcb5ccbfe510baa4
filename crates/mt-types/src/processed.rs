use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryMap};
use crate::greens::{GreensTensor, SourceWavelet};
use crate::waveform::Stream;

/// Processed observed waveforms, per category, one stream per station
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedWaveformSet {
    pub categories: CategoryMap<Vec<Stream>>,
}

impl ProcessedWaveformSet {
    pub fn get(&self, category: Category) -> Option<&[Stream]> {
        self.categories.get(&category).map(Vec::as_slice)
    }

    pub fn station_count(&self) -> usize {
        self.categories.values().map(Vec::len).max().unwrap_or(0)
    }
}

/// Processed Green's tensors, per category, origin depth and source wavelet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedGreensSet {
    /// Depth of each origin, in the order of the grid's depth axis.
    pub depths_in_m: Vec<f64>,
    /// Wavelet convolved into each slot. One entry per grid magnitude, or a
    /// single entry shared by every magnitude.
    pub wavelets: Vec<SourceWavelet>,
    /// `categories[c][origin_index][wavelet_index]` holds one tensor per
    /// station, in the same station order as the processed data.
    pub categories: CategoryMap<Vec<Vec<Vec<GreensTensor>>>>,
}

impl ProcessedGreensSet {
    /// Tensors for a category at one origin, convolved with the wavelet of
    /// the given magnitude.
    pub fn get(
        &self,
        category: Category,
        origin_index: usize,
        magnitude_index: usize,
    ) -> Option<&[GreensTensor]> {
        let wavelet_index = if self.wavelets.len() == 1 {
            0
        } else {
            magnitude_index
        };
        self.categories
            .get(&category)
            .and_then(|per_origin| per_origin.get(origin_index))
            .and_then(|per_wavelet| per_wavelet.get(wavelet_index))
            .map(Vec::as_slice)
    }

    pub fn origin_count(&self) -> usize {
        self.depths_in_m.len()
    }
}

/// State replicated to every worker by the coordinator's broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedInputs {
    pub data: ProcessedWaveformSet,
    pub greens: ProcessedGreensSet,
}

impl ReplicatedInputs {
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.data.categories.keys().copied()
    }
}
