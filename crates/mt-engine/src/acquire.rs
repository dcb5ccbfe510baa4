//! Coordinator-side acquisition of the replicated inputs.

use mt_search::Grid;
use mt_types::{
    AcquisitionError, CategoryMap, DataProcessor, GreensTensor, MtResult, Origin,
    ProcessedGreensSet, ProcessedWaveformSet, ReplicatedInputs, SourceWavelet, Station,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::role::CoordinatorIo;

/// Origins searched over: one per grid depth, or the catalog origin.
pub fn search_origins(grid: &Grid, catalog: &Origin) -> Vec<Origin> {
    if grid.depths().is_empty() {
        vec![catalog.clone()]
    } else {
        grid.depths().iter().map(|d| catalog.at_depth(*d)).collect()
    }
}

/// A fixed wavelet for every magnitude, or one trapezoid per grid magnitude.
pub fn search_wavelets(grid: &Grid, fixed: Option<SourceWavelet>) -> Vec<SourceWavelet> {
    match fixed {
        Some(wavelet) => vec![wavelet],
        None => grid
            .magnitudes()
            .iter()
            .map(|mw| SourceWavelet::trapezoid(*mw))
            .collect(),
    }
}

fn process_greens(
    processor: &dyn DataProcessor,
    tensors: &[GreensTensor],
) -> Result<Vec<GreensTensor>, AcquisitionError> {
    tensors
        .par_iter()
        .map(|tensor| tensor.map(|stream| processor.process(stream)))
        .collect()
}

/// Read, curate and process waveforms, then fetch and process Green's
/// functions for every origin of the grid.
pub fn acquire(io: &CoordinatorIo<'_>, grid: &Grid, event_id: &str) -> MtResult<ReplicatedInputs> {
    let mut dataset = io.reader.read(&io.inputs.data_path, event_id)?;
    info!(
        "Read {} stations for event {}",
        dataset.streams.len(),
        event_id
    );

    if let Some(weights) = &io.inputs.weights {
        weights.remove_unused_stations(&mut dataset);
    }
    dataset.sort_by_distance();
    if dataset.streams.is_empty() {
        return Err(AcquisitionError::NoStations.into());
    }
    let stations: Vec<Station> = dataset.stations();

    let mut data = ProcessedWaveformSet::default();
    for (category, processor) in io.processors {
        let streams = dataset
            .streams
            .par_iter()
            .map(|stream| processor.process(stream))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Processed {} streams for {}", streams.len(), category);
        data.categories.insert(*category, streams);
    }

    let origins = search_origins(grid, &dataset.origin);
    let wavelets = search_wavelets(grid, io.inputs.wavelet);
    debug!("Convolving Green's functions with {:?}", wavelets);

    let mut greens = ProcessedGreensSet {
        depths_in_m: origins.iter().map(|o| o.depth_in_m).collect(),
        wavelets: wavelets.clone(),
        categories: io
            .processors
            .keys()
            .map(|c| (*c, Vec::with_capacity(origins.len())))
            .collect::<CategoryMap<_>>(),
    };

    for origin in &origins {
        let tensors = io.greens.fetch(&stations, origin)?;
        if tensors.len() != stations.len() {
            return Err(AcquisitionError::GreensUnavailable {
                station: "*".to_string(),
                depth_in_m: origin.depth_in_m,
                message: format!(
                    "provider returned {} tensors for {} stations",
                    tensors.len(),
                    stations.len()
                ),
            }
            .into());
        }

        let mut per_category: CategoryMap<Vec<Vec<GreensTensor>>> = io
            .processors
            .keys()
            .map(|c| (*c, Vec::with_capacity(wavelets.len())))
            .collect();
        for wavelet in &wavelets {
            let mut convolved = tensors.clone();
            convolved.par_iter_mut().for_each(|g| g.convolve(wavelet));
            for (category, processor) in io.processors {
                let processed = process_greens(processor.as_ref(), &convolved)?;
                if let Some(per_wavelet) = per_category.get_mut(category) {
                    per_wavelet.push(processed);
                }
            }
        }
        for (category, per_wavelet) in per_category {
            if let Some(per_origin) = greens.categories.get_mut(&category) {
                per_origin.push(per_wavelet);
            }
        }
        info!(
            "Prepared Green's functions at {} m for {} wavelets",
            origin.depth_in_m,
            wavelets.len()
        );
    }

    Ok(ReplicatedInputs { data, greens })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RunInputs;
    use chrono::Utc;
    use mt_data::{MemorySink, SyntheticGreens, SyntheticReader, WeightTable};
    use mt_search::GridConfig;
    use mt_types::{Category, SourceParameterVector, Stream};
    use std::sync::Arc;

    struct Identity;

    impl DataProcessor for Identity {
        fn process(&self, stream: &Stream) -> Result<Stream, AcquisitionError> {
            Ok(stream.clone())
        }
    }

    fn reader() -> SyntheticReader {
        let origin = Origin::new(61.45, -149.74, 30_000.0, Utc::now());
        let stations = vec![
            Station::new("AK", "FAR", 66.0, -150.0),
            Station::new("AK", "NEAR", 62.0, -150.0),
        ];
        SyntheticReader::new(
            SyntheticGreens::new(1),
            origin,
            stations,
            SourceParameterVector::double_couple(0.0, 45.0, 90.0, 4.5),
        )
    }

    fn processors() -> CategoryMap<Box<dyn DataProcessor>> {
        let mut map: CategoryMap<Box<dyn DataProcessor>> = CategoryMap::new();
        map.insert(Category::SurfaceWaves, Box::new(Identity));
        map
    }

    #[test]
    fn inputs_cover_every_origin_in_distance_order() {
        let reader = reader();
        let processors = processors();
        let greens = SyntheticGreens::new(1);
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &reader,
            processors: &processors,
            greens: &greens,
            sink: &mut sink,
            inputs: RunInputs::new("unused").with_wavelet(SourceWavelet::Impulse),
        };
        let grid = Grid::new(
            GridConfig::double_couple_random(4, 4.5, 0).with_depths(vec![20_000.0, 30_000.0]),
        )
        .unwrap();

        let inputs = acquire(&io, &grid, "evt").unwrap();
        let data = inputs.data.get(Category::SurfaceWaves).unwrap();
        assert_eq!(data[0].station.station, "NEAR");
        assert_eq!(inputs.greens.depths_in_m, vec![20_000.0, 30_000.0]);
        for origin_index in 0..2 {
            let tensors = inputs.greens.get(Category::SurfaceWaves, origin_index, 0).unwrap();
            assert_eq!(tensors.len(), 2);
            assert_eq!(tensors[0].station.station, "NEAR");
        }
    }

    #[test]
    fn weights_remove_unlisted_stations() {
        let reader = reader();
        let processors = processors();
        let greens = SyntheticGreens::new(1);
        let mut sink = MemorySink::new();
        let weights = WeightTable::parse("AK.FAR 500 1 1 1 1 1", "w").unwrap();
        let io = CoordinatorIo {
            reader: &reader,
            processors: &processors,
            greens: &greens,
            sink: &mut sink,
            inputs: RunInputs::new("unused").with_weights(Arc::new(weights)),
        };
        let grid = Grid::new(GridConfig::double_couple_random(4, 4.5, 0)).unwrap();

        let inputs = acquire(&io, &grid, "evt").unwrap();
        assert_eq!(inputs.data.station_count(), 1);
        assert_eq!(inputs.greens.depths_in_m, vec![30_000.0]);
    }

    #[test]
    fn no_remaining_stations_is_an_error() {
        let reader = reader();
        let processors = processors();
        let greens = SyntheticGreens::new(1);
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &reader,
            processors: &processors,
            greens: &greens,
            sink: &mut sink,
            inputs: RunInputs::new("unused").with_weights(Arc::new(WeightTable::default())),
        };
        let grid = Grid::new(GridConfig::double_couple_random(4, 4.5, 0)).unwrap();

        let err = acquire(&io, &grid, "evt").unwrap_err();
        assert!(matches!(
            err,
            mt_types::MtError::Acquisition(AcquisitionError::NoStations)
        ));
    }

    fn acquire_with_magnitudes(magnitudes: Vec<f64>) -> ReplicatedInputs {
        let reader = reader();
        let processors = processors();
        let greens = SyntheticGreens::new(1);
        let mut sink = MemorySink::new();
        let io = CoordinatorIo {
            reader: &reader,
            processors: &processors,
            greens: &greens,
            sink: &mut sink,
            inputs: RunInputs::new("unused"),
        };
        let grid =
            Grid::new(GridConfig::double_couple_random(4, 4.5, 0).with_magnitudes(magnitudes)).unwrap();
        acquire(&io, &grid, "evt").unwrap()
    }

    #[test]
    fn each_magnitude_gets_its_own_wavelet() {
        let both = acquire_with_magnitudes(vec![4.0, 6.0]);
        let small = acquire_with_magnitudes(vec![4.0]);
        let large = acquire_with_magnitudes(vec![6.0]);

        assert_eq!(
            both.greens.wavelets,
            vec![SourceWavelet::trapezoid(4.0), SourceWavelet::trapezoid(6.0)]
        );
        let c = Category::SurfaceWaves;
        assert_eq!(both.greens.get(c, 0, 0), small.greens.get(c, 0, 0));
        assert_eq!(both.greens.get(c, 0, 1), large.greens.get(c, 0, 0));
        assert_ne!(both.greens.get(c, 0, 0), both.greens.get(c, 0, 1));
    }

    #[test]
    fn fixed_wavelet_is_shared_by_all_magnitudes() {
        let grid = Grid::new(
            GridConfig::double_couple_random(4, 4.5, 0).with_magnitudes(vec![4.0, 5.0, 6.0]),
        )
        .unwrap();
        assert_eq!(
            search_wavelets(&grid, Some(SourceWavelet::Impulse)),
            vec![SourceWavelet::Impulse]
        );
        assert_eq!(search_wavelets(&grid, None).len(), 3);
    }
}
