//! Batch processing over a CSV of coordinates.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{info, warn};

use crate::error::{Error, ParseError, Result};
use crate::geometry::Coordinate;
use crate::pipeline::{ItemPipeline, PipelineOutcome};
use crate::provider::ImageProvider;
use crate::raster::RasterStore;
use crate::vector::VectorStore;

/// Read coordinates from the CSV file at `path`.
///
/// # Errors
/// [`ParseError`] for an unreadable file, a short row or a bad coordinate.
pub fn read_coordinates(
    path: &Path,
    skip_header_row: bool,
) -> std::result::Result<Vec<Coordinate>, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::Csv {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_coordinates(file, skip_header_row, &path.display().to_string())
}

/// Parse coordinates from CSV text.
///
/// With `skip_header_row` the first row is dropped and the first two columns
/// are latitude and longitude. Otherwise a first row whose two leading fields
/// are numeric is data; any other first row is a header, and the `latitude`
/// and `longitude` columns are located by name (first two columns if absent).
///
/// # Errors
/// [`ParseError`] for malformed CSV, a short row or a bad coordinate.
pub fn parse_coordinates<R: Read>(
    reader: R,
    skip_header_row: bool,
    source: &str,
) -> std::result::Result<Vec<Coordinate>, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut columns = (0, 1);
    let mut first_row = true;
    let mut coordinates = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ParseError::Csv {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if std::mem::take(&mut first_row) {
            if skip_header_row {
                continue;
            }
            if !is_data_row(&record) {
                columns = header_columns(&record);
                continue;
            }
        }

        let row = index + 1;
        let (Some(lat), Some(lon)) = (record.get(columns.0), record.get(columns.1)) else {
            return Err(ParseError::MissingColumn { row });
        };
        coordinates.push(Coordinate::parse(lat, lon)?);
    }
    Ok(coordinates)
}

fn is_data_row(record: &StringRecord) -> bool {
    record.len() >= 2 && record.iter().take(2).all(|field| field.parse::<f64>().is_ok())
}

fn header_columns(record: &StringRecord) -> (usize, usize) {
    let position = |name: &str| record.iter().position(|field| field.eq_ignore_ascii_case(name));
    match (position("latitude"), position("longitude")) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => (0, 1),
    }
}

/// Totals of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub total: usize,
    pub skipped_count: usize,
    /// Items that failed; always zero unless failures are tolerated
    pub failed_count: usize,
}

/// Progress callbacks, invoked in item order.
pub trait BatchProgress {
    fn start(&mut self, _total: usize) {}

    fn item(
        &mut self,
        index: usize,
        coordinate: &Coordinate,
        result: std::result::Result<&PipelineOutcome, &Error>,
    );

    fn finish(&mut self, _outcome: &BatchOutcome) {}
}

/// Progress sink that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl BatchProgress for NoProgress {
    fn item(
        &mut self,
        _: usize,
        _: &Coordinate,
        _: std::result::Result<&PipelineOutcome, &Error>,
    ) {
    }
}

/// Runs an [`ItemPipeline`] over coordinates in order.
pub struct BatchRunner<P, R, V> {
    pipeline: ItemPipeline<P, R, V>,
    keep_going: bool,
}

impl<P, R, V> BatchRunner<P, R, V>
where
    P: ImageProvider,
    R: RasterStore,
    V: VectorStore,
{
    #[must_use]
    pub fn new(pipeline: ItemPipeline<P, R, V>) -> Self {
        Self {
            pipeline,
            keep_going: false,
        }
    }

    /// Log and count failed items instead of aborting the batch.
    #[must_use]
    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    #[must_use]
    pub fn pipeline(&self) -> &ItemPipeline<P, R, V> {
        &self.pipeline
    }

    /// Process every coordinate.
    ///
    /// # Errors
    /// The first item failure, unless failures are tolerated.
    pub fn run(
        &self,
        coordinates: &[Coordinate],
        progress: &mut dyn BatchProgress,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome {
            total: coordinates.len(),
            ..BatchOutcome::default()
        };
        progress.start(outcome.total);

        for (index, coordinate) in coordinates.iter().enumerate() {
            let result = self.pipeline.run(coordinate);
            progress.item(index, coordinate, result.as_ref());
            match result {
                Ok(item) if item.skipped => outcome.skipped_count += 1,
                Ok(_) => {}
                Err(err) if self.keep_going => {
                    warn!(
                        lat = coordinate.latitude(),
                        lon = coordinate.longitude(),
                        error = %err,
                        "item failed"
                    );
                    outcome.failed_count += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            total = outcome.total,
            skipped = outcome.skipped_count,
            failed = outcome.failed_count,
            "batch finished"
        );
        progress.finish(&outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineOptions;
    use crate::geometry::ImageSize;
    use crate::pipeline::fakes::*;
    use crate::raster::Raster;

    fn parse(text: &str, skip: bool) -> std::result::Result<Vec<Coordinate>, ParseError> {
        parse_coordinates(text.as_bytes(), skip, "test.csv")
    }

    fn pairs(coordinates: &[Coordinate]) -> Vec<(f64, f64)> {
        coordinates.iter().map(|c| (c.latitude(), c.longitude())).collect()
    }

    #[test]
    fn test_named_header_is_detected() {
        let text = "id,Longitude,Latitude\n1, 121.0 ,14.5\n2,120.5,15.25\n";
        let coords = parse(text, false).unwrap();
        assert_eq!(pairs(&coords), vec![(14.5, 121.0), (15.25, 120.5)]);
    }

    #[test]
    fn test_headerless_first_row_is_data() {
        let coords = parse("14.5,121.0\n\n-1.0,2.0\n", false).unwrap();
        assert_eq!(pairs(&coords), vec![(14.5, 121.0), (-1.0, 2.0)]);
    }

    #[test]
    fn test_skip_header_row_drops_first_row() {
        let coords = parse("14.5,121.0\n-1.0,2.0\n", true).unwrap();
        assert_eq!(pairs(&coords), vec![(-1.0, 2.0)]);

        let coords = parse("lon,lat\n14.5,121.0\n", true).unwrap();
        assert_eq!(pairs(&coords), vec![(14.5, 121.0)]);
    }

    #[test]
    fn test_bad_rows_are_parse_errors() {
        assert_eq!(parse("lat,lon\n1.0\n", false), Err(ParseError::MissingColumn { row: 2 }));
        assert!(matches!(parse("a,b\nx,2.0\n", false), Err(ParseError::NotANumber { .. })));
        assert!(matches!(parse("91.0,0.0\n", false), Err(ParseError::LatitudeOutOfRange(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_coordinates(Path::new("/nonexistent/points.csv"), false),
            Err(ParseError::Csv { .. })
        ));
    }

    fn coordinates(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate::new(10.0 + i as f64, 120.0).unwrap())
            .collect()
    }

    fn options() -> PipelineOptions {
        PipelineOptions::default()
            .with_output_root("out")
            .with_size(ImageSize::new(4, 4))
    }

    #[derive(Default)]
    struct Recorder {
        started: Option<usize>,
        items: Vec<(usize, bool)>,
        finished: Option<BatchOutcome>,
    }

    impl BatchProgress for Recorder {
        fn start(&mut self, total: usize) {
            self.started = Some(total);
        }

        fn item(
            &mut self,
            index: usize,
            _: &Coordinate,
            result: std::result::Result<&PipelineOutcome, &Error>,
        ) {
            self.items.push((index, result.is_ok()));
        }

        fn finish(&mut self, outcome: &BatchOutcome) {
            self.finished = Some(*outcome);
        }
    }

    fn runner<'a>(
        options: PipelineOptions,
        provider: &'a FakeProvider,
        rasters: &'a MemoryRasters,
        vectors: &'a MemoryVectors,
    ) -> BatchRunner<&'a FakeProvider, &'a MemoryRasters, &'a MemoryVectors> {
        BatchRunner::new(ItemPipeline::new(options, provider, rasters, vectors).unwrap())
    }

    #[test]
    fn test_counts_pre_existing_images_as_skipped() {
        let (provider, rasters, vectors) = (
            FakeProvider::default(),
            MemoryRasters::default(),
            MemoryVectors::default(),
        );
        let coords = coordinates(5);
        for c in &coords[1..3] {
            let existing = Raster::new(vec![0; 48], 3, 4, 4).unwrap();
            rasters.insert(&options().artifacts(c).image, existing);
        }
        let runner = runner(options(), &provider, &rasters, &vectors);

        let mut progress = Recorder::default();
        let outcome = runner.run(&coords, &mut progress).unwrap();

        assert_eq!(
            outcome,
            BatchOutcome {
                total: 5,
                skipped_count: 2,
                failed_count: 0
            }
        );
        assert_eq!(provider.fetches.get(), 3);
        assert_eq!(progress.started, Some(5));
        let indices: Vec<usize> = progress.items.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(progress.finished, Some(outcome));
    }

    #[test]
    fn test_force_skips_nothing() {
        let (provider, rasters, vectors) = (
            FakeProvider::default(),
            MemoryRasters::default(),
            MemoryVectors::default(),
        );
        let runner = runner(options().with_force(true), &provider, &rasters, &vectors);
        let coords = coordinates(3);

        runner.run(&coords, &mut NoProgress).unwrap();
        let again = runner.run(&coords, &mut NoProgress).unwrap();
        assert_eq!(again.skipped_count, 0);
        assert_eq!(provider.fetches.get(), 6);
    }

    #[test]
    fn test_failure_aborts_by_default() {
        let provider = FakeProvider {
            fail_at_latitude: Some(11.0),
            ..Default::default()
        };
        let (rasters, vectors) = (MemoryRasters::default(), MemoryVectors::default());
        let runner = runner(options(), &provider, &rasters, &vectors);

        let mut progress = Recorder::default();
        assert!(runner.run(&coordinates(4), &mut progress).is_err());
        assert_eq!(provider.fetches.get(), 2);
        assert_eq!(progress.items, vec![(0, true), (1, false)]);
        assert!(progress.finished.is_none());
        // The item before the failure keeps its artifacts.
        assert!(rasters.exists(&options().artifacts(&coordinates(1)[0]).image));
    }

    #[test]
    fn test_keep_going_counts_failures() {
        let provider = FakeProvider {
            fail_at_latitude: Some(11.0),
            ..Default::default()
        };
        let (rasters, vectors) = (MemoryRasters::default(), MemoryVectors::default());
        let runner = runner(options(), &provider, &rasters, &vectors).with_keep_going(true);

        let outcome = runner.run(&coordinates(4), &mut NoProgress).unwrap();
        assert_eq!(
            outcome,
            BatchOutcome {
                total: 4,
                skipped_count: 0,
                failed_count: 1
            }
        );
        assert_eq!(provider.fetches.get(), 4);
    }
}
