//! Deterministic artifact names for one coordinate.
//!
//! The stem `{lat}_{lon}_{zoom}_{L}x{W}` is a pure function of the request, so
//! a re-run resolves the same paths and can skip work already on disk.

use std::path::{Path, PathBuf};

use crate::geometry::{Coordinate, ImageSize};

pub const IMAGE_SUBDIR: &str = "png";
pub const GEOREFERENCED_SUBDIR: &str = "tif";
pub const LABEL_SUBDIR: &str = "json";

/// Paths of every artifact produced for one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub stem: String,
    pub image: PathBuf,
    pub georeferenced: PathBuf,
    pub labels: PathBuf,
}

impl ArtifactSet {
    #[must_use]
    pub fn new(root: &Path, coordinate: &Coordinate, zoom: u8, size: ImageSize) -> Self {
        let stem = file_stem(coordinate, zoom, size);
        Self {
            image: root.join(IMAGE_SUBDIR).join(format!("{stem}.png")),
            georeferenced: root.join(GEOREFERENCED_SUBDIR).join(format!("{stem}.tiff")),
            labels: root.join(LABEL_SUBDIR).join(format!("{stem}.geojson")),
            stem,
        }
    }
}

/// Canonical filename stem.
///
/// Degrees use `f64`'s shortest round-trip form with a forced decimal point
/// (`121.0`, not `121`), so integral inputs and their `.0` spelling share a stem.
#[must_use]
pub fn file_stem(coordinate: &Coordinate, zoom: u8, size: ImageSize) -> String {
    format!(
        "{:?}_{:?}_{}_{}",
        coordinate.latitude(),
        coordinate.longitude(),
        zoom,
        size
    )
}
