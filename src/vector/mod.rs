//! Vector label abstraction.
//!
//! A [`LabelLayer`] is an in-memory feature set tagged with its reference
//! system. Clipping is a spatial filter on the layer; reading and writing go
//! through a [`VectorStore`]. Sources may be ESRI Shapefiles or GeoJSON.

pub mod geojson;
pub mod local;
pub mod shapefile;

pub use self::geojson::GeoJsonVectorStore;
pub use self::local::LocalVectorStore;

use std::path::Path;

use geo::Intersects;
use tracing::trace;

use crate::error::VectorError;
use crate::geometry::extent::Extent;
use crate::geometry::Srs;

/// Features read from a label source.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayer {
    features: Vec<::geojson::Feature>,
    srs: Srs,
}

impl LabelLayer {
    #[must_use]
    pub fn new(features: Vec<::geojson::Feature>, srs: Srs) -> Self {
        Self { features, srs }
    }

    #[must_use]
    pub fn features(&self) -> &[::geojson::Feature] {
        &self.features
    }

    #[must_use]
    pub fn srs(&self) -> Srs {
        self.srs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features whose geometry intersects `extent`.
    ///
    /// The extent is brought into the layer's reference system first.
    /// Features without a geometry, or with one that has no planar
    /// equivalent, never match.
    ///
    /// # Errors
    /// [`VectorError::Projection`] if the extent cannot be reprojected.
    pub fn filter_by_extent(&self, extent: &Extent) -> Result<LabelLayer, VectorError> {
        let footprint = extent
            .reproject(self.srs)
            .map_err(VectorError::Projection)?
            .to_polygon();

        let features = self
            .features
            .iter()
            .filter(|feature| {
                let Some(geometry) = feature.geometry.clone() else {
                    return false;
                };
                match geo::Geometry::<f64>::try_from(geometry) {
                    Ok(geometry) => footprint.intersects(&geometry),
                    Err(err) => {
                        trace!(error = %err, "skipping feature without planar geometry");
                        false
                    }
                }
            })
            .cloned()
            .collect();

        Ok(LabelLayer {
            features,
            srs: self.srs,
        })
    }
}

/// Vector capability used by the pipeline.
pub trait VectorStore {
    /// Read every feature of the label source at `path`.
    ///
    /// # Errors
    /// [`VectorError::Source`] if the source cannot be opened or parsed.
    fn open(&self, path: &Path) -> Result<LabelLayer, VectorError>;

    /// Write `layer` to `path`, creating parent directories.
    ///
    /// # Errors
    /// [`VectorError::Write`] if the artifact cannot be created.
    fn write(&self, layer: &LabelLayer, path: &Path) -> Result<(), VectorError>;
}

impl<T: VectorStore + ?Sized> VectorStore for &T {
    fn open(&self, path: &Path) -> Result<LabelLayer, VectorError> {
        (**self).open(path)
    }

    fn write(&self, layer: &LabelLayer, path: &Path) -> Result<(), VectorError> {
        (**self).write(layer, path)
    }
}
