//! Ground footprint of a referenced raster.

use super::projection::CoordTransformer;
use super::{GeoTransform, Srs};

/// Closed 5-point ring: top-left, top-right, bottom-right, bottom-left, top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    ring: [(f64, f64); 5],
    srs: Srs,
}

impl Extent {
    /// Footprint of a `width` x `height` raster under `transform`.
    ///
    /// Corners are derived from the origin and the pixel sizes only; rotation
    /// terms do not enter the footprint.
    #[must_use]
    pub fn from_transform(transform: &GeoTransform, width: u32, height: u32, srs: Srs) -> Self {
        let ulx = transform.origin_x;
        let uly = transform.origin_y;
        let lrx = ulx + f64::from(width) * transform.pixel_width;
        let lry = uly + f64::from(height) * transform.pixel_height;

        Self {
            ring: [(ulx, uly), (lrx, uly), (lrx, lry), (ulx, lry), (ulx, uly)],
            srs,
        }
    }

    #[must_use]
    pub fn ring(&self) -> &[(f64, f64); 5] {
        &self.ring
    }

    #[must_use]
    pub fn srs(&self) -> Srs {
        self.srs
    }

    /// Reproject every vertex into `target`. The ring stays closed because the
    /// first and last vertices go through the same transform.
    ///
    /// # Errors
    /// Returns an error if a vertex cannot be projected.
    pub fn reproject(&self, target: Srs) -> Result<Self, String> {
        if target == self.srs {
            return Ok(self.clone());
        }
        let transformer = CoordTransformer::between(self.srs, target)?;
        let mut ring = self.ring;
        for vertex in &mut ring {
            *vertex = transformer.transform(vertex.0, vertex.1)?;
        }
        Ok(Self { ring, srs: target })
    }

    /// The ring as a `geo` polygon, for intersection tests.
    #[must_use]
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        let exterior: Vec<geo::Coord<f64>> = self
            .ring
            .iter()
            .map(|&(x, y)| geo::Coord { x, y })
            .collect();
        geo::Polygon::new(geo::LineString::new(exterior), Vec::new())
    }
}
