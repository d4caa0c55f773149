//! Raster reprojection.
//!
//! The output grid covers the bounding box of the source footprint in the
//! target system and keeps the source pixel dimensions. Each output pixel
//! center is transformed back into the source system and sampled with
//! nearest neighbour, which preserves crisp edges in imagery. Output pixels
//! that fall outside the source are zero (fully transparent when the raster
//! has an alpha band).

use crate::error::RasterError;
use crate::geometry::projection::CoordTransformer;
use crate::geometry::{GeoTransform, Srs};

use super::Raster;

/// Samples taken along each edge when projecting the source footprint.
const EDGE_SAMPLES: u32 = 20;

/// Bounding box in a coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BoundingBox {
    fn empty() -> Self {
        Self {
            minx: f64::INFINITY,
            miny: f64::INFINITY,
            maxx: f64::NEG_INFINITY,
            maxy: f64::NEG_INFINITY,
        }
    }

    fn extend(&mut self, x: f64, y: f64) {
        self.minx = self.minx.min(x);
        self.miny = self.miny.min(y);
        self.maxx = self.maxx.max(x);
        self.maxy = self.maxy.max(y);
    }

    fn is_valid(&self) -> bool {
        self.minx.is_finite()
            && self.maxx > self.minx
            && self.miny.is_finite()
            && self.maxy > self.miny
    }
}

/// Footprint of `raster` projected into `target`, densified along the edges
/// so curved edges are covered.
///
/// # Errors
/// Returns an error if the raster is not referenced or no edge point projects.
pub fn projected_bounds(raster: &Raster, target: Srs) -> Result<BoundingBox, RasterError> {
    let (Some(transform), Some(source)) = (raster.transform, raster.srs) else {
        return Err(RasterError::InvalidData("Raster has no georeference".to_string()));
    };
    let forward = CoordTransformer::between(source, target).map_err(RasterError::Projection)?;

    let (w, h) = (f64::from(raster.width), f64::from(raster.height));
    let mut bounds = BoundingBox::empty();
    for i in 0..=EDGE_SAMPLES {
        let t = f64::from(i) / f64::from(EDGE_SAMPLES);
        for (col, row) in [(t * w, 0.0), (t * w, h), (0.0, t * h), (w, t * h)] {
            let (x, y) = transform.pixel_to_world(col, row);
            if let Ok((tx, ty)) = forward.transform(x, y) {
                bounds.extend(tx, ty);
            }
        }
    }

    if !bounds.is_valid() {
        return Err(RasterError::Projection(format!(
            "footprint does not project from {source} to {target}"
        )));
    }
    Ok(bounds)
}

/// Reproject a referenced raster into `target`.
///
/// # Errors
/// Returns an error if the raster is not referenced or cannot be projected.
pub fn warp(raster: &Raster, target: Srs) -> Result<Raster, RasterError> {
    let (Some(src_transform), Some(source)) = (raster.transform, raster.srs) else {
        return Err(RasterError::InvalidData("Raster has no georeference".to_string()));
    };
    if source == target {
        return Ok(raster.clone());
    }

    let bounds = projected_bounds(raster, target)?;
    let (width, height) = (raster.width, raster.height);
    let out_transform = GeoTransform::north_up(
        bounds.minx,
        bounds.maxy,
        (bounds.maxx - bounds.minx) / f64::from(width),
        -(bounds.maxy - bounds.miny) / f64::from(height),
    );

    let inverse = CoordTransformer::between(target, source).map_err(RasterError::Projection)?;
    let bands = raster.bands;
    let src_width = raster.width as usize;
    let src_height = raster.height as usize;
    let mut pixels = vec![0_u8; width as usize * height as usize * bands];

    for out_y in 0..height as usize {
        for out_x in 0..width as usize {
            let (tx, ty) = out_transform.pixel_to_world(out_x as f64 + 0.5, out_y as f64 + 0.5);
            let Ok((sx, sy)) = inverse.transform(tx, ty) else {
                continue;
            };
            let Some((src_px, src_py)) = src_transform.world_to_pixel(sx, sy) else {
                continue;
            };
            let (Some(col), Some(row)) = (
                pixel_index(src_px, src_width),
                pixel_index(src_py, src_height),
            ) else {
                continue;
            };

            let src_idx = (row * src_width + col) * bands;
            let out_idx = (out_y * width as usize + out_x) * bands;
            pixels[out_idx..out_idx + bands]
                .copy_from_slice(&raster.pixels[src_idx..src_idx + bands]);
        }
    }

    Ok(Raster {
        pixels,
        bands,
        width,
        height,
        transform: Some(out_transform),
        srs: Some(target),
    })
}

/// Containing pixel of a fractional coordinate, `None` if outside `[0, max)`.
#[inline]
fn pixel_index(value: f64, max_value: usize) -> Option<usize> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = value.floor() as usize;
    (index < max_value).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::projection::georeference_transform;
    use crate::geometry::{Coordinate, ImageSize};

    fn mercator_raster(size: u32, bands: usize) -> Raster {
        let center = Coordinate::new(14.5, 121.0).unwrap();
        let gt = georeference_transform(&center, 16, ImageSize::new(size, size));
        let pixels: Vec<u8> = (0..size as usize * size as usize * bands)
            .map(|i| (i % 251) as u8 + 1)
            .collect();
        Raster::new(pixels, bands, size, size)
            .unwrap()
            .georeferenced(gt, Srs::WEB_MERCATOR)
    }

    #[test]
    fn test_pixel_index() {
        assert_eq!(pixel_index(0.0, 10), Some(0));
        assert_eq!(pixel_index(9.99, 10), Some(9));
        assert_eq!(pixel_index(10.0, 10), None);
        assert_eq!(pixel_index(-0.1, 10), None);
        assert_eq!(pixel_index(f64::NAN, 10), None);
    }

    #[test]
    fn test_same_srs_is_identity() {
        let raster = mercator_raster(8, 3);
        assert_eq!(warp(&raster, Srs::WEB_MERCATOR).unwrap(), raster);
    }

    #[test]
    fn test_unreferenced_raster_is_rejected() {
        let raster = Raster::new(vec![0; 3], 3, 1, 1).unwrap();
        assert!(warp(&raster, Srs::WGS84).is_err());
    }

    #[test]
    fn test_warp_to_wgs84_covers_the_center() {
        let raster = mercator_raster(64, 3);
        let warped = warp(&raster, Srs::WGS84).unwrap();

        assert_eq!(warped.srs, Some(Srs::WGS84));
        assert_eq!((warped.width, warped.height), (64, 64));
        let gt = warped.transform.unwrap();
        assert!(gt.pixel_height < 0.0);

        let (lon, lat) = gt.pixel_to_world(32.0, 32.0);
        assert!((lon - 121.0).abs() < 1e-4, "lon {lon}");
        assert!((lat - 14.5).abs() < 1e-4, "lat {lat}");

        // A small Mercator tile maps almost onto a rectangle: nearly every
        // output pixel is sampled from the source.
        let filled = warped.pixels.chunks_exact(3).filter(|p| p.iter().any(|&v| v != 0)).count();
        assert!(filled as f64 > 0.95 * 64.0 * 64.0, "filled {filled}");
    }

    #[test]
    fn test_projected_bounds_contains_corners() {
        let raster = mercator_raster(16, 4);
        let bounds = projected_bounds(&raster, Srs::WGS84).unwrap();
        assert!(bounds.minx < 121.0 && bounds.maxx > 121.0);
        assert!(bounds.miny < 14.5 && bounds.maxy > 14.5);
    }
}
