//! Projection math.
//!
//! Two concerns live here:
//!
//! - The Web Mercator georeferencing of a Static Maps image: given the center
//!   coordinate, zoom and pixel size the image was requested with, compute the
//!   affine transform of the image in EPSG:3857. This uses the fixed constants
//!   of the tile pyramid, not a general-purpose projection library, so the
//!   result lines up with the pixels the provider rendered.
//! - General point reprojection between EPSG codes using pure Rust
//!   (proj4rs + crs-definitions), used by the warp engine and the label clipper.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::{Coordinate, GeoTransform, ImageSize, Srs};

/// Ground resolution of a zoom-0 Web Mercator pixel at the equator, in meters.
pub const EQUATOR_RESOLUTION: f64 = 156_543.033_92;

/// Half the Web Mercator world width, in meters.
pub const MAX_EXTENT: f64 = 20_037_508.34;

/// Latitude at which the Web Mercator world becomes square, in degrees.
/// The forward projection diverges beyond it.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Ground sample distance of one pixel at `latitude` and `zoom`.
#[inline]
#[must_use]
pub fn ground_sample_distance(latitude: f64, zoom: u8) -> f64 {
    EQUATOR_RESOLUTION * (latitude * std::f64::consts::PI / 180.0).cos()
        / 2_f64.powi(i32::from(zoom))
}

/// Convert a WGS84 coordinate to Web Mercator `(x, y)` meters.
#[inline]
#[must_use]
pub fn coordinate_to_web_mercator(coordinate: &Coordinate) -> (f64, f64) {
    use std::f64::consts::PI;

    let lat = coordinate.latitude();
    let y = MAX_EXTENT / 180.0 * (((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0));
    let x = coordinate.longitude() * MAX_EXTENT / 180.0;
    (x, y)
}

/// Affine transform (EPSG:3857) of an image rendered around `center`.
///
/// The center coordinate is treated as the pixel at (`width / 2`, `length / 2`),
/// using integer halves the same way the tile request is centered.
#[must_use]
pub fn georeference_transform(center: &Coordinate, zoom: u8, size: ImageSize) -> GeoTransform {
    let gsd = ground_sample_distance(center.latitude(), zoom);
    let (x3857, y3857) = coordinate_to_web_mercator(center);

    let upper_left_y = y3857 + gsd * f64::from(size.length / 2);
    let upper_left_x = x3857 - gsd * f64::from(size.width / 2);

    GeoTransform::north_up(upper_left_x, upper_left_y, gsd, -gsd)
}

/// Project a point from one CRS to another.
///
/// # Errors
/// Returns an error if the EPSG code is not supported or the projection
/// transformation fails.
#[inline]
pub fn project_point(
    source_epsg: i32,
    target_epsg: i32,
    x: f64,
    y: f64,
) -> Result<(f64, f64), String> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }
    CoordTransformer::new(source_epsg, target_epsg)?.transform(x, y)
}

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: i32) -> bool {
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        epsg == 4326 || (4000..5000).contains(&epsg)
    }
}

/// Reusable transformer between two EPSG codes.
///
/// Building the `Proj` pair is the expensive part; warping a raster transforms
/// every output pixel through one instance.
pub struct CoordTransformer {
    source_proj: Proj,
    target_proj: Proj,
    source_epsg: i32,
    target_epsg: i32,
    source_is_geographic: bool,
    target_is_geographic: bool,
}

impl CoordTransformer {
    /// # Errors
    /// Returns an error if either code is missing from the database or its
    /// definition cannot be parsed.
    pub fn new(source_epsg: i32, target_epsg: i32) -> Result<Self, String> {
        let source_str = get_proj_string(source_epsg)
            .ok_or_else(|| format!("EPSG:{source_epsg} is not in the crs-definitions database"))?;
        let target_str = get_proj_string(target_epsg)
            .ok_or_else(|| format!("EPSG:{target_epsg} is not in the crs-definitions database"))?;

        let source_proj = Proj::from_proj_string(source_str)
            .map_err(|e| format!("Invalid source projection EPSG:{source_epsg}: {e:?}"))?;
        let target_proj = Proj::from_proj_string(target_str)
            .map_err(|e| format!("Invalid target projection EPSG:{target_epsg}: {e:?}"))?;

        Ok(Self {
            source_proj,
            target_proj,
            source_epsg,
            target_epsg,
            source_is_geographic: is_geographic_crs(source_epsg),
            target_is_geographic: is_geographic_crs(target_epsg),
        })
    }

    /// Transformer between two [`Srs`] values.
    ///
    /// # Errors
    /// See [`CoordTransformer::new`].
    pub fn between(source: Srs, target: Srs) -> Result<Self, String> {
        Self::new(i32::from(source.epsg()), i32::from(target.epsg()))
    }

    /// Transform one point. Geographic coordinates are in degrees on both sides.
    ///
    /// # Errors
    /// Returns an error if proj4rs rejects the point (e.g. outside the projection domain).
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), String> {
        if self.source_epsg == self.target_epsg {
            return Ok((x, y));
        }

        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source_is_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(&self.source_proj, &self.target_proj, &mut point).map_err(|e| {
            format!(
                "Transform from EPSG:{} to EPSG:{} failed: {e:?}",
                self.source_epsg, self.target_epsg
            )
        })?;

        let (out_x, out_y) = if self.target_is_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(format!(
                "Transform from EPSG:{} to EPSG:{} produced a non-finite point for ({x}, {y})",
                self.source_epsg, self.target_epsg
            ));
        }

        Ok((out_x, out_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_max_latitude_closes_the_square() {
        let (x, y) = coordinate_to_web_mercator(&coord(MAX_LATITUDE, 180.0));
        assert!((x - MAX_EXTENT).abs() < 1e-6);
        assert!((y - MAX_EXTENT).abs() < 1e-3, "y {y}");
        let (_, pole) = coordinate_to_web_mercator(&coord(-90.0, 0.0));
        assert!(!pole.is_finite());
    }

    #[test]
    fn test_gsd_at_origin_zoom_zero() {
        assert_eq!(ground_sample_distance(0.0, 0), 156_543.033_92);
    }

    #[test]
    fn test_gsd_halves_per_zoom_level() {
        let base = ground_sample_distance(14.5, 0);
        for zoom in 1..=20u8 {
            let expected = base / 2_f64.powi(i32::from(zoom));
            assert!((ground_sample_distance(14.5, zoom) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transform_at_origin_single_pixel() {
        let gt = georeference_transform(&coord(0.0, 0.0), 0, ImageSize::new(1, 1));
        // 1 / 2 == 0: the single pixel's corner sits on the center coordinate
        assert!(approx_eq(gt.origin_x, 0.0));
        assert!(approx_eq(gt.origin_y, 0.0));
        assert_eq!(gt.pixel_width, EQUATOR_RESOLUTION);
        assert_eq!(gt.pixel_height, -EQUATOR_RESOLUTION);
        assert_eq!(gt.row_rotation, 0.0);
        assert_eq!(gt.column_rotation, 0.0);
    }

    #[test]
    fn test_transform_centers_the_image() {
        let center = coord(14.5, 121.0);
        let size = ImageSize::new(400, 400);
        let gt = georeference_transform(&center, 16, size);
        let (cx, cy) = coordinate_to_web_mercator(&center);

        let (px, py) = gt.pixel_to_world(200.0, 200.0);
        assert!((px - cx).abs() < 1e-6, "x {px} != {cx}");
        assert!((py - cy).abs() < 1e-6, "y {py} != {cy}");
        assert!(gt.pixel_height < 0.0);
    }

    #[test]
    fn test_rectangular_image_uses_length_for_rows() {
        let center = coord(0.0, 0.0);
        let gt = georeference_transform(&center, 0, ImageSize::new(100, 300));
        assert!(approx_eq(gt.origin_y, 50.0 * EQUATOR_RESOLUTION));
        assert!(approx_eq(gt.origin_x, -150.0 * EQUATOR_RESOLUTION));
    }

    #[test]
    fn test_web_mercator_matches_proj4rs() {
        for (lat, lon) in [(0.0, 0.0), (37.8, -122.4), (35.7, 139.7), (14.5, 121.0)] {
            let (x, y) = coordinate_to_web_mercator(&coord(lat, lon));
            let (px, py) = project_point(4326, 3857, lon, lat).unwrap();
            // The truncated MAX_EXTENT constant differs from proj by a few mm
            assert!((x - px).abs() < 0.05, "x at ({lat}, {lon}): {x} vs {px}");
            assert!((y - py).abs() < 0.05, "y at ({lat}, {lon}): {y} vs {py}");
        }
    }

    #[test]
    fn test_project_point_same_crs() {
        let (x, y) = project_point(4326, 4326, 10.0, 51.5).unwrap();
        assert!(approx_eq(x, 10.0));
        assert!(approx_eq(y, 51.5));
    }

    #[test]
    fn test_roundtrip_4326_3857() {
        let transformer = CoordTransformer::between(Srs::WGS84, Srs::WEB_MERCATOR).unwrap();
        let inverse = CoordTransformer::between(Srs::WEB_MERCATOR, Srs::WGS84).unwrap();
        for (lon, lat) in [(0.0, 0.0), (10.0, 51.5), (-122.4, 37.8), (139.7, 35.7)] {
            let (x, y) = transformer.transform(lon, lat).unwrap();
            let (lon2, lat2) = inverse.transform(x, y).unwrap();
            assert!(approx_eq(lon, lon2), "lon: {} != {}", lon, lon2);
            assert!(approx_eq(lat, lat2), "lat: {} != {}", lat, lat2);
        }
    }

    #[test]
    fn test_project_point_via_utm() {
        let (x, y) = project_point(4326, 32633, 15.0, 52.0).unwrap();
        assert!(x > 400000.0 && x < 600000.0, "UTM easting: {}", x);
        assert!(y > 5000000.0 && y < 6000000.0, "UTM northing: {}", y);
    }

    #[test]
    fn test_unsupported_epsg_code() {
        let result = project_point(4326, 999999, 0.0, 0.0);
        assert!(result.unwrap_err().contains("not in the crs-definitions database"));
    }

    #[test]
    fn test_is_geographic_crs() {
        assert!(is_geographic_crs(4326), "4326 is geographic");
        assert!(!is_geographic_crs(3857), "3857 is projected");
        assert!(!is_geographic_crs(32633), "UTM is projected");
    }
}
