//! Geometry primitives: coordinates, image sizes, affine geotransforms and
//! spatial reference identifiers.

pub mod extent;
pub mod projection;

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ParseError};

/// A WGS84 (EPSG:4326) point in degrees.
///
/// Construction validates the geographic range only. The Web Mercator
/// projector is undefined past [`projection::MAX_LATITUDE`], so polar
/// coordinates can be fetched but not georeferenced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// # Errors
    /// Returns an error if latitude is outside [-90, 90] or longitude outside
    /// [-180, 180] (NaN included).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ParseError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ParseError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ParseError::LongitudeOutOfRange(longitude));
        }
        Ok(Self { latitude, longitude })
    }

    /// Parse a latitude/longitude pair of text fields.
    ///
    /// # Errors
    /// Returns an error if either field is not a number or is out of range.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, ParseError> {
        let lat = parse_degrees("latitude", latitude)?;
        let lon = parse_degrees("longitude", longitude)?;
        Self::new(lat, lon)
    }

    #[inline]
    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

fn parse_degrees(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::NotANumber {
            field,
            value: value.to_string(),
        })
}

/// Requested image size in pixels: `length` rows by `width` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub length: u32,
    pub width: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(length: u32, width: u32) -> Self {
        Self { length, width }
    }

    /// True if both dimensions are non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.length > 0 && self.width > 0
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(400, 400)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.length, self.width)
    }
}

/// Parses `L,W` (the `--size` flag form).
impl FromStr for ImageSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [length, width] = parts.as_slice() else {
            return Err(ConfigError::InvalidSize(s.to_string()));
        };
        let length: u32 = length
            .parse()
            .map_err(|_| ConfigError::InvalidSize(s.to_string()))?;
        let width: u32 = width
            .parse()
            .map_err(|_| ConfigError::InvalidSize(s.to_string()))?;
        let size = Self::new(length, width);
        if !size.is_valid() {
            return Err(ConfigError::InvalidSize(s.to_string()));
        }
        Ok(size)
    }
}

/// Affine raster-to-world mapping, GDAL coefficient order:
/// `(origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height)`.
///
/// North-up rasters have zero rotations and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub column_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square-or-rectangular pixels.
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            column_rotation: 0.0,
            pixel_height,
        }
    }

    #[must_use]
    pub fn from_array(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            column_rotation: c[4],
            pixel_height: c[5],
        }
    }

    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.column_rotation,
            self.pixel_height,
        ]
    }

    /// True if both rotation terms are zero.
    #[must_use]
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.column_rotation == 0.0
    }

    /// Map a (fractional) pixel position to world coordinates.
    #[inline]
    #[must_use]
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.column_rotation + row * self.pixel_height,
        )
    }

    /// Inverse mapping, world to fractional pixel. `None` if the transform is
    /// degenerate.
    #[must_use]
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.column_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.row_rotation) / det;
        let row = (dy * self.pixel_width - dx * self.column_rotation) / det;
        Some((col, row))
    }
}

/// Spatial reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Srs(u16);

impl Srs {
    /// WGS84 geographic.
    pub const WGS84: Srs = Srs(4326);
    /// Web Mercator.
    pub const WEB_MERCATOR: Srs = Srs(3857);

    /// # Errors
    /// Returns an error if the code has no entry in the CRS database.
    pub fn from_epsg(code: u16) -> Result<Self, ConfigError> {
        if projection::get_proj_string(i32::from(code)).is_none() {
            return Err(ConfigError::UnsupportedSrs(format!("EPSG:{code}")));
        }
        Ok(Self(code))
    }

    #[inline]
    #[must_use]
    pub fn epsg(&self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_geographic(&self) -> bool {
        projection::is_geographic_crs(i32::from(self.0))
    }
}

impl Default for Srs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Srs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epsg:{}", self.0)
    }
}

/// Accepts `epsg:4326`, `EPSG:4326` or `4326`.
impl FromStr for Srs {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .map_or(trimmed, |_| &trimmed[5..]);
        let code: u16 = code
            .parse()
            .map_err(|_| ConfigError::UnsupportedSrs(s.to_string()))?;
        Self::from_epsg(code).map_err(|_| ConfigError::UnsupportedSrs(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_range_checks() {
        assert!(Coordinate::new(14.5, 121.0).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(ParseError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, 180.5),
            Err(ParseError::LongitudeOutOfRange(180.5))
        );
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinate_parse() {
        let c = Coordinate::parse(" 14.54694524", "121.0197543253 ").unwrap();
        assert_eq!(c.latitude(), 14.54694524);
        assert_eq!(c.longitude(), 121.0197543253);

        let err = Coordinate::parse("abc", "1").unwrap_err();
        assert!(matches!(err, ParseError::NotANumber { field: "latitude", .. }));
    }

    #[test]
    fn test_image_size_parse() {
        assert_eq!("400,400".parse::<ImageSize>(), Ok(ImageSize::new(400, 400)));
        assert_eq!("640, 320".parse::<ImageSize>(), Ok(ImageSize::new(640, 320)));
        assert!("400".parse::<ImageSize>().is_err());
        assert!("400,400,3".parse::<ImageSize>().is_err());
        assert!("0,400".parse::<ImageSize>().is_err());
        assert_eq!(ImageSize::default().to_string(), "400x400");
    }

    #[test]
    fn test_geotransform_roundtrip_pixel_world() {
        let gt = GeoTransform::from_array([100.0, 2.0, 0.5, 200.0, 0.25, -2.0]);
        let (x, y) = gt.pixel_to_world(10.0, 20.0);
        let (col, row) = gt.world_to_pixel(x, y).unwrap();
        assert!((col - 10.0).abs() < 1e-9);
        assert!((row - 20.0).abs() < 1e-9);
        assert_eq!(GeoTransform::from_array(gt.to_array()), gt);
    }

    #[test]
    fn test_degenerate_transform_has_no_inverse() {
        let gt = GeoTransform::north_up(0.0, 0.0, 0.0, -1.0);
        assert!(gt.world_to_pixel(1.0, 1.0).is_none());
    }

    #[test]
    fn test_srs_parse() {
        assert_eq!("epsg:4326".parse::<Srs>(), Ok(Srs::WGS84));
        assert_eq!("EPSG:3857".parse::<Srs>(), Ok(Srs::WEB_MERCATOR));
        assert_eq!("32633".parse::<Srs>().map(|s| s.epsg()), Ok(32633));
        assert!("epsg:abc".parse::<Srs>().is_err());
        assert!("epsg:1".parse::<Srs>().is_err());
        assert_eq!(Srs::WGS84.to_string(), "epsg:4326");
        assert!(Srs::WGS84.is_geographic());
        assert!(!Srs::WEB_MERCATOR.is_geographic());
    }
}
