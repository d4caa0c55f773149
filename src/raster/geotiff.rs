//! GeoTIFF encoding and decoding for 8-bit rasters.
//!
//! Pure Rust (the `tiff` crate, no GDAL). The writer stores the georeference
//! as ModelPixelScale + ModelTiepoint for north-up rasters, or as a
//! ModelTransformation matrix when the transform is rotated, together with a
//! GeoKeyDirectory naming the EPSG code. The reader recovers the same
//! [`GeoTransform`] and [`Srs`] from those tags.

use std::io::{Read, Seek, Write};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray8, RGB8, RGBA8};
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::geometry::projection::get_proj_string;
use crate::geometry::{GeoTransform, Srs};

use super::Raster;

// GeoTIFF Tag IDs (not in standard tiff crate)
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Compression method for GeoTIFF output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeoTiffCompression {
    /// No compression - fastest but largest files
    #[default]
    None,
    /// LZW compression - good balance of speed and size
    Lzw,
    /// Deflate (zlib) compression - better compression, slower
    Deflate,
}

/// Error type for GeoTIFF encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum GeoTiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Builder for configuring GeoTIFF output
pub struct GeoTiffWriter<'a> {
    raster: &'a Raster,
    transform: GeoTransform,
    srs: Srs,
    compression: GeoTiffCompression,
}

impl<'a> GeoTiffWriter<'a> {
    /// Writer for a georeferenced raster.
    ///
    /// # Errors
    /// Returns an error if the raster carries no transform or reference.
    pub fn new(raster: &'a Raster) -> Result<Self, GeoTiffError> {
        let (Some(transform), Some(srs)) = (raster.transform, raster.srs) else {
            return Err(GeoTiffError::InvalidData(
                "Raster has no georeference".to_string(),
            ));
        };
        Ok(Self {
            raster,
            transform,
            srs,
            compression: GeoTiffCompression::default(),
        })
    }

    /// Set the compression method
    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Encode into an in-memory buffer.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write_to`].
    pub fn to_bytes(self) -> Result<Vec<u8>, GeoTiffError> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Write to any writer that implements Write + Seek
    ///
    /// # Errors
    /// Returns an error on empty rasters or encoder failures.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<(), GeoTiffError> {
        let raster = self.raster;

        if raster.width == 0 || raster.height == 0 || raster.pixels.is_empty() {
            return Err(GeoTiffError::InvalidData(
                "Raster has zero dimensions".to_string(),
            ));
        }

        let compression = match self.compression {
            GeoTiffCompression::None => Compression::Uncompressed,
            GeoTiffCompression::Lzw => Compression::Lzw,
            GeoTiffCompression::Deflate => Compression::Deflate(tiff::encoder::DeflateLevel::Fast),
        };

        let mut encoder = TiffEncoder::new(writer)?.with_compression(compression);
        let (width, height) = (raster.width, raster.height);

        match raster.bands {
            1 => {
                let mut image = encoder.new_image::<Gray8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&raster.pixels)?;
            }
            3 => {
                let mut image = encoder.new_image::<RGB8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&raster.pixels)?;
            }
            4 => {
                let mut image = encoder.new_image::<RGBA8>(width, height)?;
                self.write_geotiff_tags(image.encoder())?;
                image.write_data(&raster.pixels)?;
            }
            bands => {
                return Err(GeoTiffError::InvalidData(format!(
                    "Unsupported band count {bands}"
                )));
            }
        }
        Ok(())
    }

    fn write_geotiff_tags<W: Write + Seek, K: tiff::encoder::TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> Result<(), GeoTiffError> {
        let gt = &self.transform;

        if gt.is_north_up() {
            // ModelPixelScale: [ScaleX, ScaleY, ScaleZ], Y scale positive for north-up
            let pixel_scale = [gt.pixel_width, -gt.pixel_height, 0.0];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

            // ModelTiepoint: [I, J, K, X, Y, Z], pixel (0, 0) to the origin
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;
        } else {
            // Row-major 4x4 matrix
            let matrix = [
                gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
                gt.column_rotation, gt.pixel_height, 0.0, gt.origin_y,
                0.0, 0.0, 0.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ];
            dir.write_tag(Tag::Unknown(GEOTIFF_MODELTRANSFORMATION), matrix.as_slice())?;
        }

        let geokeys = build_geokey_directory(self.srs);
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

        if let Some(proj_string) = get_proj_string(i32::from(self.srs.epsg())) {
            // GeoAsciiParams needs to be null-terminated with pipe delimiters
            let ascii_params = format!("{proj_string}|");
            dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii_params.as_bytes())?;
        }

        Ok(())
    }
}

fn build_geokey_directory(srs: Srs) -> Vec<u16> {
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]
    let is_geographic = srs.is_geographic();

    let mut keys = vec![1, 1, 0, 3];

    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0, // TIFFTagLocation = 0 means value is in Value_Offset
        1,
        if is_geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);

    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);

    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, srs.epsg()]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, srs.epsg()]);
    }

    keys
}

/// EPSG code named by a GeoKeyDirectory, if any.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let count = usize::from(*keys.get(3)?);
    keys.get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|key| {
            matches!(key[0], PROJECTED_CS_TYPE_GEO_KEY | GEOGRAPHIC_TYPE_GEO_KEY) && key[1] == 0
        })
        .map(|key| key[3])
}

/// Decode a GeoTIFF (or plain TIFF) into a [`Raster`].
///
/// Georeference tags are optional; a TIFF without them decodes with
/// `transform` and `srs` set to `None`.
///
/// # Errors
/// Returns an error on decoder failures or non-8-bit sample layouts.
pub fn decode<R: Read + Seek>(reader: R) -> Result<Raster, GeoTiffError> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    let bands = match decoder.colortype()? {
        ColorType::Gray(8) => 1,
        ColorType::RGB(8) => 3,
        ColorType::RGBA(8) => 4,
        other => {
            return Err(GeoTiffError::InvalidData(format!(
                "Unsupported color type {other:?}"
            )));
        }
    };

    let transform = read_transform(&mut decoder)?;
    let srs = decoder
        .find_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY))?
        .map(|value| value.into_u16_vec())
        .transpose()?
        .and_then(|keys| epsg_from_geokeys(&keys))
        .and_then(|code| Srs::from_epsg(code).ok());

    let DecodingResult::U8(pixels) = decoder.read_image()? else {
        return Err(GeoTiffError::InvalidData(
            "Expected 8-bit samples".to_string(),
        ));
    };

    let mut raster = Raster::new(pixels, bands, width, height)
        .map_err(|e| GeoTiffError::InvalidData(e.to_string()))?;
    raster.transform = transform;
    raster.srs = srs;
    Ok(raster)
}

fn read_transform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
) -> Result<Option<GeoTransform>, GeoTiffError> {
    if let Some(value) = decoder.find_tag(Tag::Unknown(GEOTIFF_MODELTRANSFORMATION))? {
        let m = value.into_f64_vec()?;
        if m.len() < 8 {
            return Err(GeoTiffError::InvalidData(
                "ModelTransformation needs 16 values".to_string(),
            ));
        }
        return Ok(Some(GeoTransform::from_array([m[3], m[0], m[1], m[7], m[4], m[5]])));
    }

    let scale = decoder
        .find_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE))?
        .map(|value| value.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT))?
        .map(|value| value.into_f64_vec())
        .transpose()?;

    match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            // Tiepoint (i, j, k, x, y, z) maps pixel (i, j) to world (x, y)
            let origin_x = tie[3] - tie[0] * scale[0];
            let origin_y = tie[4] + tie[1] * scale[1];
            Ok(Some(GeoTransform::north_up(origin_x, origin_y, scale[0], -scale[1])))
        }
        _ => Ok(None),
    }
}
