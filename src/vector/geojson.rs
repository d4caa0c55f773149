//! GeoJSON label store.
//!
//! Label sources may be a FeatureCollection, a single Feature or a bare
//! Geometry. RFC 7946 fixes coordinates to WGS 84; the pre-RFC `crs` member
//! is still honoured when present. Output is always a FeatureCollection named
//! `Labels`.

use std::fs;
use std::path::Path;

use ::geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::VectorError;
use crate::geometry::Srs;

use super::{LabelLayer, VectorStore};

/// Value of the `name` member on written collections.
pub const LAYER_NAME: &str = "Labels";

/// [`VectorStore`] reading and writing GeoJSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonVectorStore;

impl GeoJsonVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl VectorStore for GeoJsonVectorStore {
    fn open(&self, path: &Path) -> Result<LabelLayer, VectorError> {
        let source_error = |reason: String| VectorError::Source {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| source_error(e.to_string()))?;
        let geojson: GeoJson = text
            .parse()
            .map_err(|e: ::geojson::Error| source_error(e.to_string()))?;

        let (features, foreign) = match geojson {
            GeoJson::FeatureCollection(collection) => {
                (collection.features, collection.foreign_members)
            }
            GeoJson::Feature(feature) => {
                let foreign = feature.foreign_members.clone();
                (vec![feature], foreign)
            }
            GeoJson::Geometry(geometry) => (
                vec![Feature {
                    geometry: Some(geometry),
                    ..Default::default()
                }],
                None,
            ),
        };

        let srs = match foreign.as_ref().and_then(|members| members.get("crs")) {
            Some(crs) => srs_from_crs_member(crs).map_err(source_error)?,
            None => Srs::WGS84,
        };

        debug!(path = %path.display(), features = features.len(), %srs, "opened label source");
        Ok(LabelLayer::new(features, srs))
    }

    fn write(&self, layer: &LabelLayer, path: &Path) -> Result<(), VectorError> {
        let write_error = |reason: String| VectorError::Write {
            path: path.to_path_buf(),
            reason,
        };

        let mut members = JsonObject::new();
        members.insert("name".to_string(), Value::from(LAYER_NAME));
        if layer.srs() != Srs::WGS84 {
            members.insert("crs".to_string(), crs_member(layer.srs()));
        }
        let collection = FeatureCollection {
            bbox: None,
            features: layer.features().to_vec(),
            foreign_members: Some(members),
        };
        let text =
            serde_json::to_string_pretty(&collection).map_err(|e| write_error(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        fs::write(path, text).map_err(|e| write_error(e.to_string()))?;

        debug!(path = %path.display(), features = layer.len(), "wrote labels");
        Ok(())
    }
}

/// Legacy named `crs` member for a reference system.
fn crs_member(srs: Srs) -> Value {
    json!({
        "type": "name",
        "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", srs.epsg()) }
    })
}

/// Reference system named by a legacy `crs` member.
///
/// Accepts `urn:ogc:def:crs:EPSG::NNNN`, `EPSG:NNNN` and the `CRS84` URN.
fn srs_from_crs_member(crs: &Value) -> Result<Srs, String> {
    let name = crs
        .pointer("/properties/name")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("unsupported crs member {crs}"))?;

    if name.ends_with("CRS84") {
        return Ok(Srs::WGS84);
    }
    let code = name
        .rsplit(':')
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| format!("unsupported crs name {name:?}"))?;
    Srs::from_epsg(code).map_err(|e| e.to_string())
}
