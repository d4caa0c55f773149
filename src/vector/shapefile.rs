//! ESRI Shapefile label sources.
//!
//! Geometries come from the `.shp`, attributes from the `.dbf` next to it.
//! The reference system is read from the `.prj` sidecar when there is one;
//! without it the layer is assumed to be WGS 84.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ::geojson::{Feature, JsonObject};
use ::shapefile::dbase::{FieldValue, Record};
use ::shapefile::Shape;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::VectorError;
use crate::geometry::Srs;

use super::LabelLayer;

/// Read every shape and record of the Shapefile at `path`.
///
/// # Errors
/// [`VectorError::Source`] if the `.shp`/`.dbf` pair cannot be read or the
/// `.prj` names a reference system that cannot be resolved.
pub fn read_layer(path: &Path) -> Result<LabelLayer, VectorError> {
    let source_error = |reason: String| VectorError::Source {
        path: path.to_path_buf(),
        reason,
    };

    let srs = read_prj(path).map_err(source_error)?;
    let mut reader =
        ::shapefile::Reader::from_path(path).map_err(|e| source_error(e.to_string()))?;

    let mut features = Vec::new();
    for entry in reader.iter_shapes_and_records() {
        let (shape, record) = entry.map_err(|e| source_error(e.to_string()))?;
        features.push(Feature {
            geometry: shape_geometry(shape),
            properties: Some(record_properties(record)),
            ..Default::default()
        });
    }

    debug!(path = %path.display(), features = features.len(), %srs, "opened shapefile");
    Ok(LabelLayer::new(features, srs))
}

fn shape_geometry(shape: Shape) -> Option<::geojson::Geometry> {
    if matches!(shape, Shape::NullShape) {
        return None;
    }
    match geo::Geometry::<f64>::try_from(shape) {
        Ok(geometry) => Some(::geojson::Geometry::new(::geojson::Value::from(&geometry))),
        Err(err) => {
            trace!(error = %err, "shape has no planar geometry");
            None
        }
    }
}

fn record_properties(record: Record) -> JsonObject {
    HashMap::<String, FieldValue>::from(record)
        .into_iter()
        .map(|(name, value)| (name, field_json(value)))
        .collect()
}

fn field_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => Value::String(text),
        FieldValue::Numeric(Some(number)) => Value::from(number),
        FieldValue::Float(Some(number)) => Value::from(f64::from(number)),
        FieldValue::Double(number) | FieldValue::Currency(number) => Value::from(number),
        FieldValue::Integer(number) => Value::from(number),
        FieldValue::Logical(Some(flag)) => Value::Bool(flag),
        FieldValue::Date(Some(date)) => Value::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => Value::Null,
        other => Value::String(format!("{other:?}")),
    }
}

/// Reference system of the `.prj` next to `path`, WGS 84 if there is none.
fn read_prj(path: &Path) -> Result<Srs, String> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        debug!(path = %path.display(), "no .prj, assuming EPSG:4326");
        return Ok(Srs::WGS84);
    }
    let wkt = fs::read_to_string(&prj).map_err(|e| format!("{}: {e}", prj.display()))?;
    srs_from_wkt(&wkt)
}

/// Reference system named by a WKT definition.
///
/// The outermost `AUTHORITY["EPSG", ...]` (WKT1) or `ID["EPSG", ...]` (WKT2)
/// wins. ESRI-flavoured WKT carries no authority, so the WGS 84 geographic
/// and Web Mercator definitions are recognised by name.
fn srs_from_wkt(wkt: &str) -> Result<Srs, String> {
    let wkt = wkt.trim();
    if let Some(code) = last_epsg_authority(wkt) {
        return Srs::from_epsg(code).map_err(|e| e.to_string());
    }

    let upper = wkt.to_ascii_uppercase();
    if upper.starts_with("PROJCS[")
        && ["WEB_MERCATOR", "PSEUDO_MERCATOR", "PSEUDO-MERCATOR"]
            .iter()
            .any(|name| upper.contains(name))
    {
        return Ok(Srs::WEB_MERCATOR);
    }
    if upper.starts_with("GEOGCS[") && (upper.contains("WGS_1984") || upper.contains("WGS 84")) {
        return Ok(Srs::WGS84);
    }
    Err(format!("unsupported .prj definition {wkt:?}"))
}

fn last_epsg_authority(wkt: &str) -> Option<u16> {
    let start = wkt.rfind("\"EPSG\"")? + "\"EPSG\"".len();
    let rest = wkt[start..]
        .trim_start_matches(|c: char| c == ',' || c == '"' || c.is_whitespace());
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::extent::Extent;
    use crate::geometry::GeoTransform;

    use ::shapefile::dbase::{FieldName, TableWriterBuilder};
    use ::shapefile::{Point, Writer};

    const WGS84_ESRI: &str = concat!(
        r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984","#,
        r#"SPHEROID["WGS_1984",6378137.0,298.257223563]],"#,
        r#"PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
    );

    fn write_points(path: &Path, points: &[(f64, f64, &str)]) {
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("class").unwrap(), 16);
        let mut writer = Writer::from_path(path, table).unwrap();
        for &(x, y, class) in points {
            let mut record = Record::default();
            record.insert(
                "class".to_string(),
                FieldValue::Character(Some(class.to_string())),
            );
            writer
                .write_shape_and_record(&Point::new(x, y), &record)
                .unwrap();
        }
    }

    #[test]
    fn test_wkt_authority() {
        let wkt = concat!(
            r#"PROJCS["WGS 84 / Pseudo-Mercator","#,
            r#"GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","3857"]]"#,
        );
        assert_eq!(srs_from_wkt(wkt), Ok(Srs::WEB_MERCATOR));

        let wkt2 = r#"GEOGCRS["WGS 84",DATUM["World Geodetic System 1984"],ID["EPSG",4326]]"#;
        assert_eq!(srs_from_wkt(wkt2), Ok(Srs::WGS84));
    }

    #[test]
    fn test_esri_wkt_by_name() {
        assert_eq!(srs_from_wkt(WGS84_ESRI), Ok(Srs::WGS84));

        let mercator = concat!(
            r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"],"#,
            r#"PROJECTION["Mercator_Auxiliary_Sphere"]]"#,
        );
        assert_eq!(srs_from_wkt(mercator), Ok(Srs::WEB_MERCATOR));

        assert!(srs_from_wkt(r#"PROJCS["Luzon_1911_Philippines_Zone_III"]"#).is_err());
    }

    #[test]
    fn test_read_points_with_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.shp");
        write_points(&path, &[(121.0, 14.5, "building"), (10.0, 10.0, "far")]);

        let layer = read_layer(&path).unwrap();
        assert_eq!(layer.srs(), Srs::WGS84);
        assert_eq!(layer.len(), 2);

        let first = &layer.features()[0];
        assert_eq!(
            first.geometry.as_ref().map(|g| &g.value),
            Some(&::geojson::Value::Point(vec![121.0, 14.5]))
        );
        assert_eq!(first.property("class"), Some(&Value::from("building")));
    }

    #[test]
    fn test_prj_sets_layer_srs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.shp");
        write_points(&path, &[(13_469_658.0, 1_632_599.0, "building")]);
        fs::write(
            dir.path().join("labels.prj"),
            r#"PROJCS["WGS 84 / Pseudo-Mercator",AUTHORITY["EPSG","3857"]]"#,
        )
        .unwrap();

        assert_eq!(read_layer(&path).unwrap().srs(), Srs::WEB_MERCATOR);
    }

    #[test]
    fn test_clip_shapefile_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.shp");
        write_points(&path, &[(0.5, 0.5, "inside"), (5.0, 5.0, "outside")]);
        fs::write(dir.path().join("labels.prj"), WGS84_ESRI).unwrap();

        let extent = Extent::from_transform(
            &GeoTransform::north_up(0.0, 1.0, 0.1, -0.1),
            10,
            10,
            Srs::WGS84,
        );
        let clipped = read_layer(&path).unwrap().filter_by_extent(&extent).unwrap();
        assert_eq!(clipped.len(), 1);
        assert_eq!(
            clipped.features()[0].property("class"),
            Some(&Value::from("inside"))
        );
    }

    #[test]
    fn test_missing_shapefile() {
        let err = read_layer(Path::new("/nonexistent/labels.shp")).unwrap_err();
        assert!(matches!(err, VectorError::Source { .. }));
    }
}
