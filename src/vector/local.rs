//! Filesystem label store.

use std::path::Path;

use crate::error::VectorError;

use super::{GeoJsonVectorStore, LabelLayer, VectorStore};

/// [`VectorStore`] over local files.
///
/// Sources ending in `.shp` are read as ESRI Shapefiles, anything else as
/// GeoJSON. Clipped layers are always written as GeoJSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVectorStore {
    geojson: GeoJsonVectorStore,
}

impl LocalVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_shapefile(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
}

impl VectorStore for LocalVectorStore {
    fn open(&self, path: &Path) -> Result<LabelLayer, VectorError> {
        if is_shapefile(path) {
            super::shapefile::read_layer(path)
        } else {
            self.geojson.open(path)
        }
    }

    fn write(&self, layer: &LabelLayer, path: &Path) -> Result<(), VectorError> {
        self.geojson.write(layer, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Srs;

    use ::shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
    use ::shapefile::{Point, Writer};
    use std::fs;

    #[test]
    fn test_dispatch_on_extension() {
        assert!(is_shapefile(Path::new("parcels.shp")));
        assert!(is_shapefile(Path::new("data/PARCELS.SHP")));
        assert!(!is_shapefile(Path::new("parcels.geojson")));
        assert!(!is_shapefile(Path::new("parcels")));
    }

    #[test]
    fn test_shapefile_in_geojson_out() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("parcels.shp");
        {
            let table = TableWriterBuilder::new()
                .add_character_field(FieldName::try_from("class").unwrap(), 16);
            let mut writer = Writer::from_path(&source, table).unwrap();
            let mut record = Record::default();
            record.insert(
                "class".to_string(),
                FieldValue::Character(Some("roof".to_string())),
            );
            writer
                .write_shape_and_record(&Point::new(121.0, 14.5), &record)
                .unwrap();
        }

        let store = LocalVectorStore::new();
        let layer = store.open(&source).unwrap();
        assert_eq!(layer.len(), 1);

        let out = dir.path().join("json/parcels.geojson");
        store.write(&layer, &out).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
        assert_eq!(written["features"][0]["properties"]["class"], "roof");
        assert_eq!(store.open(&out).unwrap().srs(), Srs::WGS84);
    }

    #[test]
    fn test_missing_sources_are_source_errors() {
        let store = LocalVectorStore::new();
        for path in ["/nonexistent/a.shp", "/nonexistent/a.geojson"] {
            assert!(matches!(
                store.open(Path::new(path)),
                Err(VectorError::Source { .. })
            ));
        }
    }
}
