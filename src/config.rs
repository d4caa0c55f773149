//! Run configuration.
//!
//! [`PipelineOptions`] is built once (from the CLI or by a library caller)
//! and handed to the pipeline by value; nothing reads options from global
//! state.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::artifacts::ArtifactSet;
use crate::error::ConfigError;
use crate::geometry::{Coordinate, ImageSize, Srs};
use crate::raster::GeoTiffCompression;

pub const DEFAULT_ZOOM: u8 = 16;
pub const DEFAULT_OUTPUT_ROOT: &str = "tiffany.out";
pub const DEFAULT_ENV_FILE: &str = ".tiffany.env";
pub const API_KEY_VAR: &str = "API_KEY";

/// Options shared by every item of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Tile zoom level
    pub zoom: u8,
    /// Requested image size
    pub size: ImageSize,
    /// Root of the `png/`, `tif/` and `json/` artifact directories
    pub output_root: PathBuf,
    /// Vector label source to clip per item
    pub labels: Option<PathBuf>,
    /// Georeference and reproject fetched images
    pub georeference: bool,
    /// Re-fetch even when the image artifact exists
    pub force: bool,
    /// Reference system of the final georeferenced artifact
    pub target_srs: Srs,
    /// Compression of georeferenced artifacts
    pub compression: GeoTiffCompression,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            size: ImageSize::default(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            labels: None,
            georeference: true,
            force: false,
            target_srs: Srs::WGS84,
            compression: GeoTiffCompression::None,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: impl Into<PathBuf>) -> Self {
        self.labels = Some(labels.into());
        self
    }

    #[must_use]
    pub fn with_georeference(mut self, georeference: bool) -> Self {
        self.georeference = georeference;
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_target_srs(mut self, srs: Srs) -> Self {
        self.target_srs = srs;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Reject option combinations no item could run with.
    ///
    /// # Errors
    /// [`ConfigError::LabelsWithoutReference`] for a label source with
    /// georeferencing disabled, [`ConfigError::InvalidSize`] for a zero
    /// dimension.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.labels.is_some() && !self.georeference {
            return Err(ConfigError::LabelsWithoutReference);
        }
        if !self.size.is_valid() {
            return Err(ConfigError::InvalidSize(format!(
                "{},{}",
                self.size.length, self.size.width
            )));
        }
        Ok(())
    }

    /// Artifact paths for `coordinate` under these options.
    #[must_use]
    pub fn artifacts(&self, coordinate: &Coordinate) -> ArtifactSet {
        ArtifactSet::new(&self.output_root, coordinate, self.zoom, self.size)
    }
}

/// Image provider credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read `API_KEY` from the env file at `env_path`, falling back to the
    /// process environment when the file is absent or does not set it.
    ///
    /// # Errors
    /// [`ConfigError::EnvFile`] if the file exists but cannot be parsed,
    /// [`ConfigError::MissingCredential`] if no non-empty key is found.
    pub fn load(env_path: &Path) -> Result<Self, ConfigError> {
        if let Some(key) = Self::from_env_file(env_path)? {
            debug!(path = %env_path.display(), "loaded API key from env file");
            return Ok(Self::new(key));
        }
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(ConfigError::MissingCredential(env_path.to_path_buf())),
        }
    }

    fn from_env_file(env_path: &Path) -> Result<Option<String>, ConfigError> {
        if !env_path.is_file() {
            return Ok(None);
        }
        let env_error = |reason: String| ConfigError::EnvFile {
            path: env_path.to_path_buf(),
            reason,
        };
        let entries = dotenvy::from_path_iter(env_path).map_err(|e| env_error(e.to_string()))?;
        for entry in entries {
            let (name, value) = entry.map_err(|e| env_error(e.to_string()))?;
            if name == API_KEY_VAR && !value.trim().is_empty() {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}
