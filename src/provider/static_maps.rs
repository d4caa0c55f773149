//! Google Static Maps client.

use std::time::Duration;

use image::DynamicImage;
use tracing::debug;

use crate::error::AcquisitionError;

use super::{ImageProvider, ImageRequest};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";

const MAP_TYPE: &str = "satellite";
const SCALE: u8 = 1;

/// Blocking Static Maps client.
#[derive(Debug, Clone)]
pub struct StaticMapsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl StaticMapsClient {
    /// Client against the public endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tiffany/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at another endpoint (a mirror or a local stub).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Query parameters for `request`, in request order.
    #[must_use]
    pub fn query(&self, request: &ImageRequest) -> Vec<(&'static str, String)> {
        vec![
            (
                "center",
                format!("{},{}", request.center.latitude(), request.center.longitude()),
            ),
            ("zoom", request.zoom.to_string()),
            ("size", format!("{}x{}", request.size.width, request.size.length)),
            ("scale", SCALE.to_string()),
            ("maptype", MAP_TYPE.to_string()),
            ("key", self.api_key.clone()),
        ]
    }
}

impl ImageProvider for StaticMapsClient {
    fn fetch(&self, request: &ImageRequest) -> Result<DynamicImage, AcquisitionError> {
        debug!(
            lat = request.center.latitude(),
            lon = request.center.longitude(),
            zoom = request.zoom,
            size = %request.size,
            "requesting image"
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query(request))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AcquisitionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes()?;
        Ok(image::load_from_memory(&bytes)?)
    }
}
