//! Image acquisition.

pub mod static_maps;

pub use static_maps::StaticMapsClient;

use image::DynamicImage;

use crate::error::AcquisitionError;
use crate::geometry::{Coordinate, ImageSize};

/// One image request: a center, a zoom level and a pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRequest {
    pub center: Coordinate,
    pub zoom: u8,
    pub size: ImageSize,
}

impl ImageRequest {
    #[must_use]
    pub fn new(center: Coordinate, zoom: u8, size: ImageSize) -> Self {
        Self { center, zoom, size }
    }
}

/// Source of satellite imagery.
pub trait ImageProvider {
    /// Fetch the image centered on `request.center`, `size.width` pixels
    /// wide and `size.length` pixels tall.
    ///
    /// # Errors
    /// Any transport, status or decode failure.
    fn fetch(&self, request: &ImageRequest) -> Result<DynamicImage, AcquisitionError>;
}

impl<T: ImageProvider + ?Sized> ImageProvider for &T {
    fn fetch(&self, request: &ImageRequest) -> Result<DynamicImage, AcquisitionError> {
        (**self).fetch(request)
    }
}
