use biomap_core::error::{BiomapError, Result};
use biomap_core::models::{PixelWindow, RasterMetadata, RasterWindow};
use biomap_core::ports::RasterBackend;

/// Backend used when no raster can be served. Every read reports
/// `ResourceUnavailable`.
#[derive(Debug, Clone)]
pub struct DisabledRaster {
    reason: String,
}

impl DisabledRaster {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> BiomapError {
        BiomapError::unavailable("land-use raster", self.reason.clone())
    }
}

impl RasterBackend for DisabledRaster {
    fn describe(&self) -> String {
        format!("disabled ({})", self.reason)
    }

    fn is_available(&self) -> bool {
        false
    }

    fn metadata(&self) -> Result<RasterMetadata> {
        Err(self.error())
    }

    fn read_window(&self, _window: &PixelWindow) -> Result<RasterWindow> {
        Err(self.error())
    }

    fn sample(&self, _pixels: &[(usize, usize)]) -> Result<Vec<Option<u16>>> {
        Err(self.error())
    }
}
