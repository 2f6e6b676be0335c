use biomap_core::error::{BiomapError, Result};
use biomap_core::models::{sample_to_class, GeoTransform, PixelWindow, RasterMetadata, RasterWindow};
use biomap_core::ports::RasterBackend;

/// Fully decoded raster held in memory. Used for tests and small grids.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    metadata: RasterMetadata,
    cells: Vec<Option<u16>>,
}

impl MemoryRaster {
    /// Row-major raw samples; the nodata value and invalid samples become `None`.
    pub fn new(metadata: RasterMetadata, values: &[f64]) -> Result<Self> {
        if values.len() != metadata.width * metadata.height {
            return Err(BiomapError::Raster {
                reason: format!(
                    "expected {} samples for {}x{}, got {}",
                    metadata.width * metadata.height,
                    metadata.width,
                    metadata.height,
                    values.len()
                ),
            });
        }
        let cells = values.iter().map(|&v| sample_to_class(v, metadata.nodata)).collect();
        Ok(Self { metadata, cells })
    }

    /// Geographic north-up grid filled by `f(col, row)`.
    pub fn from_fn(
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
        f: impl Fn(usize, usize) -> f64,
    ) -> Self {
        let metadata = RasterMetadata {
            width,
            height,
            transform,
            epsg: Some(4326),
            nodata,
        };
        let cells = (0..height)
            .flat_map(|row| (0..width).map(move |col| (col, row)))
            .map(|(col, row)| sample_to_class(f(col, row), nodata))
            .collect();
        Self { metadata, cells }
    }

    fn check(&self, window: &PixelWindow) -> Result<()> {
        if window.col_off + window.width > self.metadata.width
            || window.row_off + window.height > self.metadata.height
        {
            return Err(BiomapError::Raster {
                reason: format!(
                    "window {:?} exceeds raster {}x{}",
                    window, self.metadata.width, self.metadata.height
                ),
            });
        }
        Ok(())
    }
}

impl RasterBackend for MemoryRaster {
    fn describe(&self) -> String {
        format!("memory {}x{}", self.metadata.width, self.metadata.height)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn metadata(&self) -> Result<RasterMetadata> {
        Ok(self.metadata.clone())
    }

    fn read_window(&self, window: &PixelWindow) -> Result<RasterWindow> {
        self.check(window)?;
        let mut cells = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.height {
            let start = row * self.metadata.width + window.col_off;
            cells.extend_from_slice(&self.cells[start..start + window.width]);
        }
        Ok(RasterWindow::new(*window, cells))
    }

    fn sample(&self, pixels: &[(usize, usize)]) -> Result<Vec<Option<u16>>> {
        Ok(pixels
            .iter()
            .map(|&(col, row)| {
                if col < self.metadata.width && row < self.metadata.height {
                    self.cells[row * self.metadata.width + col]
                } else {
                    None
                }
            })
            .collect())
    }
}
