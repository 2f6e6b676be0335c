use crate::error::Result;
use crate::models::{PixelWindow, RasterMetadata, RasterWindow};

/// Windowed reader over a categorical raster.
///
/// Implementations must be safe to call from several blocking tasks at once.
pub trait RasterBackend: Send + Sync {
    /// Human-readable source description (path or backend name)
    fn describe(&self) -> String;

    /// False for the disabled backend and for sources that failed to open
    fn is_available(&self) -> bool;

    /// Grid size, transform, CRS and nodata value
    fn metadata(&self) -> Result<RasterMetadata>;

    /// Decode the class codes of a window; the window must lie inside the grid
    fn read_window(&self, window: &PixelWindow) -> Result<RasterWindow>;

    /// Class codes at absolute (`col`, `row`) positions, in input order.
    ///
    /// The default reads the bounding window of all positions once.
    fn sample(&self, pixels: &[(usize, usize)]) -> Result<Vec<Option<u16>>> {
        let Some(window) = bounding_window(pixels) else {
            return Ok(Vec::new());
        };
        let data = self.read_window(&window)?;
        Ok(pixels
            .iter()
            .map(|&(col, row)| data.get(col - window.col_off, row - window.row_off))
            .collect())
    }

    /// Size of the backing file, when there is one
    fn file_size_bytes(&self) -> Option<u64> {
        None
    }
}

/// Smallest window holding every position, `None` for an empty slice.
pub fn bounding_window(pixels: &[(usize, usize)]) -> Option<PixelWindow> {
    let (first_col, first_row) = *pixels.first()?;
    let (mut min_col, mut max_col, mut min_row, mut max_row) =
        (first_col, first_col, first_row, first_row);
    for &(col, row) in pixels {
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    }
    Some(PixelWindow::new(
        min_col,
        min_row,
        max_col - min_col + 1,
        max_row - min_row + 1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_window() {
        assert_eq!(bounding_window(&[]), None);
        assert_eq!(
            bounding_window(&[(5, 2), (3, 9), (7, 4)]),
            Some(PixelWindow::new(3, 2, 5, 8))
        );
    }
}
