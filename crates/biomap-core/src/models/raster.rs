use serde::{Deserialize, Serialize};

use super::point::BoundingBox;

/// Affine pixel → CRS transform in GDAL coefficient order.
///
/// `x = origin_x + col * pixel_width + row * row_rotation`
/// `y = origin_y + col * col_rotation + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform (no rotation). `pixel_height` is given as a positive size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// CRS coordinate of a fractional pixel position (`col`, `row`).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a CRS coordinate, or `None` for a
    /// degenerate transform.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (dx * self.pixel_height - dy * self.row_rotation) / det;
        let row = (dy * self.pixel_width - dx * self.col_rotation) / det;
        Some((col, row))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub epsg: Option<u32>,
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    /// Extent of the full grid in raster CRS units.
    pub fn bounds(&self) -> BoundingBox {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(self.width as f64, 0.0),
            self.transform.apply(0.0, self.height as f64),
            self.transform.apply(self.width as f64, self.height as f64),
        ];
        let (mut west, mut south) = (f64::INFINITY, f64::INFINITY);
        let (mut east, mut north) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            west = west.min(x);
            east = east.max(x);
            south = south.min(y);
            north = north.max(y);
        }
        BoundingBox::new(west, south, east, north)
    }

    /// Absolute pixel size (width, height) in CRS units.
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.transform.pixel_width.hypot(self.transform.col_rotation),
            self.transform.pixel_height.hypot(self.transform.row_rotation),
        )
    }

    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.width, self.height)
    }
}

/// Rectangular block of pixels, offsets relative to the full grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }
}

/// Decoded class codes for a window. `None` marks nodata, out-of-range
/// or non-finite samples.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterWindow {
    pub window: PixelWindow,
    pub cells: Vec<Option<u16>>,
}

impl RasterWindow {
    pub fn new(window: PixelWindow, cells: Vec<Option<u16>>) -> Self {
        debug_assert_eq!(cells.len(), window.len());
        Self { window, cells }
    }

    /// Cell at window-relative (`col`, `row`).
    pub fn get(&self, col: usize, row: usize) -> Option<u16> {
        if col >= self.window.width || row >= self.window.height {
            return None;
        }
        self.cells.get(row * self.window.width + col).copied().flatten()
    }
}

/// Map a raw sample to a class code.
pub fn sample_to_class(value: f64, nodata: Option<f64>) -> Option<u16> {
    if !value.is_finite() || nodata.is_some_and(|nd| nd == value) {
        return None;
    }
    if value < 0.0 || value > u16::MAX as f64 || value.fract() != 0.0 {
        return None;
    }
    Some(value as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_north_up_roundtrip() {
        let transform = GeoTransform::north_up(-53.0, -20.0, 0.00025, 0.00025);
        let (x, y) = transform.apply(400.0, 200.0);
        assert!((x - (-52.9)).abs() < 1e-9);
        assert!((y - (-20.05)).abs() < 1e-9);

        let (col, row) = transform.invert(x, y).unwrap();
        assert!((col - 400.0).abs() < 1e-6);
        assert!((row - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_transform_has_no_inverse() {
        let transform = GeoTransform::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(transform.invert(1.0, 1.0).is_none());
    }

    #[test]
    fn test_metadata_bounds() {
        let meta = RasterMetadata {
            width: 100,
            height: 50,
            transform: GeoTransform::north_up(-48.0, -22.0, 0.01, 0.01),
            epsg: Some(4326),
            nodata: None,
        };
        let b = meta.bounds();
        assert!((b.west - -48.0).abs() < 1e-9);
        assert!((b.east - -47.0).abs() < 1e-9);
        assert!((b.north - -22.0).abs() < 1e-9);
        assert!((b.south - -22.5).abs() < 1e-9);
        assert_eq!(meta.pixel_size(), (0.01, 0.01));
    }

    #[test]
    fn test_sample_to_class() {
        assert_eq!(sample_to_class(15.0, None), Some(15));
        assert_eq!(sample_to_class(255.0, Some(255.0)), None);
        assert_eq!(sample_to_class(-1.0, None), None);
        assert_eq!(sample_to_class(f64::NAN, None), None);
        assert_eq!(sample_to_class(3.5, None), None);
    }

    #[test]
    fn test_window_get_bounds() {
        let window = RasterWindow::new(PixelWindow::new(10, 10, 2, 2), vec![Some(1), None, Some(3), Some(4)]);
        assert_eq!(window.get(0, 0), Some(1));
        assert_eq!(window.get(1, 0), None);
        assert_eq!(window.get(1, 1), Some(4));
        assert_eq!(window.get(2, 0), None);
    }
}
