//! Polygon rasterization at pixel centers.

use biomap_core::models::{PixelWindow, RasterMetadata};
use geo::{Contains, LineString, Polygon};

/// Row-major in-polygon flags for every pixel of `window`.
///
/// A pixel belongs to the polygon when its center does (even-odd rule, so
/// interior rings are holes). North-up grids use a scanline fill; rotated
/// grids fall back to a point-in-polygon test per pixel.
pub fn polygon_mask(polygon: &Polygon<f64>, meta: &RasterMetadata, window: &PixelWindow) -> Vec<bool> {
    let t = &meta.transform;
    if t.row_rotation == 0.0 && t.col_rotation == 0.0 && t.pixel_width > 0.0 {
        scanline_mask(polygon, meta, window)
    } else {
        point_mask(polygon, meta, window)
    }
}

fn scanline_mask(polygon: &Polygon<f64>, meta: &RasterMetadata, window: &PixelWindow) -> Vec<bool> {
    let t = &meta.transform;
    let mut mask = vec![false; window.len()];
    let mut crossings: Vec<f64> = Vec::new();

    let col_lo = window.col_off as f64;
    let col_hi = (window.col_off + window.width) as f64;

    for r in 0..window.height {
        let y = t.origin_y + ((window.row_off + r) as f64 + 0.5) * t.pixel_height;

        crossings.clear();
        ring_crossings(polygon.exterior(), y, &mut crossings);
        for interior in polygon.interiors() {
            ring_crossings(interior, y, &mut crossings);
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        let row = &mut mask[r * window.width..(r + 1) * window.width];
        for span in crossings.chunks_exact(2) {
            // First and one-past-last column whose center lies in [x0, x1)
            let start = ((span[0] - t.origin_x) / t.pixel_width - 0.5).ceil().max(col_lo);
            let end = ((span[1] - t.origin_x) / t.pixel_width - 0.5).ceil().min(col_hi);
            if end <= start {
                continue;
            }
            let start = start as usize - window.col_off;
            let end = end as usize - window.col_off;
            for cell in &mut row[start..end] {
                *cell = true;
            }
        }
    }
    mask
}

fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

fn point_mask(polygon: &Polygon<f64>, meta: &RasterMetadata, window: &PixelWindow) -> Vec<bool> {
    let mut mask = Vec::with_capacity(window.len());
    for r in 0..window.height {
        for c in 0..window.width {
            let (x, y) = meta.transform.apply(
                (window.col_off + c) as f64 + 0.5,
                (window.row_off + r) as f64 + 0.5,
            );
            mask.push(polygon.contains(&geo::Point::new(x, y)));
        }
    }
    mask
}
