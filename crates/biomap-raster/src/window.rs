//! Geographic extent → pixel window conversion.

use biomap_core::models::{BoundingBox, PixelWindow, RasterMetadata};

/// Window of pixels touched by `bbox`, clamped to the grid.
///
/// Returns `None` when the box does not overlap the raster or the transform
/// cannot be inverted.
pub fn window_for_bbox(meta: &RasterMetadata, bbox: &BoundingBox) -> Option<PixelWindow> {
    let clipped = bbox.intersection(&meta.bounds())?;

    let corners = [
        (clipped.west, clipped.north),
        (clipped.east, clipped.north),
        (clipped.west, clipped.south),
        (clipped.east, clipped.south),
    ];

    let (mut min_col, mut min_row) = (f64::INFINITY, f64::INFINITY);
    let (mut max_col, mut max_row) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let (col, row) = meta.transform.invert(x, y)?;
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    }

    let col_start = clamp_index(min_col.floor(), meta.width);
    let col_end = clamp_index(max_col.ceil(), meta.width);
    let row_start = clamp_index(min_row.floor(), meta.height);
    let row_end = clamp_index(max_row.ceil(), meta.height);

    if col_end <= col_start || row_end <= row_start {
        return None;
    }

    Some(PixelWindow::new(
        col_start,
        row_start,
        col_end - col_start,
        row_end - row_start,
    ))
}

/// Whole-pixel index of a fractional position, `None` outside the grid.
pub fn pixel_at(meta: &RasterMetadata, x: f64, y: f64) -> Option<(usize, usize)> {
    let (col, row) = meta.transform.invert(x, y)?;
    if col < 0.0 || row < 0.0 {
        return None;
    }
    let (col, row) = (col.floor() as usize, row.floor() as usize);
    if col >= meta.width || row >= meta.height {
        return None;
    }
    Some((col, row))
}

fn clamp_index(value: f64, limit: usize) -> usize {
    if value <= 0.0 {
        0
    } else if value >= limit as f64 {
        limit
    } else {
        value as usize
    }
}
