//! Per-class pixel statistics of a categorical raster clipped to a buffer.

use std::collections::BTreeMap;

use biomap_core::models::{LandUseCategory, LandUseTable, PixelWindow, RasterMetadata};
use biomap_core::ports::RasterBackend;
use biomap_core::round_to;
use biomap_geo::Buffer;
use serde::{Deserialize, Serialize};

use crate::mask::polygon_mask;
use crate::window::window_for_bbox;

/// Rows decoded per read so large buffers never hold the whole window.
const BAND_ROWS: usize = 256;

const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonalStatus {
    Ok,
    Empty,
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub class_id: u16,
    pub name: String,
    pub color: String,
    pub category: LandUseCategory,
    pub pixel_count: u64,
    pub area_km2: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalStatsResult {
    pub status: ZonalStatus,
    pub total_area_km2: f64,
    pub total_pixels: u64,
    pub per_class: BTreeMap<u16, ClassStats>,
    pub dominant_class_id: Option<u16>,
    pub dominant_class_name: Option<String>,
    pub agricultural_percent: f64,
    pub pixel_resolution_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ZonalStatsResult {
    fn blank(status: ZonalStatus) -> Self {
        Self {
            status,
            total_area_km2: 0.0,
            total_pixels: 0,
            per_class: BTreeMap::new(),
            dominant_class_id: None,
            dominant_class_name: None,
            agricultural_percent: 0.0,
            pixel_resolution_m: None,
            error: None,
            note: None,
        }
    }

    pub fn empty(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::blank(ZonalStatus::Empty)
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::blank(ZonalStatus::Unavailable)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::blank(ZonalStatus::Failed)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ZonalStatus::Ok
    }
}

/// Flat-earth area of one pixel in km² at `lat`; not geodesic.
pub fn pixel_area_km2(meta: &RasterMetadata, lat: f64) -> f64 {
    let (pw, ph) = meta.pixel_size();
    (pw * KM_PER_DEGREE * lat.to_radians().cos() * ph * KM_PER_DEGREE).abs()
}

/// Land-use composition of the raster inside `buffer`.
///
/// Never fails: every problem is reported through `status` and `error`.
pub fn analyze(buffer: &Buffer, raster: &dyn RasterBackend, classes: &LandUseTable) -> ZonalStatsResult {
    let meta = match raster.metadata() {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(raster = %raster.describe(), error = %e, "Land-use raster unavailable");
            return ZonalStatsResult::unavailable(e.to_string());
        }
    };

    let Some(window) = window_for_bbox(&meta, &buffer.bbox()) else {
        tracing::debug!(radius_km = buffer.radius_km(), "Buffer outside raster coverage");
        return ZonalStatsResult::empty("Buffer does not overlap the land-use raster");
    };

    let counts = match count_classes(buffer, raster, &meta, &window, classes) {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!(window = ?window, error = %e, "Land-use raster read failed");
            return ZonalStatsResult::failed(e.to_string());
        }
    };

    let total_pixels: u64 = counts.values().sum();
    if total_pixels == 0 {
        return ZonalStatsResult::empty("No valid land-use pixels inside the buffer");
    }

    let pixel_area = pixel_area_km2(&meta, buffer.center().lat);
    let mut per_class = BTreeMap::new();
    let mut agricultural = 0.0;
    let mut dominant: Option<(u16, u64)> = None;

    for (&class_id, &pixel_count) in &counts {
        let class = classes.resolve(class_id);
        let percent = pixel_count as f64 / total_pixels as f64 * 100.0;
        if class.category == LandUseCategory::Agricultural {
            agricultural += percent;
        }
        // BTreeMap order is ascending, so ties keep the lower id
        match dominant {
            Some((_, best)) if best >= pixel_count => {}
            _ => dominant = Some((class_id, pixel_count)),
        }
        per_class.insert(
            class_id,
            ClassStats {
                class_id,
                name: class.name,
                color: class.color,
                category: class.category,
                pixel_count,
                area_km2: round_to(pixel_count as f64 * pixel_area, 4),
                percent: round_to(percent, 2),
            },
        );
    }

    let dominant_class_id = dominant.map(|(id, _)| id);
    let result = ZonalStatsResult {
        status: ZonalStatus::Ok,
        total_area_km2: round_to(total_pixels as f64 * pixel_area, 4),
        total_pixels,
        dominant_class_name: dominant_class_id.map(|id| classes.resolve(id).name),
        dominant_class_id,
        per_class,
        agricultural_percent: round_to(agricultural, 2),
        pixel_resolution_m: Some(round_to(pixel_area.sqrt() * 1000.0, 2)),
        error: None,
        note: None,
    };

    tracing::debug!(
        total_pixels,
        classes = result.per_class.len(),
        dominant = ?result.dominant_class_id,
        "Zonal statistics computed"
    );
    result
}

fn count_classes(
    buffer: &Buffer,
    raster: &dyn RasterBackend,
    meta: &RasterMetadata,
    window: &PixelWindow,
    classes: &LandUseTable,
) -> biomap_core::Result<BTreeMap<u16, u64>> {
    let mut counts = BTreeMap::new();
    let mut row = window.row_off;
    let row_end = window.row_off + window.height;

    while row < row_end {
        let band = PixelWindow::new(window.col_off, row, window.width, BAND_ROWS.min(row_end - row));
        let mask = polygon_mask(buffer.polygon(), meta, &band);
        if mask.iter().any(|inside| *inside) {
            let data = raster.read_window(&band)?;
            for (inside, cell) in mask.iter().zip(&data.cells) {
                if !inside {
                    continue;
                }
                if let Some(class_id) = cell {
                    if !classes.is_nodata(*class_id) {
                        *counts.entry(*class_id).or_insert(0) += 1;
                    }
                }
            }
        }
        row += band.height;
    }
    Ok(counts)
}
