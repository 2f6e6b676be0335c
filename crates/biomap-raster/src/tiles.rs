//! Slippy-map tile rendering of the land-use raster.

use std::f64::consts::PI;
use std::sync::Arc;

use biomap_core::config::TileConfig;
use biomap_core::error::{BiomapError, Result};
use biomap_core::models::{BoundingBox, LandUseTable};
use biomap_core::ports::RasterBackend;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use crate::window::pixel_at;

/// Deepest zoom whose tile count still fits the coordinate types.
const MAX_SUPPORTED_ZOOM: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoordinate {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoordinate {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Latitude of the northern edge of tile row `y` at zoom `z`.
fn tile_row_to_lat(z: u8, y: f64) -> f64 {
    let n = 2f64.powi(z as i32);
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// Geographic extent of a tile in the standard Web Mercator scheme.
pub fn tile_to_bbox(z: u8, x: u32, y: u32) -> BoundingBox {
    let n = 2f64.powi(z as i32);
    BoundingBox {
        west: x as f64 / n * 360.0 - 180.0,
        east: (x as f64 + 1.0) / n * 360.0 - 180.0,
        north: tile_row_to_lat(z, y as f64),
        south: tile_row_to_lat(z, y as f64 + 1.0),
    }
}

/// Square RGBA tile, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TileImage {
    pub fn transparent(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            rgba: vec![0; (size * size * 4) as usize],
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.rgba.chunks_exact(4).all(|px| px[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(&self.rgba, self.width, self.height, ExtendedColorType::Rgba8)
            .map_err(|e| BiomapError::Raster {
                reason: format!("PNG encoding failed: {}", e),
            })?;
        Ok(buf)
    }
}

/// A rendered tile and whether a read failure blanked it. Degraded tiles
/// must not be cached.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTile<T> {
    pub tile: T,
    pub degraded: bool,
}

impl<T> RenderedTile<T> {
    fn complete(tile: T) -> Self {
        Self { tile, degraded: false }
    }

    fn degraded(tile: T) -> Self {
        Self { tile, degraded: true }
    }

    fn map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<RenderedTile<U>> {
        Ok(RenderedTile {
            tile: f(self.tile)?,
            degraded: self.degraded,
        })
    }
}

pub struct TileRenderer {
    raster: Arc<dyn RasterBackend>,
    classes: Arc<LandUseTable>,
    min_zoom: u8,
    max_zoom: u8,
    tile_size: u32,
    alpha: u8,
}

impl TileRenderer {
    pub fn new(raster: Arc<dyn RasterBackend>, classes: Arc<LandUseTable>, config: &TileConfig) -> Self {
        Self {
            raster,
            classes,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom.min(MAX_SUPPORTED_ZOOM),
            tile_size: config.tile_size.max(1),
            alpha: config.alpha,
        }
    }

    pub fn zoom_range(&self) -> (u8, u8) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Reject zoom levels outside the served range and out-of-grid indices.
    pub fn validate(&self, z: u8, x: u32, y: u32) -> Result<TileCoordinate> {
        let invalid = |reason: String| BiomapError::InvalidTile { z, x, y, reason };

        if z < self.min_zoom || z > self.max_zoom {
            return Err(invalid(format!(
                "zoom must be between {} and {}",
                self.min_zoom, self.max_zoom
            )));
        }
        let n = 1u64 << z;
        if x as u64 >= n || y as u64 >= n {
            return Err(invalid(format!("x and y must be below {} at zoom {}", n, z)));
        }
        Ok(TileCoordinate::new(z, x, y))
    }

    /// Render one tile. Areas outside the raster, and the whole tile when the
    /// raster is missing or unreadable, are transparent.
    pub fn render_tile(&self, z: u8, x: u32, y: u32) -> Result<TileImage> {
        Ok(self.render(z, x, y)?.tile)
    }

    /// Like [`render_tile`](Self::render_tile), flagging tiles blanked by a
    /// metadata or read failure.
    pub fn render(&self, z: u8, x: u32, y: u32) -> Result<RenderedTile<TileImage>> {
        let tile = self.validate(z, x, y)?;
        let size = self.tile_size;

        if !self.raster.is_available() {
            return Ok(RenderedTile::complete(TileImage::transparent(size)));
        }
        let meta = match self.raster.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(tile = %tile, error = %e, "Raster metadata unavailable for tile");
                return Ok(RenderedTile::degraded(TileImage::transparent(size)));
            }
        };

        let bbox = tile_to_bbox(z, x, y);
        if !bbox.intersects(&meta.bounds()) {
            return Ok(RenderedTile::complete(TileImage::transparent(size)));
        }

        // Nearest-neighbour source pixel for every output pixel center
        let mut targets = Vec::new();
        let mut positions = Vec::new();
        for py in 0..size {
            let lat = tile_row_to_lat(z, y as f64 + (py as f64 + 0.5) / size as f64);
            for px in 0..size {
                let lng = bbox.west + (px as f64 + 0.5) / size as f64 * bbox.width();
                if let Some(position) = pixel_at(&meta, lng, lat) {
                    targets.push((py * size + px) as usize);
                    positions.push(position);
                }
            }
        }

        let mut image = TileImage::transparent(size);
        if positions.is_empty() {
            return Ok(RenderedTile::complete(image));
        }

        let samples = match self.raster.sample(&positions) {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(tile = %tile, error = %e, "Tile read failed, serving transparent tile");
                return Ok(RenderedTile::degraded(image));
            }
        };

        for (target, sample) in targets.into_iter().zip(samples) {
            if let Some(class_id) = sample {
                let offset = target * 4;
                image.rgba[offset..offset + 4].copy_from_slice(&self.classes.rgba(class_id, self.alpha));
            }
        }

        tracing::trace!(tile = %tile, sampled = positions.len(), "Tile rendered");
        Ok(RenderedTile::complete(image))
    }

    pub fn render_png(&self, z: u8, x: u32, y: u32) -> Result<RenderedTile<Vec<u8>>> {
        self.render(z, x, y)?.map(|image| image.encode_png())
    }
}
