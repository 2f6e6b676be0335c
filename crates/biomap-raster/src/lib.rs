//! Biomap Raster - Categorical raster access, zonal statistics, and tiles
//!
//! Backends implement [`biomap_core::ports::RasterBackend`]. The zonal engine
//! and the tile renderer only see that trait, so a missing raster degrades to
//! the [`DisabledRaster`] backend instead of branching at every call site.

pub mod disabled;
pub mod geotiff;
pub mod mask;
pub mod memory;
pub mod tiles;
pub mod window;
pub mod zonal;

use std::path::Path;
use std::sync::Arc;

use biomap_core::ports::RasterBackend;

pub use disabled::DisabledRaster;
pub use geotiff::GeoTiffRaster;
pub use memory::MemoryRaster;
pub use tiles::{tile_to_bbox, RenderedTile, TileCoordinate, TileImage, TileRenderer};
pub use zonal::{analyze, ClassStats, ZonalStatsResult, ZonalStatus};

/// Select the backend once at startup.
///
/// A missing path or a file that cannot be opened yields a [`DisabledRaster`]
/// carrying the reason.
pub fn open_raster_backend(path: Option<&Path>, chunk_cache_capacity: usize) -> Arc<dyn RasterBackend> {
    let Some(path) = path else {
        tracing::warn!("No raster path configured, land-use features disabled");
        return Arc::new(DisabledRaster::new("no raster path configured"));
    };

    match GeoTiffRaster::open(path, chunk_cache_capacity) {
        Ok(raster) => {
            tracing::info!(path = %path.display(), "Land-use raster opened");
            Arc::new(raster)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Land-use raster unavailable");
            Arc::new(DisabledRaster::new(e.to_string()))
        }
    }
}
