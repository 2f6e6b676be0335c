use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use biomap_analysis::{AnalyzerSettings, ProximityAnalyzer, ResultCache};
use biomap_core::config::{LandUseConfig, LayeredConfig, TileConfig};
use biomap_core::error::Result;
use biomap_core::models::LandUseTable;
use biomap_core::ports::RasterBackend;
use biomap_geo::ProjectionService;
use biomap_raster::{open_raster_backend, TileCoordinate, TileRenderer};
use biomap_store::{load_attribute_store, load_infrastructure, load_polygon_layer};

pub type TileCache = ResultCache<TileCoordinate, Bytes>;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<ProximityAnalyzer>,
    pub renderer: Arc<TileRenderer>,
    pub raster: Arc<dyn RasterBackend>,
    pub classes: Arc<LandUseTable>,
    pub tile_cache: Arc<TileCache>,
    pub land_use: LandUseConfig,
}

impl AppState {
    pub fn new(
        analyzer: ProximityAnalyzer,
        raster: Arc<dyn RasterBackend>,
        classes: Arc<LandUseTable>,
        tiles: &TileConfig,
        land_use: LandUseConfig,
    ) -> Self {
        let renderer = TileRenderer::new(Arc::clone(&raster), Arc::clone(&classes), tiles);
        let tile_cache = ResultCache::new(
            "tiles",
            tiles.cache_capacity,
            Duration::from_secs(tiles.cache_ttl_secs),
        );

        Self {
            analyzer: Arc::new(analyzer),
            renderer: Arc::new(renderer),
            raster,
            classes,
            tile_cache: Arc::new(tile_cache),
            land_use,
        }
    }

    /// Open every data source named by the configuration.
    ///
    /// Only an unusable projection pair is fatal. Missing layers and rasters
    /// are logged and served as unavailable sections.
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        let projection = Arc::new(ProjectionService::new(
            config.geographic_epsg.value,
            config.metric_epsg.value,
        )?);
        let fields = &config.fields;

        let mut analyzer = ProximityAnalyzer::new(Arc::clone(&projection))
            .with_validator(config.region.validator())
            .with_settings(AnalyzerSettings {
                buffer_segments: config.buffer_segments.value,
                raster_timeout: Duration::from_secs(config.raster_timeout_secs.value),
            })
            .with_cache(Arc::new(ResultCache::new(
                "proximity",
                config.cache_capacity.value,
                Duration::from_secs(config.cache_ttl_secs.value),
            )));

        match load_polygon_layer(config.municipalities_path.value.as_deref(), fields) {
            Ok(layer) => {
                match load_attribute_store(config.attributes_path.value.as_deref(), &layer, fields) {
                    Ok(store) => analyzer = analyzer.with_attributes(store),
                    Err(e) => tracing::warn!(error = %e, "Attribute table unavailable"),
                }
                analyzer = analyzer.with_polygons(Arc::new(layer));
            }
            Err(e) => {
                tracing::error!(error = %e, "Polygon layer failed to load");
                analyzer = analyzer.with_unavailable_polygons(e.to_string());
            }
        }

        let infrastructure = load_infrastructure(
            &config.infrastructure,
            &config.shapefile_dir.value,
            &projection,
            fields,
        );
        analyzer = analyzer.with_infrastructure(Arc::new(infrastructure));

        let raster = open_raster_backend(
            config.raster_path.value.as_deref(),
            config.land_use.chunk_cache_capacity,
        );
        let classes = Arc::new(LandUseTable::mapbiomas());
        analyzer = analyzer.with_raster(Arc::clone(&raster), Arc::clone(&classes));

        Ok(Self::new(analyzer, raster, classes, &config.tiles, config.land_use.clone()))
    }
}
