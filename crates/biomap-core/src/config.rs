use crate::error::{BiomapError, Result};
use crate::models::BoundingBox;
use crate::validation::RequestValidator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "biomap.toml";

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Service region used by request validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub bounds: BoundingBox,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    pub slow_radius_km: f64,
    pub reject_ocean: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        let validator = RequestValidator::default();
        Self {
            bounds: validator.region,
            min_radius_km: validator.min_radius_km,
            max_radius_km: validator.max_radius_km,
            slow_radius_km: validator.slow_radius_km,
            reject_ocean: validator.reject_ocean,
        }
    }
}

impl RegionConfig {
    pub fn validator(&self) -> RequestValidator {
        RequestValidator {
            region: self.bounds,
            min_radius_km: self.min_radius_km,
            max_radius_km: self.max_radius_km,
            slow_radius_km: self.slow_radius_km,
            reject_ocean: self.reject_ocean,
        }
    }
}

/// Tile rendering and tile cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
    pub alpha: u8,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            min_zoom: 5,
            max_zoom: 16,
            tile_size: 256,
            alpha: 200,
            cache_capacity: 2000,
            cache_ttl_secs: 86_400,
        }
    }
}

/// Land-use raster description served by the metadata endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandUseConfig {
    pub name: String,
    pub year: u16,
    /// Reported by `/bounds` when the raster cannot be opened
    pub default_bounds: BoundingBox,
    /// Decoded TIFF chunks kept in memory
    pub chunk_cache_capacity: usize,
}

impl Default for LandUseConfig {
    fn default() -> Self {
        Self {
            name: "MapBiomas Agropecuária SP".to_string(),
            year: 2024,
            default_bounds: BoundingBox::new(
                -53.11091487994166,
                -25.35863198693838,
                -44.16099970425887,
                -19.779285588800445,
            ),
            chunk_cache_capacity: 256,
        }
    }
}

/// Property names probed when reading vector layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub polygon_name: Vec<String>,
    pub polygon_code: Vec<String>,
    pub infrastructure_name: Vec<String>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            polygon_name: owned(&["NM_MUN", "nome", "NOME", "name", "municipality_name"]),
            polygon_code: owned(&["CD_MUN", "ibge_code", "codigo"]),
            infrastructure_name: owned(&["nome", "NOME", "Nome", "name", "NAME"]),
        }
    }
}

/// One auxiliary layer searched by the proximity finder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureLayerConfig {
    pub layer_type: String,
    pub display_name: String,
    /// File stems (or paths) relative to the shapefile directory
    pub files: Vec<String>,
    pub max_distance_km: f64,
}

impl InfrastructureLayerConfig {
    fn new(layer_type: &str, display_name: &str, files: &[&str], max_distance_km: f64) -> Self {
        Self {
            layer_type: layer_type.to_string(),
            display_name: display_name.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            max_distance_km,
        }
    }

    /// Resolve configured file names against a base directory.
    /// Names without an extension are taken as Shapefile stems.
    pub fn resolve_paths(&self, base: &Path) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|file| {
                let path = base.join(file);
                if path.extension().is_some() {
                    path
                } else {
                    path.with_extension("shp")
                }
            })
            .collect()
    }
}

pub fn default_infrastructure_layers() -> Vec<InfrastructureLayerConfig> {
    vec![
        InfrastructureLayerConfig::new(
            "gas_pipeline",
            "Gasoduto",
            &["Gasodutos_Distribuicao_SP", "Gasodutos_Transporte_SP"],
            100.0,
        ),
        InfrastructureLayerConfig::new("substation", "Subestação", &["Subestacoes_Energia"], 50.0),
        InfrastructureLayerConfig::new(
            "railway",
            "Rodovia/Ferrovia",
            &["Rodovias_Estaduais_SP"],
            50.0,
        ),
        InfrastructureLayerConfig::new(
            "transmission_line",
            "Linha de Transmissão",
            &["Linhas_De_Transmissao_Energia"],
            50.0,
        ),
        InfrastructureLayerConfig::new("ete", "ETE", &["ETEs_2019_SP"], 30.0),
    ]
}

/// Layered configuration for Biomap
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub port: ConfigValue<u16>,
    pub cors_origin: ConfigValue<String>,
    pub geographic_epsg: ConfigValue<u32>,
    pub metric_epsg: ConfigValue<u32>,
    pub buffer_segments: ConfigValue<usize>,
    pub raster_path: ConfigValue<Option<PathBuf>>,
    pub municipalities_path: ConfigValue<Option<PathBuf>>,
    pub attributes_path: ConfigValue<Option<PathBuf>>,
    pub shapefile_dir: ConfigValue<PathBuf>,
    pub raster_timeout_secs: ConfigValue<u64>,
    pub cache_capacity: ConfigValue<usize>,
    pub cache_ttl_secs: ConfigValue<u64>,

    // File-only sections
    pub region: RegionConfig,
    pub tiles: TileConfig,
    pub land_use: LandUseConfig,
    pub fields: FieldConfig,
    pub infrastructure: Vec<InfrastructureLayerConfig>,
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            port: ConfigValue::new(8000, ConfigSource::Default),
            cors_origin: ConfigValue::new(
                "http://localhost:3000".to_string(),
                ConfigSource::Default,
            ),
            geographic_epsg: ConfigValue::new(4326, ConfigSource::Default),
            metric_epsg: ConfigValue::new(31983, ConfigSource::Default),
            buffer_segments: ConfigValue::new(64, ConfigSource::Default),
            raster_path: ConfigValue::new(None, ConfigSource::Default),
            municipalities_path: ConfigValue::new(None, ConfigSource::Default),
            attributes_path: ConfigValue::new(None, ConfigSource::Default),
            shapefile_dir: ConfigValue::new(PathBuf::from("data/shapefile"), ConfigSource::Default),
            raster_timeout_secs: ConfigValue::new(30, ConfigSource::Default),
            cache_capacity: ConfigValue::new(500, ConfigSource::Default),
            cache_ttl_secs: ConfigValue::new(300, ConfigSource::Default),
            region: RegionConfig::default(),
            tiles: TileConfig::default(),
            land_use: LandUseConfig::default(),
            fields: FieldConfig::default(),
            infrastructure: default_infrastructure_layers(),
        }
    }

    /// Defaults, then `BIOMAP_CONFIG` (or `./biomap.toml` when present), then
    /// the environment.
    pub fn load() -> Result<Self> {
        let config = Self::with_defaults();
        let config = match env::var("BIOMAP_CONFIG") {
            Ok(path) => config.load_from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                config.load_from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => config,
        };
        Ok(config.load_from_env())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| BiomapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| BiomapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let src = ConfigSource::File;
        if let Some(port) = file_config.port {
            self.port.update(port, src);
        }
        if let Some(origin) = file_config.cors_origin {
            self.cors_origin.update(origin, src);
        }
        if let Some(epsg) = file_config.geographic_epsg {
            self.geographic_epsg.update(epsg, src);
        }
        if let Some(epsg) = file_config.metric_epsg {
            self.metric_epsg.update(epsg, src);
        }
        if let Some(segments) = file_config.buffer_segments {
            self.buffer_segments.update(segments, src);
        }
        if let Some(path) = file_config.raster_path {
            self.raster_path.update(Some(path), src);
        }
        if let Some(path) = file_config.municipalities_path {
            self.municipalities_path.update(Some(path), src);
        }
        if let Some(path) = file_config.attributes_path {
            self.attributes_path.update(Some(path), src);
        }
        if let Some(dir) = file_config.shapefile_dir {
            self.shapefile_dir.update(dir, src);
        }
        if let Some(secs) = file_config.raster_timeout_secs {
            self.raster_timeout_secs.update(secs, src);
        }
        if let Some(capacity) = file_config.cache_capacity {
            self.cache_capacity.update(capacity, src);
        }
        if let Some(ttl) = file_config.cache_ttl_secs {
            self.cache_ttl_secs.update(ttl, src);
        }

        if let Some(region) = file_config.region {
            self.region = region;
        }
        if let Some(tiles) = file_config.tiles {
            self.tiles = tiles;
        }
        if let Some(land_use) = file_config.land_use {
            self.land_use = land_use;
        }
        if let Some(fields) = file_config.fields {
            self.fields = fields;
        }
        if let Some(layers) = file_config.infrastructure {
            self.infrastructure = layers;
        }

        self.validate()?;
        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        let src = ConfigSource::Environment;

        if let Some(port) = parse_env::<u16>("BIOMAP_PORT", "expected port number") {
            self.port.update(port, src);
        }
        if let Ok(origin) = env::var("BIOMAP_CORS_ORIGIN") {
            self.cors_origin.update(origin, src);
        }
        if let Some(epsg) = parse_env::<u32>("BIOMAP_METRIC_EPSG", "expected integer EPSG code") {
            self.metric_epsg.update(epsg, src);
        }
        if let Some(segments) = parse_env::<usize>("BIOMAP_BUFFER_SEGMENTS", "expected integer") {
            if segments < 64 {
                tracing::warn!(segments, "BIOMAP_BUFFER_SEGMENTS below 64, ignoring");
            } else {
                self.buffer_segments.update(segments, src);
            }
        }
        if let Ok(path) = env::var("BIOMAP_RASTER_PATH") {
            self.raster_path.update(Some(PathBuf::from(path)), src);
        }
        if let Ok(path) = env::var("BIOMAP_MUNICIPALITIES_PATH") {
            self.municipalities_path.update(Some(PathBuf::from(path)), src);
        }
        if let Ok(path) = env::var("BIOMAP_ATTRIBUTES_PATH") {
            self.attributes_path.update(Some(PathBuf::from(path)), src);
        }
        if let Ok(dir) = env::var("BIOMAP_SHAPEFILE_DIR") {
            self.shapefile_dir.update(PathBuf::from(dir), src);
        }
        if let Some(secs) = parse_env::<u64>("BIOMAP_RASTER_TIMEOUT_SECS", "expected seconds") {
            self.raster_timeout_secs.update(secs, src);
        }
        if let Some(capacity) = parse_env::<usize>("BIOMAP_CACHE_CAPACITY", "expected integer") {
            self.cache_capacity.update(capacity, src);
        }
        if let Some(ttl) = parse_env::<u64>("BIOMAP_CACHE_TTL_SECS", "expected seconds") {
            self.cache_ttl_secs.update(ttl, src);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        let src = ConfigSource::Cli;
        if let Some(port) = overrides.port {
            self.port.update(port, src);
        }
        if let Some(path) = overrides.raster_path {
            self.raster_path.update(Some(path), src);
        }
        if let Some(path) = overrides.municipalities_path {
            self.municipalities_path.update(Some(path), src);
        }
        if let Some(path) = overrides.attributes_path {
            self.attributes_path.update(Some(path), src);
        }
        if let Some(dir) = overrides.shapefile_dir {
            self.shapefile_dir.update(dir, src);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.buffer_segments.value < 64 {
            return Err(BiomapError::ConfigInvalid {
                key: "buffer_segments".to_string(),
                reason: format!("must be at least 64, got {}", self.buffer_segments.value),
            });
        }
        if self.tiles.min_zoom > self.tiles.max_zoom || self.tiles.max_zoom > 24 {
            return Err(BiomapError::ConfigInvalid {
                key: "tiles".to_string(),
                reason: format!(
                    "invalid zoom range {}..={}",
                    self.tiles.min_zoom, self.tiles.max_zoom
                ),
            });
        }
        if self.tiles.tile_size == 0 {
            return Err(BiomapError::ConfigInvalid {
                key: "tiles.tile_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Some(layer) = self.infrastructure.iter().find(|l| l.max_distance_km <= 0.0) {
            return Err(BiomapError::ConfigInvalid {
                key: format!("infrastructure.{}", layer.layer_type),
                reason: "max_distance_km must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get all scalar configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();
        let path_or_none = |p: &Option<PathBuf>| {
            p.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<none>".to_string())
        };

        map.insert("port".to_string(), (self.port.value.to_string(), self.port.source));
        map.insert(
            "cors_origin".to_string(),
            (self.cors_origin.value.clone(), self.cors_origin.source),
        );
        map.insert(
            "geographic_crs".to_string(),
            (format!("EPSG:{}", self.geographic_epsg.value), self.geographic_epsg.source),
        );
        map.insert(
            "metric_crs".to_string(),
            (format!("EPSG:{}", self.metric_epsg.value), self.metric_epsg.source),
        );
        map.insert(
            "buffer_segments".to_string(),
            (self.buffer_segments.value.to_string(), self.buffer_segments.source),
        );
        map.insert(
            "raster_path".to_string(),
            (path_or_none(&self.raster_path.value), self.raster_path.source),
        );
        map.insert(
            "municipalities_path".to_string(),
            (path_or_none(&self.municipalities_path.value), self.municipalities_path.source),
        );
        map.insert(
            "attributes_path".to_string(),
            (path_or_none(&self.attributes_path.value), self.attributes_path.source),
        );
        map.insert(
            "shapefile_dir".to_string(),
            (self.shapefile_dir.value.display().to_string(), self.shapefile_dir.source),
        );
        map.insert(
            "raster_timeout_secs".to_string(),
            (self.raster_timeout_secs.value.to_string(), self.raster_timeout_secs.source),
        );
        map.insert(
            "cache_capacity".to_string(),
            (self.cache_capacity.value.to_string(), self.cache_capacity.source),
        );
        map.insert(
            "cache_ttl_secs".to_string(),
            (self.cache_ttl_secs.value.to_string(), self.cache_ttl_secs.source),
        );

        map
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': {}", key, raw, expected);
            None
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    port: Option<u16>,
    cors_origin: Option<String>,
    geographic_epsg: Option<u32>,
    metric_epsg: Option<u32>,
    buffer_segments: Option<usize>,
    raster_path: Option<PathBuf>,
    municipalities_path: Option<PathBuf>,
    attributes_path: Option<PathBuf>,
    shapefile_dir: Option<PathBuf>,
    raster_timeout_secs: Option<u64>,
    cache_capacity: Option<usize>,
    cache_ttl_secs: Option<u64>,
    region: Option<RegionConfig>,
    tiles: Option<TileConfig>,
    land_use: Option<LandUseConfig>,
    fields: Option<FieldConfig>,
    infrastructure: Option<Vec<InfrastructureLayerConfig>>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub port: Option<u16>,
    pub raster_path: Option<PathBuf>,
    pub municipalities_path: Option<PathBuf>,
    pub attributes_path: Option<PathBuf>,
    pub shapefile_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.geographic_epsg.value, 4326);
        assert_eq!(config.metric_epsg.value, 31983);
        assert_eq!(config.metric_epsg.source, ConfigSource::Default);
        assert_eq!(config.buffer_segments.value, 64);
        assert_eq!(config.tiles.min_zoom, 5);
        assert_eq!(config.tiles.max_zoom, 16);
        assert_eq!(config.infrastructure.len(), 5);
        assert!(config.raster_path.value.is_none());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
metric_epsg = 31982
raster_path = "/data/rasters/mapbiomas.tif"
cache_capacity = 50

[tiles]
min_zoom = 3
max_zoom = 12

[[infrastructure]]
layer_type = "substation"
display_name = "Substation"
files = ["substations.geojson"]
max_distance_km = 25.0
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.metric_epsg.value, 31982);
        assert_eq!(config.metric_epsg.source, ConfigSource::File);
        assert_eq!(
            config.raster_path.value.as_deref(),
            Some(Path::new("/data/rasters/mapbiomas.tif"))
        );
        assert_eq!(config.cache_capacity.value, 50);
        assert_eq!(config.tiles.min_zoom, 3);
        assert_eq!(config.tiles.tile_size, 256, "unset table keys keep defaults");
        assert_eq!(config.infrastructure.len(), 1);
        assert_eq!(config.infrastructure[0].max_distance_km, 25.0);
    }

    #[test]
    fn test_file_rejects_small_segment_count() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "buffer_segments = 16").unwrap();

        let result = LayeredConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(result, Err(BiomapError::ConfigInvalid { ref key, .. }) if key == "buffer_segments"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        env::set_var("BIOMAP_CACHE_TTL_SECS", "900");
        env::set_var("BIOMAP_PORT", "not-a-port");

        let config = LayeredConfig::with_defaults().load_from_env();

        env::remove_var("BIOMAP_CACHE_TTL_SECS");
        env::remove_var("BIOMAP_PORT");

        assert_eq!(config.cache_ttl_secs.value, 900);
        assert_eq!(config.cache_ttl_secs.source, ConfigSource::Environment);
        assert_eq!(config.port.value, 8000, "invalid values are ignored");
        assert_eq!(config.port.source, ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            port: Some(9000),
            raster_path: Some(PathBuf::from("/tmp/raster.tif")),
            ..Default::default()
        });

        assert_eq!(config.port.value, 9000);
        assert_eq!(config.port.source, ConfigSource::Cli);
        assert_eq!(config.raster_path.source, ConfigSource::Cli);
        assert_eq!(config.shapefile_dir.source, ConfigSource::Default);
    }

    #[test]
    fn test_resolve_infrastructure_paths() {
        let layers = default_infrastructure_layers();
        let gas = &layers[0];
        let paths = gas.resolve_paths(Path::new("/data"));
        assert_eq!(paths[0], PathBuf::from("/data/Gasodutos_Distribuicao_SP.shp"));
        assert_eq!(paths[1], PathBuf::from("/data/Gasodutos_Transporte_SP.shp"));
    }

    #[test]
    fn test_inspection_map() {
        let config = LayeredConfig::with_defaults();
        let map = config.to_inspection_map();

        let (metric, source) = &map["metric_crs"];
        assert_eq!(metric, "EPSG:31983");
        assert_eq!(*source, ConfigSource::Default);
        assert_eq!(map["raster_path"].0, "<none>");
    }
}
