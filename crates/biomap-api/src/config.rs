use std::path::PathBuf;

use biomap_core::config::{CliConfigOverrides, LayeredConfig};
use biomap_core::error::Result;
use clap::Parser;

/// Biomap API - biogas proximity and land-use analysis server
#[derive(Parser, Debug, Default)]
#[command(name = "biomap-api")]
#[command(about = "Proximity, land-use and tile server for biogas plant siting", long_about = None)]
#[command(version)]
pub struct ServerArgs {
    /// TOML configuration file
    #[arg(long, short, env = "BIOMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Categorical land-use GeoTIFF
    #[arg(long)]
    pub raster_path: Option<PathBuf>,

    /// Administrative polygon layer (Shapefile or GeoJSON)
    #[arg(long)]
    pub municipalities_path: Option<PathBuf>,

    /// Attribute table joined to the polygons (CSV)
    #[arg(long)]
    pub attributes_path: Option<PathBuf>,

    /// Directory holding the infrastructure layers
    #[arg(long)]
    pub shapefile_dir: Option<PathBuf>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

impl ServerArgs {
    pub fn overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            port: self.port,
            raster_path: self.raster_path.clone(),
            municipalities_path: self.municipalities_path.clone(),
            attributes_path: self.attributes_path.clone(),
            shapefile_dir: self.shapefile_dir.clone(),
        }
    }

    /// Defaults, then the config file, then the environment, then these flags.
    pub fn load_config(&self) -> Result<LayeredConfig> {
        let mut config = match &self.config {
            Some(path) => LayeredConfig::with_defaults().load_from_file(path)?.load_from_env(),
            None => LayeredConfig::load()?,
        };
        config.update_from_cli(self.overrides());
        Ok(config)
    }
}

/// Get the server bind address
pub fn bind_address(config: &LayeredConfig) -> String {
    format!("0.0.0.0:{}", config.port.value)
}
