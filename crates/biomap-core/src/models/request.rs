use serde::{Deserialize, Serialize};

use super::point::Point;

/// Section toggles for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default = "default_true", alias = "include_mapbiomas")]
    pub include_land_use: bool,
    #[serde(default = "default_true", alias = "include_biogas_potential")]
    pub include_attributes: bool,
    #[serde(default = "default_true")]
    pub include_infrastructure: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_land_use: true,
            include_attributes: true,
            include_infrastructure: true,
        }
    }
}

impl AnalysisOptions {
    /// Compact flag string used in cache keys, e.g. `LAI` or `-A-`.
    pub fn flags(&self) -> String {
        [
            (self.include_land_use, 'L'),
            (self.include_attributes, 'A'),
            (self.include_infrastructure, 'I'),
        ]
        .iter()
        .map(|(on, c)| if *on { *c } else { '-' })
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub point: Point,
    pub radius_km: f64,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(point: Point, radius_km: f64) -> Self {
        Self {
            point,
            radius_km,
            options: AnalysisOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }
}
