//! Biomap Analysis - Proximity analysis pipeline, attribute reduction, and caching
//!
//! The [`ProximityAnalyzer`] joins the geometric and raster engines into one
//! report per request. Reports and rendered tiles are kept in [`ResultCache`]s.

pub mod aggregate;
pub mod biogas;
pub mod cache;
pub mod models;
pub mod pipeline;

pub use aggregate::{aggregate, AggregateResult, AggregateSpec, FieldGroup};
pub use biogas::{BiogasPotential, BiogasSchema};
pub use cache::{AnalysisCacheKey, CacheStats, ResultCache};
pub use models::{
    AnalysisMetadata, AnalysisReport, AnalysisResults, AnalysisSummary, RadiusRecommendation,
};
pub use pipeline::{AnalyzerSettings, ProximityAnalyzer};
