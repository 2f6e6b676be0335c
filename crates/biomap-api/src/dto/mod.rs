mod request;
mod response;

pub use request::{AnalyzeRequest, PointQuery};
pub use response::{
    BoundsResponse, CacheStatsResponse, ClassesResponse, HealthResponse, InfrastructureTypeInfo,
    InfrastructureTypesResponse, RadiusBand, RadiusRecommendationsResponse, RasterMetadataResponse,
    RegionBounds, ValidatePointResponse,
};
