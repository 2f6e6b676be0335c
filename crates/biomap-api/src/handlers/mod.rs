mod cache;
mod health;
mod mapbiomas;
mod proximity;

pub use cache::{cache_stats, clear_cache};
pub use health::health_check;
pub use mapbiomas::{get_bounds, get_classes, get_metadata, get_tile};
pub use proximity::{analyze_proximity, infrastructure_types, radius_recommendations, validate_point};
