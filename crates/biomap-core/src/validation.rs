//! Request validation run before any geometry work.

use serde::Serialize;

use crate::error::{codes, BiomapError, Result};
use crate::models::{AnalysisRequest, BoundingBox, Point};

/// Approximate km per degree used only for the buffer-overlap warning.
const KM_PER_DEGREE: f64 = 111.0;

/// Cardinal direction in which a buffer leaves the service region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    South,
    North,
    West,
    East,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub extends_beyond_region: Vec<Direction>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestValidator {
    pub region: BoundingBox,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    /// Radii above this get a performance warning
    pub slow_radius_km: f64,
    /// Reject points in the south-east corner of the region (open sea)
    pub reject_ocean: bool,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self {
            region: BoundingBox::new(-53.1, -25.3, -44.2, -19.8),
            min_radius_km: 1.0,
            max_radius_km: 100.0,
            slow_radius_km: 30.0,
            reject_ocean: true,
        }
    }
}

impl RequestValidator {
    pub fn new(region: BoundingBox) -> Self {
        Self {
            region,
            ..Self::default()
        }
    }

    pub fn validate_point(&self, point: &Point) -> Result<()> {
        if !point.lat.is_finite() || !point.lng.is_finite() {
            return Err(BiomapError::validation(
                codes::INVALID_COORDINATES,
                "Invalid coordinates",
                "Provide numeric latitude and longitude values",
            ));
        }
        if !(-90.0..=90.0).contains(&point.lat) {
            return Err(BiomapError::validation(
                codes::INVALID_COORDINATES,
                "Invalid latitude",
                format!("Latitude must be between -90 and 90 (received {})", point.lat),
            ));
        }
        if !(-180.0..=180.0).contains(&point.lng) {
            return Err(BiomapError::validation(
                codes::INVALID_COORDINATES,
                "Invalid longitude",
                format!("Longitude must be between -180 and 180 (received {})", point.lng),
            ));
        }
        if !self.region.contains(point) {
            return Err(BiomapError::validation(
                codes::INVALID_COORDINATES,
                "Point outside the service region",
                "Select a point inside the state boundaries",
            ));
        }
        if self.reject_ocean && self.is_likely_ocean(point) {
            tracing::warn!(lat = point.lat, lng = point.lng, "Point possibly in ocean");
            return Err(BiomapError::validation(
                codes::INVALID_COORDINATES,
                "Point possibly in the ocean",
                "Select a point on land inside the state",
            ));
        }
        Ok(())
    }

    pub fn validate_radius(&self, radius_km: f64) -> Result<()> {
        if !radius_km.is_finite() {
            return Err(BiomapError::validation(
                codes::INVALID_RADIUS,
                "Invalid radius",
                "Provide a numeric radius in kilometers",
            ));
        }
        if radius_km <= 0.0 {
            return Err(BiomapError::validation(
                codes::INVALID_RADIUS,
                "Radius must be positive",
                "Use a radius greater than zero",
            ));
        }
        if radius_km < self.min_radius_km {
            return Err(BiomapError::validation(
                codes::INVALID_RADIUS,
                "Radius too small",
                format!("Use a radius of at least {} km", self.min_radius_km),
            ));
        }
        if radius_km > self.max_radius_km {
            return Err(BiomapError::validation(
                codes::INVALID_RADIUS,
                "Radius too large",
                format!("The maximum radius is {} km", self.max_radius_km),
            ));
        }
        Ok(())
    }

    /// Full check of an analysis request. Errors abort the pipeline;
    /// warnings travel with the response.
    pub fn validate(&self, request: &AnalysisRequest) -> Result<ValidationReport> {
        self.validate_point(&request.point)?;
        self.validate_radius(request.radius_km)?;

        let mut report = ValidationReport {
            extends_beyond_region: self.buffer_overflow(&request.point, request.radius_km),
            warnings: Vec::new(),
        };

        if !report.extends_beyond_region.is_empty() {
            let directions: Vec<&str> = report
                .extends_beyond_region
                .iter()
                .map(|d| match d {
                    Direction::South => "south",
                    Direction::North => "north",
                    Direction::West => "west",
                    Direction::East => "east",
                })
                .collect();
            tracing::warn!(directions = ?directions, "Buffer extends beyond region");
            report.warnings.push(format!(
                "Part of the radius extends {} beyond the region; results may be incomplete",
                directions.join(", ")
            ));
        }

        if request.radius_km > self.slow_radius_km {
            report.warnings.push(format!(
                "Radii above {} km may result in slower analyses",
                self.slow_radius_km
            ));
        }

        Ok(report)
    }

    /// Directions in which an approximate degree buffer leaves the region.
    pub fn buffer_overflow(&self, point: &Point, radius_km: f64) -> Vec<Direction> {
        let radius_deg = radius_km / KM_PER_DEGREE;
        let mut directions = Vec::new();
        if point.lat - radius_deg < self.region.south {
            directions.push(Direction::South);
        }
        if point.lat + radius_deg > self.region.north {
            directions.push(Direction::North);
        }
        if point.lng - radius_deg < self.region.west {
            directions.push(Direction::West);
        }
        if point.lng + radius_deg > self.region.east {
            directions.push(Direction::East);
        }
        directions
    }

    fn is_likely_ocean(&self, point: &Point) -> bool {
        point.lng > -44.5 && point.lat < -23.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: BiomapError) -> &'static str {
        match err {
            BiomapError::Validation { code, .. } => code,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_request_has_no_warnings() {
        let validator = RequestValidator::default();
        let report = validator
            .validate(&AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0))
            .unwrap();
        assert!(report.warnings.is_empty());
        assert!(report.extends_beyond_region.is_empty());
    }

    #[test]
    fn test_out_of_region_point() {
        let validator = RequestValidator::default();
        let err = validator.validate_point(&Point::new(-15.0, -47.0)).unwrap_err();
        assert_eq!(code_of(err), codes::INVALID_COORDINATES);
    }

    #[test]
    fn test_ocean_point() {
        let validator = RequestValidator::default();
        assert!(validator.validate_point(&Point::new(-24.0, -44.3)).is_err());

        let lenient = RequestValidator {
            reject_ocean: false,
            ..RequestValidator::default()
        };
        assert!(lenient.validate_point(&Point::new(-24.0, -44.3)).is_ok());
    }

    #[test]
    fn test_radius_limits() {
        let validator = RequestValidator::default();
        assert_eq!(code_of(validator.validate_radius(0.0).unwrap_err()), codes::INVALID_RADIUS);
        assert_eq!(code_of(validator.validate_radius(0.5).unwrap_err()), codes::INVALID_RADIUS);
        assert_eq!(code_of(validator.validate_radius(100.5).unwrap_err()), codes::INVALID_RADIUS);
        assert!(validator.validate_radius(100.0).is_ok());
        assert!(validator.validate_radius(f64::NAN).is_err());
    }

    #[test]
    fn test_large_radius_near_border_warns() {
        let validator = RequestValidator::default();
        let report = validator
            .validate(&AnalysisRequest::new(Point::new(-20.0, -50.0), 50.0))
            .unwrap();
        assert_eq!(report.extends_beyond_region, vec![Direction::North]);
        assert_eq!(report.warnings.len(), 2, "overlap and performance warnings");
    }
}
