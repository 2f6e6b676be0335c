//! Metric circular buffers around a request point.

use std::f64::consts::PI;

use biomap_core::error::{codes, BiomapError, Result};
use biomap_core::models::{BoundingBox, MetricPoint, Point};
use geo::{Area, BoundingRect, Contains, Coord, LineString, Polygon};

use crate::projection::ProjectionService;

/// Lowest vertex count accepted for the circle approximation
pub const MIN_SEGMENTS: usize = 64;

/// Disk of `radius_km` around `center`, kept in both CRSs.
///
/// Immutable: built once per request and shared by every section.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    center: Point,
    center_metric: MetricPoint,
    radius_km: f64,
    polygon: Polygon<f64>,
    metric_polygon: Polygon<f64>,
}

/// Project `center`, draw the circle in meters and reproject every vertex.
pub fn build_buffer(
    projection: &ProjectionService,
    center: Point,
    radius_km: f64,
    segments: usize,
) -> Result<Buffer> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(BiomapError::validation(
            codes::INVALID_RADIUS,
            "Radius must be positive",
            "Use a radius greater than zero",
        ));
    }

    let segments = segments.max(MIN_SEGMENTS);
    let center_metric = projection.to_metric(&center)?;
    let radius_m = radius_km * 1000.0;

    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / segments as f64;
            Coord {
                x: center_metric.x + radius_m * theta.cos(),
                y: center_metric.y + radius_m * theta.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);

    let metric_polygon = Polygon::new(LineString::from(ring), vec![]);
    let polygon = projection.geometry_to_geographic(&metric_polygon)?;

    tracing::debug!(
        lat = center.lat,
        lng = center.lng,
        radius_km,
        segments,
        "Built analysis buffer"
    );

    Ok(Buffer {
        center,
        center_metric,
        radius_km,
        polygon,
        metric_polygon,
    })
}

impl Buffer {
    pub fn center(&self) -> Point {
        self.center
    }

    pub fn center_metric(&self) -> MetricPoint {
        self.center_metric
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Lon/lat polygon used for intersection and raster masking
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn metric_polygon(&self) -> &Polygon<f64> {
        &self.metric_polygon
    }

    pub fn area_km2(&self) -> f64 {
        self.metric_polygon.unsigned_area() / 1_000_000.0
    }

    pub fn bbox(&self) -> BoundingBox {
        match self.polygon.bounding_rect() {
            Some(rect) => BoundingBox::from_rect(rect),
            None => BoundingBox::new(self.center.lng, self.center.lat, self.center.lng, self.center.lat),
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.polygon.contains(&point.to_geo())
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        let exterior: Vec<Vec<f64>> =
            self.polygon.exterior().coords().map(|c| vec![c.x, c.y]).collect();
        geojson::Geometry::new(geojson::Value::Polygon(vec![exterior]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> ProjectionService {
        ProjectionService::sao_paulo().unwrap()
    }

    #[test]
    fn test_reference_buffer_area() {
        let buffer = build_buffer(&service(), Point::new(-22.5, -47.3), 20.0, 64).unwrap();
        let expected = PI * 20.0 * 20.0;

        assert!(
            (buffer.area_km2() - expected).abs() / expected < 0.02,
            "area was {}",
            buffer.area_km2()
        );
        assert_eq!(buffer.polygon().exterior().0.len(), 65, "64 vertices plus closing vertex");
    }

    #[test]
    fn test_segments_floor() {
        let buffer = build_buffer(&service(), Point::new(-22.5, -47.3), 5.0, 8).unwrap();
        assert_eq!(buffer.polygon().exterior().0.len(), MIN_SEGMENTS + 1);
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let err = build_buffer(&service(), Point::new(-22.5, -47.3), 0.0, 64).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_RADIUS);
    }

    #[test]
    fn test_center_inside_and_bbox() {
        let center = Point::new(-22.5, -47.3);
        let buffer = build_buffer(&service(), center, 10.0, 64).unwrap();

        assert!(buffer.contains(&center));
        let bbox = buffer.bbox();
        // 10 km is about 0.09 degrees of latitude
        assert!((bbox.north - center.lat - 0.09).abs() < 0.005);
        assert!((center.lat - bbox.south - 0.09).abs() < 0.005);
    }

    #[test]
    fn test_geojson_ring_is_closed() {
        let buffer = build_buffer(&service(), Point::new(-22.5, -47.3), 3.0, 64).unwrap();
        match buffer.to_geojson().value {
            geojson::Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_area_matches_disk_after_roundtrip(
            lat in -25.0f64..-20.0,
            lng in -53.0f64..-44.5,
            radius_km in 1.0f64..100.0,
        ) {
            let service = service();
            let buffer = build_buffer(&service, Point::new(lat, lng), radius_km, 64).unwrap();

            // Measure the geographic ring again in meters
            let remeasured = service.geometry_to_metric(buffer.polygon()).unwrap();
            let area = remeasured.unsigned_area() / 1_000_000.0;
            let expected = PI * radius_km * radius_km;

            prop_assert!((area - expected).abs() / expected < 0.02);
        }
    }
}
