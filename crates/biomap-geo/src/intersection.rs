//! Buffer ∩ polygon-layer search and distance ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use biomap_core::error::Result;
use biomap_core::models::MatchedPolygon;
use biomap_core::round_to;
use geo::{Area, BooleanOps, BoundingRect, Centroid, Contains, Intersects};

use crate::buffer::Buffer;
use crate::layer::PolygonLayer;
use crate::projection::ProjectionService;

/// Polygons intersecting `buffer`, nearest centroid first.
///
/// Intersection is tested on the lon/lat geometries. Distances and areas come
/// from the metric reprojection of each candidate. A polygon containing the
/// request point reports a distance of zero. Ties are ordered by feature id.
pub fn find_intersecting(
    projection: &ProjectionService,
    buffer: &Buffer,
    layer: &PolygonLayer,
) -> Result<Vec<MatchedPolygon>> {
    if layer.is_empty() {
        return Ok(Vec::new());
    }

    let center = buffer.center().to_geo();
    let center_metric = buffer.center_metric();
    let mut matches = Vec::new();

    for feature in layer.candidates(&buffer.bbox()) {
        if !feature.geometry.intersects(buffer.polygon()) {
            continue;
        }

        let metric = projection.geometry_to_metric(&feature.geometry)?;
        let area_m2 = metric.unsigned_area();
        let contains_point = feature.geometry.contains(&center);

        let distance_km = if contains_point {
            0.0
        } else {
            let anchor = metric
                .centroid()
                .or_else(|| metric.bounding_rect().map(|rect| rect.center().into()));
            match anchor {
                Some(c) => (c.x() - center_metric.x).hypot(c.y() - center_metric.y) / 1000.0,
                None => {
                    tracing::warn!(feature_id = %feature.id, "Polygon has no metric centroid, distance set to 0");
                    0.0
                }
            }
        };

        let overlap_m2 = metric.intersection(buffer.metric_polygon()).unsigned_area();
        let intersection_percent = if area_m2 > 0.0 {
            (overlap_m2 / area_m2 * 100.0).min(100.0)
        } else {
            0.0
        };

        matches.push(MatchedPolygon {
            feature_id: feature.id.clone(),
            name: feature.name.clone(),
            external_code: feature.external_code.clone(),
            distance_km,
            intersects: true,
            contains_point,
            intersection_percent: round_to(intersection_percent, 2),
            area_km2: round_to(area_m2 / 1_000_000.0, 2),
            attributes: BTreeMap::new(),
        });
    }

    // Sort on the exact distance, round for presentation afterwards
    matches.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.feature_id.cmp(&b.feature_id))
    });
    for m in &mut matches {
        m.distance_km = round_to(m.distance_km, 2);
    }

    tracing::debug!(
        candidates = layer.len(),
        matched = matches.len(),
        radius_km = buffer.radius_km(),
        "Polygon intersection complete"
    );

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::build_buffer;
    use biomap_core::models::{Point, PolygonFeature};
    use geo::{polygon, MultiPolygon};
    use proptest::prelude::*;

    fn square(id: &str, west: f64, south: f64, size: f64) -> PolygonFeature {
        PolygonFeature {
            id: id.to_string(),
            name: format!("Municipality {}", id),
            external_code: Some(format!("35{}", id)),
            geometry: MultiPolygon::new(vec![polygon![
                (x: west, y: south),
                (x: west + size, y: south),
                (x: west + size, y: south + size),
                (x: west, y: south + size),
                (x: west, y: south),
            ]]),
            properties: serde_json::Map::new(),
        }
    }

    fn setup() -> (ProjectionService, Buffer) {
        let projection = ProjectionService::sao_paulo().unwrap();
        let buffer = build_buffer(&projection, Point::new(-22.5, -47.3), 20.0, 64).unwrap();
        (projection, buffer)
    }

    #[test]
    fn test_sorted_and_filtered() {
        let (projection, buffer) = setup();
        let layer = PolygonLayer::new(vec![
            // Holds the request point
            square("01", -47.4, -22.6, 0.2),
            // East neighbour, inside the buffer
            square("02", -47.2, -22.6, 0.2),
            // Far away
            square("03", -45.0, -23.0, 0.2),
            // North-west neighbour
            square("04", -47.6, -22.4, 0.2),
        ]);

        let matches = find_intersecting(&projection, &buffer, &layer).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.feature_id.as_str()).collect();

        assert_eq!(matches.len(), 3, "far polygon excluded");
        assert_eq!(ids[0], "01");
        assert_eq!(matches[0].distance_km, 0.0);
        assert!(matches[0].contains_point);
        assert!(!ids.contains(&"03"));
        assert!(matches.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn test_intersection_percent() {
        let (projection, buffer) = setup();
        // Tiny square around the centre lies fully inside the 20 km buffer
        let layer = PolygonLayer::new(vec![square("01", -47.31, -22.51, 0.02)]);

        let matches = find_intersecting(&projection, &buffer, &layer).unwrap();
        assert_eq!(matches.len(), 1);
        assert!((matches[0].intersection_percent - 100.0).abs() < 0.01);
        assert!(matches[0].area_km2 > 0.0);
    }

    #[test]
    fn test_zero_area_polygon_is_kept() {
        let (projection, buffer) = setup();
        // Collapsed ring along a parallel, north of the centre
        let sliver = PolygonFeature {
            geometry: MultiPolygon::new(vec![polygon![
                (x: -47.35, y: -22.45),
                (x: -47.25, y: -22.45),
                (x: -47.30, y: -22.45),
                (x: -47.35, y: -22.45),
            ]]),
            ..square("sliver", 0.0, 0.0, 0.0)
        };

        let matches = find_intersecting(&projection, &buffer, &PolygonLayer::new(vec![sliver])).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].feature_id, "sliver");
        assert!(matches[0].distance_km.is_finite());
        assert_eq!(matches[0].area_km2, 0.0);
        assert_eq!(matches[0].intersection_percent, 0.0);
    }

    #[test]
    fn test_empty_layer_returns_empty() {
        let (projection, buffer) = setup();
        let matches = find_intersecting(&projection, &buffer, &PolygonLayer::empty()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_ties_break_on_feature_id() {
        let (projection, buffer) = setup();
        // Identical geometry, different ids, inserted out of order
        let layer = PolygonLayer::new(vec![
            square("b", -47.2, -22.6, 0.1),
            square("a", -47.2, -22.6, 0.1),
        ]);

        let matches = find_intersecting(&projection, &buffer, &layer).unwrap();
        assert_eq!(matches[0].feature_id, "a");
        assert_eq!(matches[1].feature_id, "b");
        assert_eq!(matches[0].distance_km, matches[1].distance_km);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_distances_non_decreasing(
            offsets in proptest::collection::vec((-0.3f64..0.3, -0.3f64..0.3), 1..12),
        ) {
            let (projection, buffer) = setup();
            let features = offsets
                .iter()
                .enumerate()
                .map(|(i, (dx, dy))| square(&format!("{:02}", i), -47.3 + dx, -22.5 + dy, 0.05))
                .collect();
            let layer = PolygonLayer::new(features);

            let matches = find_intersecting(&projection, &buffer, &layer).unwrap();
            prop_assert!(matches.iter().all(|m| m.distance_km >= 0.0));
            prop_assert!(matches.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        }
    }
}
