use serde::{Deserialize, Serialize};

/// Geographic coordinate in degrees (EPSG:4326 axis order lat/lng).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Position in geo's x/y order.
    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }
}

/// Coordinate in the metric projected CRS, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub x: f64,
    pub y: f64,
}

impl MetricPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &MetricPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn from_rect(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.west..=self.east).contains(&point.lng) && (self.south..=self.north).contains(&point.lat)
    }

    /// Positive-area overlap test. Boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BoundingBox::new(
            self.west.max(other.west),
            self.south.max(other.south),
            self.east.min(other.east),
            self.north.min(other.north),
        ))
    }

    pub fn center(&self) -> Point {
        Point::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_validity() {
        assert!(Point::new(-22.5, -47.3).is_valid());
        assert!(!Point::new(91.0, 0.0).is_valid());
        assert!(!Point::new(0.0, -180.5).is_valid());
        assert!(!Point::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(10.0, 0.0, 20.0, 10.0);

        assert_eq!(a.intersection(&b), Some(BoundingBox::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&c), "edge-sharing boxes should not overlap");
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_metric_distance() {
        let a = MetricPoint::new(0.0, 0.0);
        let b = MetricPoint::new(3000.0, 4000.0);
        assert!((a.distance_to(&b) - 5000.0).abs() < 1e-9);
    }
}
