//! Geographic ⇄ metric coordinate conversion.
//!
//! Every distance, buffer and area in the kernel is computed in the metric
//! CRS produced here. Nothing measures in degrees.

use std::sync::{Mutex, MutexGuard};

use biomap_core::models::{MetricPoint, Point};
use biomap_core::ProjectionError;
use geo::{Coord, MapCoords};
use proj::Proj;

pub type ProjectionResult<T> = std::result::Result<T, ProjectionError>;

/// Pair of PROJ transformers between one geographic and one metric CRS.
///
/// `Proj` handles are not `Sync`; each direction sits behind its own mutex so
/// a single service can be shared across request tasks.
pub struct ProjectionService {
    geographic_epsg: u32,
    metric_epsg: u32,
    forward: Mutex<Proj>,
    inverse: Mutex<Proj>,
}

impl std::fmt::Debug for ProjectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionService")
            .field("geographic_epsg", &self.geographic_epsg)
            .field("metric_epsg", &self.metric_epsg)
            .finish()
    }
}

impl ProjectionService {
    pub fn new(geographic_epsg: u32, metric_epsg: u32) -> ProjectionResult<Self> {
        let geographic = format!("EPSG:{}", geographic_epsg);
        let metric = format!("EPSG:{}", metric_epsg);

        let forward = build(&geographic, &metric)?;
        let inverse = build(&metric, &geographic)?;

        tracing::debug!(from = %geographic, to = %metric, "Projection service ready");

        Ok(Self {
            geographic_epsg,
            metric_epsg,
            forward: Mutex::new(forward),
            inverse: Mutex::new(inverse),
        })
    }

    /// WGS84 ⇄ SIRGAS 2000 / UTM 23S
    pub fn sao_paulo() -> ProjectionResult<Self> {
        Self::new(4326, 31983)
    }

    pub fn geographic_epsg(&self) -> u32 {
        self.geographic_epsg
    }

    pub fn metric_epsg(&self) -> u32 {
        self.metric_epsg
    }

    pub fn to_metric(&self, point: &Point) -> ProjectionResult<MetricPoint> {
        let proj = lock(&self.forward)?;
        let c = convert(&proj, Coord { x: point.lng, y: point.lat })?;
        Ok(MetricPoint::new(c.x, c.y))
    }

    pub fn to_geographic(&self, point: &MetricPoint) -> ProjectionResult<Point> {
        let proj = lock(&self.inverse)?;
        let c = convert(&proj, Coord { x: point.x, y: point.y })?;
        Ok(Point::new(c.y, c.x))
    }

    /// Reproject any lon/lat geometry into the metric CRS.
    pub fn geometry_to_metric<G>(&self, geometry: &G) -> ProjectionResult<G::Output>
    where
        G: MapCoords<f64, f64>,
    {
        let proj = lock(&self.forward)?;
        geometry.try_map_coords(|c| convert(&proj, c))
    }

    /// Reproject any metric geometry back to lon/lat.
    pub fn geometry_to_geographic<G>(&self, geometry: &G) -> ProjectionResult<G::Output>
    where
        G: MapCoords<f64, f64>,
    {
        let proj = lock(&self.inverse)?;
        geometry.try_map_coords(|c| convert(&proj, c))
    }

    /// Metric distance between two geographic points, kilometers.
    pub fn distance_km(&self, a: &Point, b: &Point) -> ProjectionResult<f64> {
        let a = self.to_metric(a)?;
        let b = self.to_metric(b)?;
        Ok(a.distance_to(&b) / 1000.0)
    }
}

fn build(from: &str, to: &str) -> ProjectionResult<Proj> {
    Proj::new_known_crs(from, to, None).map_err(|e| ProjectionError::Setup {
        from: from.to_string(),
        to: to.to_string(),
        reason: e.to_string(),
    })
}

fn lock(proj: &Mutex<Proj>) -> ProjectionResult<MutexGuard<'_, Proj>> {
    proj.lock().map_err(|_| ProjectionError::Poisoned)
}

fn convert(proj: &Proj, c: Coord<f64>) -> ProjectionResult<Coord<f64>> {
    if !c.x.is_finite() || !c.y.is_finite() {
        return Err(ProjectionError::NonFinite { x: c.x, y: c.y });
    }
    let (x, y) = proj.convert((c.x, c.y)).map_err(|e| ProjectionError::Transform {
        x: c.x,
        y: c.y,
        reason: e.to_string(),
    })?;
    if !x.is_finite() || !y.is_finite() {
        return Err(ProjectionError::Transform {
            x: c.x,
            y: c.y,
            reason: "result is not finite".to_string(),
        });
    }
    Ok(Coord { x, y })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utm_23s_forward() {
        let service = ProjectionService::sao_paulo().unwrap();
        let metric = service.to_metric(&Point::new(-22.5, -47.3)).unwrap();

        // West of the zone's central meridian (-45°), southern hemisphere
        assert!(metric.x > 250_000.0 && metric.x < 280_000.0, "easting was {}", metric.x);
        assert!(metric.y > 7_490_000.0 && metric.y < 7_530_000.0, "northing was {}", metric.y);
    }

    #[test]
    fn test_roundtrip() {
        let service = ProjectionService::sao_paulo().unwrap();
        let original = Point::new(-23.5505, -46.6333);

        let back = service.to_geographic(&service.to_metric(&original).unwrap()).unwrap();

        assert!((back.lat - original.lat).abs() < 1e-7);
        assert!((back.lng - original.lng).abs() < 1e-7);
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let service = ProjectionService::sao_paulo().unwrap();
        let err = service.to_metric(&Point::new(f64::NAN, -47.0)).unwrap_err();
        assert!(matches!(err, ProjectionError::NonFinite { .. }));
    }

    #[test]
    fn test_unknown_crs_fails_setup() {
        let err = ProjectionService::new(4326, 999_999).unwrap_err();
        assert!(matches!(err, ProjectionError::Setup { .. }));
    }

    #[test]
    fn test_distance_km() {
        let service = ProjectionService::sao_paulo().unwrap();
        // One arc-minute of latitude is about 1.85 km
        let d = service
            .distance_km(&Point::new(-22.5, -47.3), &Point::new(-22.5 - 1.0 / 60.0, -47.3))
            .unwrap();
        assert!((d - 1.85).abs() < 0.02, "distance was {}", d);
    }

    #[test]
    fn test_geometry_roundtrip() {
        let service = ProjectionService::sao_paulo().unwrap();
        let line = geo::LineString::from(vec![(-47.3, -22.5), (-47.2, -22.4)]);

        let metric = service.geometry_to_metric(&line).unwrap();
        let back = service.geometry_to_geographic(&metric).unwrap();

        for (a, b) in line.coords().zip(back.coords()) {
            assert!((a.x - b.x).abs() < 1e-7 && (a.y - b.y).abs() < 1e-7);
        }
    }
}
