//! ESRI Shapefile layer reader.
//!
//! Needs the `.shp`, `.shx` and `.dbf` components. The optional `.prj` decides
//! the source CRS; without one the layer is taken as WGS84.

use std::fs;
use std::path::{Path, PathBuf};

use biomap_core::error::{BiomapError, Result};
use biomap_core::models::SourceFeature;
use biomap_core::ports::FeatureSource;
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use shapefile::dbase::FieldValue as DbaseFieldValue;
use shapefile::{PolygonRing, Reader as ShapefileReader, Shape};

use crate::crs::{parse_prj_epsg, reproject_to_wgs84, WGS84};

#[derive(Debug, Clone)]
pub struct ShapefileSource {
    path: PathBuf,
}

impl ShapefileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn format_error(&self, message: String) -> BiomapError {
        BiomapError::Format {
            format: "Shapefile".to_string(),
            path: self.path.clone(),
            message,
        }
    }

    /// Missing `.shp` means the layer is absent; other missing parts mean it is broken.
    fn verify_components(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(BiomapError::unavailable(
                self.describe(),
                format!("{} not found", self.path.display()),
            ));
        }
        let missing: Vec<String> = ["shx", "dbf"]
            .iter()
            .filter(|ext| !self.path.with_extension(ext).exists())
            .map(|ext| format!(".{}", ext))
            .collect();
        if !missing.is_empty() {
            return Err(self.format_error(format!(
                "Missing required component files: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn source_epsg(&self) -> u32 {
        let prj_path = self.path.with_extension("prj");
        match fs::read_to_string(&prj_path) {
            Ok(wkt) => parse_prj_epsg(&wkt).unwrap_or_else(|| {
                tracing::warn!(prj = %prj_path.display(), "Unrecognized .prj, assuming EPSG:4326");
                WGS84
            }),
            Err(_) => WGS84,
        }
    }
}

impl FeatureSource for ShapefileSource {
    fn describe(&self) -> String {
        format!("Shapefile {}", super::layer_name(&self.path))
    }

    fn load(&self) -> Result<Vec<SourceFeature>> {
        self.verify_components()?;

        let mut reader = ShapefileReader::from_path(&self.path)
            .map_err(|e| self.format_error(format!("Failed to open Shapefile: {}", e)))?;
        let epsg = self.source_epsg();

        let mut features = Vec::new();
        for (idx, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) =
                result.map_err(|e| self.format_error(format!("Failed to read feature {}: {}", idx, e)))?;

            let Some(geometry) = shape_to_geometry(&shape) else {
                tracing::debug!(layer = %self.path.display(), feature = idx, "Skipping null or unsupported shape");
                continue;
            };

            let properties = record
                .into_iter()
                .map(|(name, value)| (name, dbase_to_json(&value)))
                .collect();

            features.push(SourceFeature {
                id: idx.to_string(),
                geometry,
                properties,
            });
        }

        tracing::debug!(layer = %self.path.display(), features = features.len(), epsg, "Shapefile read");
        reproject_to_wgs84(features, epsg)
    }
}

/// Convert a record shape. Null shapes and multipatches yield `None`.
pub(crate) fn shape_to_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    match shape {
        Shape::Point(p) => Some(Geometry::Point(geo::Point::new(p.x, p.y))),
        Shape::PointM(p) => Some(Geometry::Point(geo::Point::new(p.x, p.y))),
        Shape::PointZ(p) => Some(Geometry::Point(geo::Point::new(p.x, p.y))),
        Shape::Polyline(line) => Some(lines(line.parts(), |p| Coord { x: p.x, y: p.y })),
        Shape::PolylineM(line) => Some(lines(line.parts(), |p| Coord { x: p.x, y: p.y })),
        Shape::PolylineZ(line) => Some(lines(line.parts(), |p| Coord { x: p.x, y: p.y })),
        Shape::Polygon(polygon) => polygons(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
        Shape::PolygonM(polygon) => polygons(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
        Shape::PolygonZ(polygon) => polygons(polygon.rings(), |p| Coord { x: p.x, y: p.y }),
        Shape::Multipoint(mp) => Some(points(mp.points(), |p| Coord { x: p.x, y: p.y })),
        Shape::MultipointM(mp) => Some(points(mp.points(), |p| Coord { x: p.x, y: p.y })),
        Shape::MultipointZ(mp) => Some(points(mp.points(), |p| Coord { x: p.x, y: p.y })),
        Shape::Multipatch(_) | Shape::NullShape => None,
    }
}

fn lines<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> Coord<f64>) -> Geometry<f64> {
    let mut lines: Vec<LineString<f64>> = parts
        .iter()
        .map(|part| part.iter().map(&xy).collect::<Vec<_>>().into())
        .collect();
    if lines.len() == 1 {
        Geometry::LineString(lines.remove(0))
    } else {
        Geometry::MultiLineString(MultiLineString::new(lines))
    }
}

fn points<P>(points: &[P], xy: impl Fn(&P) -> Coord<f64>) -> Geometry<f64> {
    Geometry::MultiPoint(MultiPoint::new(points.iter().map(|p| geo::Point::from(xy(p))).collect()))
}

/// Outer rings start a new polygon; inner rings become holes of the
/// polygon opened last.
fn polygons<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64>) -> Option<Geometry<f64>> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => {
                let exterior: LineString<f64> = points.iter().map(&xy).collect::<Vec<_>>().into();
                polygons.push(Polygon::new(exterior, vec![]));
            }
            PolygonRing::Inner(points) => {
                let interior: LineString<f64> = points.iter().map(&xy).collect::<Vec<_>>().into();
                match polygons.last_mut() {
                    Some(polygon) => polygon.interiors_push(interior),
                    None => polygons.push(Polygon::new(interior, vec![])),
                }
            }
        }
    }

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

/// dBase field value as JSON. Dates become `YYYY-MM-DD` strings.
pub(crate) fn dbase_to_json(value: &DbaseFieldValue) -> serde_json::Value {
    use serde_json::Value;

    let number = |n: f64| serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    let date = |d: &shapefile::dbase::Date| Value::String(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()));

    match value {
        DbaseFieldValue::Character(Some(s)) => Value::String(s.trim().to_string()),
        DbaseFieldValue::Numeric(Some(n)) => number(*n),
        DbaseFieldValue::Logical(Some(b)) => Value::Bool(*b),
        DbaseFieldValue::Date(Some(d)) => date(d),
        DbaseFieldValue::Float(Some(f)) => number(*f as f64),
        DbaseFieldValue::Integer(i) => Value::Number((*i).into()),
        DbaseFieldValue::Currency(c) => number(*c),
        DbaseFieldValue::DateTime(dt) => date(&dt.date()),
        DbaseFieldValue::Double(d) => number(*d),
        DbaseFieldValue::Memo(s) => Value::String(s.clone()),
        DbaseFieldValue::Character(None)
        | DbaseFieldValue::Numeric(None)
        | DbaseFieldValue::Logical(None)
        | DbaseFieldValue::Date(None)
        | DbaseFieldValue::Float(None) => Value::Null,
    }
}
