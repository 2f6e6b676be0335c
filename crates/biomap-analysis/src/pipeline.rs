//! Proximity analysis pipeline.
//!
//! validate → cache lookup → buffer → {intersection, zonal statistics,
//! infrastructure} on the blocking pool → attribute join and reduction →
//! report → cache store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use biomap_core::error::{BiomapError, Result};
use biomap_core::models::{AnalysisRequest, LandUseTable, MatchedPolygon, Point};
use biomap_core::ports::{AttributeStore, RasterBackend};
use biomap_core::round_to;
use biomap_core::validation::RequestValidator;
use biomap_geo::{
    build_buffer, find_intersecting, Buffer, InfrastructureFinder, InfrastructureMatch,
    PolygonLayer, ProjectionService, MIN_SEGMENTS,
};
use biomap_raster::{zonal, DisabledRaster, ZonalStatsResult, ZonalStatus};
use chrono::Utc;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::biogas::{BiogasPotential, BiogasSchema};
use crate::cache::{AnalysisCacheKey, ResultCache};
use crate::models::{
    crs_label, AnalysisMetadata, AnalysisReport, AnalysisResults, AnalysisSummary,
    RadiusRecommendation,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub buffer_segments: usize,
    /// Upper bound for the land-use section
    pub raster_timeout: Duration,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            buffer_segments: MIN_SEGMENTS,
            raster_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs one analysis per call. Every collaborator is shared read-only; the
/// report cache is the only mutable state.
pub struct ProximityAnalyzer {
    projection: Arc<ProjectionService>,
    validator: RequestValidator,
    polygons: Arc<PolygonLayer>,
    /// Set when the polygon layer failed to load at startup
    polygons_error: Option<String>,
    attributes: Option<Arc<dyn AttributeStore>>,
    raster: Arc<dyn RasterBackend>,
    classes: Arc<LandUseTable>,
    infrastructure: Arc<InfrastructureFinder>,
    cache: Arc<ResultCache<AnalysisCacheKey, AnalysisReport>>,
    schema: BiogasSchema,
    settings: AnalyzerSettings,
}

impl ProximityAnalyzer {
    /// Analyzer with no layers, a disabled raster and a 500 entry / 5 minute cache.
    pub fn new(projection: Arc<ProjectionService>) -> Self {
        Self {
            projection,
            validator: RequestValidator::default(),
            polygons: Arc::new(PolygonLayer::empty()),
            polygons_error: None,
            attributes: None,
            raster: Arc::new(DisabledRaster::new("no raster configured")),
            classes: Arc::new(LandUseTable::mapbiomas()),
            infrastructure: Arc::new(InfrastructureFinder::default()),
            cache: Arc::new(ResultCache::new("proximity", 500, Duration::from_secs(300))),
            schema: BiogasSchema::default(),
            settings: AnalyzerSettings::default(),
        }
    }

    pub fn with_validator(mut self, validator: RequestValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_polygons(mut self, polygons: Arc<PolygonLayer>) -> Self {
        self.polygons = polygons;
        self
    }

    /// Keep an empty layer and report `reason` in every municipalities section.
    pub fn with_unavailable_polygons(mut self, reason: impl Into<String>) -> Self {
        self.polygons = Arc::new(PolygonLayer::empty());
        self.polygons_error = Some(reason.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn AttributeStore>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_raster(mut self, raster: Arc<dyn RasterBackend>, classes: Arc<LandUseTable>) -> Self {
        self.raster = raster;
        self.classes = classes;
        self
    }

    pub fn with_infrastructure(mut self, infrastructure: Arc<InfrastructureFinder>) -> Self {
        self.infrastructure = infrastructure;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache<AnalysisCacheKey, AnalysisReport>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_schema(mut self, schema: BiogasSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_settings(mut self, settings: AnalyzerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn cache(&self) -> &Arc<ResultCache<AnalysisCacheKey, AnalysisReport>> {
        &self.cache
    }

    pub fn polygons(&self) -> &PolygonLayer {
        &self.polygons
    }

    pub fn infrastructure(&self) -> &InfrastructureFinder {
        &self.infrastructure
    }

    pub fn projection(&self) -> &ProjectionService {
        &self.projection
    }

    /// Run the full analysis for `request`.
    ///
    /// Validation and projection failures abort the request. A missing or
    /// failing layer only degrades its own section.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport> {
        let started = Instant::now();
        let validation = self.validator.validate(&request)?;
        let key = AnalysisCacheKey::from_request(&request);

        if let Some(mut cached) = self.cache.get(&key) {
            cached.analysis_id = Uuid::new_v4().to_string();
            cached.request = request;
            cached.warnings = validation.warnings;
            cached.from_cache = true;
            tracing::info!(key = %key, analysis_id = %cached.analysis_id, "Proximity analysis served from cache");
            return Ok(cached);
        }

        let analysis_id = Uuid::new_v4().to_string();
        tracing::info!(
            analysis_id = %analysis_id,
            lat = request.point.lat,
            lng = request.point.lng,
            radius_km = request.radius_km,
            options = %request.options.flags(),
            "Starting proximity analysis"
        );

        let buffer = Arc::new(build_buffer(
            &self.projection,
            request.point,
            request.radius_km,
            self.settings.buffer_segments,
        )?);

        let (municipalities, land_use, infrastructure) = tokio::join!(
            self.intersection_phase(Arc::clone(&buffer)),
            self.land_use_phase(Arc::clone(&buffer), request.options.include_land_use),
            self.infrastructure_phase(request.point, request.options.include_infrastructure),
        );
        let (mut municipalities, municipalities_error) = municipalities?;
        let infrastructure = infrastructure?;

        let biogas_potential = if request.options.include_attributes {
            self.join_attributes(&mut municipalities);
            let reduction = aggregate(&municipalities, &self.schema.aggregate_spec());
            Some(BiogasPotential::from_aggregate(&reduction, &self.schema))
        } else {
            None
        };

        let summary = self.summarize(&request, &buffer, &municipalities, biogas_potential.as_ref());
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let report = AnalysisReport {
            analysis_id,
            request,
            results: AnalysisResults {
                buffer_geometry: buffer.to_geojson(),
                municipalities,
                municipalities_error,
                biogas_potential,
                land_use,
                infrastructure,
            },
            summary,
            metadata: AnalysisMetadata {
                analysis_timestamp: Utc::now(),
                processing_time_ms,
                coordinate_system: crs_label(self.projection.geographic_epsg()),
                buffer_projection: crs_label(self.projection.metric_epsg()),
            },
            warnings: validation.warnings,
            from_cache: false,
        };

        if self.is_cacheable(&report.results) {
            self.cache.insert(key, report.clone());
        } else {
            tracing::info!(analysis_id = %report.analysis_id, "Degraded report not cached");
        }
        tracing::info!(
            analysis_id = %report.analysis_id,
            municipalities = report.summary.total_municipalities,
            processing_time_ms,
            "Proximity analysis completed"
        );
        Ok(report)
    }

    /// False when a section failed on a read or timeout that a retry could
    /// fix. A polygon layer missing since startup stays cacheable.
    fn is_cacheable(&self, results: &AnalysisResults) -> bool {
        let land_use_failed = results
            .land_use
            .as_ref()
            .is_some_and(|section| section.status == ZonalStatus::Failed);
        let intersection_failed = results.municipalities_error.is_some() && self.polygons_error.is_none();
        !land_use_failed && !intersection_failed
    }

    /// Matched polygons, or an empty list plus the error when the layer fails.
    /// Projection failures stay fatal.
    async fn intersection_phase(
        &self,
        buffer: Arc<Buffer>,
    ) -> Result<(Vec<MatchedPolygon>, Option<String>)> {
        if let Some(reason) = &self.polygons_error {
            return Ok((Vec::new(), Some(reason.clone())));
        }

        let projection = Arc::clone(&self.projection);
        let polygons = Arc::clone(&self.polygons);

        match run_blocking("intersection", move || find_intersecting(&projection, &buffer, &polygons)).await {
            Ok(matches) => Ok((matches, None)),
            Err(e @ BiomapError::Projection(_)) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Polygon intersection failed, section degraded");
                Ok((Vec::new(), Some(e.to_string())))
            }
        }
    }

    async fn land_use_phase(&self, buffer: Arc<Buffer>, enabled: bool) -> Option<ZonalStatsResult> {
        if !enabled {
            return None;
        }

        let raster = Arc::clone(&self.raster);
        let classes = Arc::clone(&self.classes);
        let timeout = self.settings.raster_timeout;
        let job = tokio::task::spawn_blocking(move || zonal::analyze(&buffer, raster.as_ref(), &classes));

        // The blocking job keeps running after a timeout; its result is dropped
        let result = match tokio::time::timeout(timeout, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Land-use task failed");
                ZonalStatsResult::failed(format!("Land-use task failed: {}", e))
            }
            Err(_) => {
                let err = BiomapError::Timeout {
                    operation: "land-use zonal statistics".to_string(),
                    seconds: timeout.as_secs(),
                };
                tracing::warn!(error = %err, "Land-use analysis timed out");
                ZonalStatsResult::failed(err.to_string())
            }
        };
        Some(result)
    }

    async fn infrastructure_phase(
        &self,
        point: Point,
        enabled: bool,
    ) -> Result<Option<Vec<InfrastructureMatch>>> {
        if !enabled {
            return Ok(None);
        }

        let projection = Arc::clone(&self.projection);
        let finder = Arc::clone(&self.infrastructure);
        run_blocking("infrastructure", move || finder.find_nearest(&projection, &point))
            .await
            .map(Some)
    }

    fn join_attributes(&self, municipalities: &mut [MatchedPolygon]) {
        let Some(store) = &self.attributes else {
            return;
        };

        for polygon in municipalities.iter_mut() {
            match store.lookup(&polygon.name, polygon.external_code.as_deref()) {
                Ok(Some(record)) => polygon.attributes = record.values,
                Ok(None) => {
                    tracing::debug!(name = %polygon.name, "No attribute row for polygon");
                }
                Err(e) => {
                    tracing::warn!(name = %polygon.name, error = %e, "Attribute lookup failed");
                }
            }
        }
    }

    fn summarize(
        &self,
        request: &AnalysisRequest,
        buffer: &Buffer,
        municipalities: &[MatchedPolygon],
        biogas: Option<&BiogasPotential>,
    ) -> AnalysisSummary {
        let total_population: f64 = municipalities
            .iter()
            .filter_map(|m| m.attribute(&self.schema.population_field))
            .filter(|p| p.is_finite() && *p > 0.0)
            .sum();

        AnalysisSummary {
            total_area_km2: round_to(buffer.area_km2(), 2),
            total_municipalities: municipalities.len(),
            total_population: total_population.round() as u64,
            total_biogas_m3_year: biogas.map(|b| b.total_m3_year).unwrap_or(0.0),
            energy_potential_mwh_year: biogas.map(|b| b.energy_potential_mwh_year).unwrap_or(0.0),
            radius_recommendation: RadiusRecommendation::for_radius(request.radius_km),
        }
    }
}

async fn run_blocking<T, F>(operation: &'static str, job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|e| BiomapError::Task {
        operation: operation.to_string(),
        reason: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    use biomap_core::models::{
        AnalysisOptions, AttributeRecord, GeoTransform, PixelWindow, PolygonFeature, RasterMetadata,
        RasterWindow,
    };
    use biomap_raster::MemoryRaster;
    use biomap_store::MemoryAttributeStore;
    use geo::{polygon, MultiPolygon};

    fn square(id: &str, name: &str, west: f64, south: f64, size: f64) -> PolygonFeature {
        PolygonFeature {
            id: id.to_string(),
            name: name.to_string(),
            external_code: None,
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

    fn analyzer() -> ProximityAnalyzer {
        let projection = Arc::new(ProjectionService::sao_paulo().unwrap());
        let polygons = PolygonLayer::new(vec![
            square("1", "Piracicaba", -47.4, -22.6, 0.2),
            square("2", "Limeira", -47.2, -22.6, 0.2),
            square("3", "Far Away", -45.0, -23.0, 0.2),
        ]);
        let attributes = MemoryAttributeStore::from_records(vec![
            AttributeRecord::new("Piracicaba")
                .with_value("total_biogas_m3_year", 800.0)
                .with_value("urban_biogas_m3_year", 600.0)
                .with_value("livestock_biogas_m3_year", 200.0)
                .with_value("population", 410_000.0),
            AttributeRecord::new("Limeira")
                .with_value("total_biogas_m3_year", 200.0)
                .with_value("agricultural_biogas_m3_year", 200.0)
                .with_value("population", 300_000.0),
        ]);
        let raster = MemoryRaster::from_fn(
            200,
            200,
            GeoTransform::north_up(-48.0, -21.5, 0.01, -0.01),
            Some(0.0),
            |col, _| if col < 70 { 15.0 } else { 20.0 },
        );

        ProximityAnalyzer::new(projection)
            .with_polygons(Arc::new(polygons))
            .with_attributes(Arc::new(attributes))
            .with_raster(Arc::new(raster), Arc::new(LandUseTable::mapbiomas()))
    }

    #[tokio::test]
    async fn test_full_report() {
        let analyzer = analyzer();
        let report = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0))
            .await
            .unwrap();

        let names: Vec<&str> = report.results.municipalities.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(!names.contains(&"Far Away"));

        let biogas = report.results.biogas_potential.as_ref().unwrap();
        assert_eq!(biogas.total_m3_year, 1000.0);
        assert_eq!(biogas.by_category["Urbano"], 600.0);
        assert_eq!(report.summary.total_population, 710_000);
        assert_eq!(report.summary.radius_recommendation, RadiusRecommendation::Optimal);
        assert!((report.summary.total_area_km2 - 1256.6).abs() / 1256.6 < 0.01);

        let land_use = report.results.land_use.as_ref().unwrap();
        assert_eq!(land_use.status, ZonalStatus::Ok);
        assert!((land_use.agricultural_percent - 100.0).abs() < 0.01);
        assert!(report.results.infrastructure.as_ref().unwrap().is_empty());
        assert_eq!(report.metadata.buffer_projection, "SIRGAS 2000 / UTM 23S (EPSG:31983)");
        assert!(!report.from_cache);
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let analyzer = analyzer();
        let first = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0))
            .await
            .unwrap();
        let second = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.50001, -47.29999), 20.04))
            .await
            .unwrap();

        assert!(second.from_cache);
        assert_ne!(first.analysis_id, second.analysis_id);
        assert_eq!(first.results, second.results);
        assert_eq!(analyzer.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_disabled_sections_are_absent() {
        let analyzer = analyzer();
        let request = AnalysisRequest::new(Point::new(-22.5, -47.3), 10.0).with_options(AnalysisOptions {
            include_land_use: false,
            include_attributes: false,
            include_infrastructure: false,
        });

        let report = analyzer.analyze(request).await.unwrap();
        assert!(report.results.land_use.is_none());
        assert!(report.results.biogas_potential.is_none());
        assert!(report.results.infrastructure.is_none());
        assert!(report.results.municipalities.iter().all(|m| m.attributes.is_empty()));
        assert_eq!(report.summary.total_population, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_aborts_before_cache() {
        let analyzer = analyzer();
        let err = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), 150.0))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_RADIUS");
        assert_eq!(analyzer.cache().stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_unavailable_polygons_degrade_section() {
        let analyzer = analyzer().with_unavailable_polygons("Shapefile municipios unavailable");
        let report = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0))
            .await
            .unwrap();

        assert!(report.results.municipalities.is_empty());
        assert_eq!(
            report.results.municipalities_error.as_deref(),
            Some("Shapefile municipios unavailable")
        );
        assert_eq!(report.results.land_use.unwrap().status, ZonalStatus::Ok);
        assert_eq!(report.results.biogas_potential.unwrap().total_m3_year, 0.0);
    }

    /// Delegates to an inner raster after sleeping on every window read.
    struct SlowRaster {
        inner: MemoryRaster,
        delay: Duration,
    }

    impl RasterBackend for SlowRaster {
        fn describe(&self) -> String {
            "slow memory raster".to_string()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn metadata(&self) -> Result<RasterMetadata> {
            self.inner.metadata()
        }

        fn read_window(&self, window: &PixelWindow) -> Result<RasterWindow> {
            std::thread::sleep(self.delay);
            self.inner.read_window(window)
        }
    }

    /// Fails every window read until healed.
    struct FlakyRaster {
        inner: MemoryRaster,
        failing: AtomicBool,
    }

    impl RasterBackend for FlakyRaster {
        fn describe(&self) -> String {
            "flaky memory raster".to_string()
        }

        fn is_available(&self) -> bool {
            true
        }

        fn metadata(&self) -> Result<RasterMetadata> {
            self.inner.metadata()
        }

        fn read_window(&self, window: &PixelWindow) -> Result<RasterWindow> {
            if self.failing.load(AtomicOrdering::SeqCst) {
                return Err(BiomapError::Raster {
                    reason: "strip decode failed".to_string(),
                });
            }
            self.inner.read_window(window)
        }
    }

    fn cane_raster() -> MemoryRaster {
        MemoryRaster::from_fn(
            200,
            200,
            GeoTransform::north_up(-48.0, -21.5, 0.01, -0.01),
            Some(0.0),
            |_, _| 20.0,
        )
    }

    #[tokio::test]
    async fn test_slow_raster_times_out() {
        let raster = SlowRaster {
            inner: cane_raster(),
            delay: Duration::from_millis(500),
        };
        let analyzer = analyzer()
            .with_raster(Arc::new(raster), Arc::new(LandUseTable::mapbiomas()))
            .with_settings(AnalyzerSettings {
                raster_timeout: Duration::from_millis(50),
                ..AnalyzerSettings::default()
            });
        let report = analyzer
            .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0))
            .await
            .unwrap();

        let land_use = report.results.land_use.unwrap();
        assert_eq!(land_use.status, ZonalStatus::Failed);
        assert!(land_use.error.unwrap().contains("timed out"));
        assert_eq!(report.results.municipalities.len(), 2);
        assert_eq!(report.results.biogas_potential.unwrap().total_m3_year, 1000.0);
        assert!(report.results.infrastructure.is_some());
        assert_eq!(analyzer.cache().stats().size, 0, "timed-out report is not cached");
    }

    #[tokio::test]
    async fn test_failed_land_use_is_not_cached() {
        let raster = Arc::new(FlakyRaster {
            inner: cane_raster(),
            failing: AtomicBool::new(true),
        });
        let analyzer = analyzer().with_raster(raster.clone(), Arc::new(LandUseTable::mapbiomas()));
        let request = AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0);

        let failed = analyzer.analyze(request.clone()).await.unwrap();
        assert_eq!(failed.results.land_use.unwrap().status, ZonalStatus::Failed);
        assert_eq!(analyzer.cache().stats().size, 0);

        raster.failing.store(false, AtomicOrdering::SeqCst);
        let recovered = analyzer.analyze(request.clone()).await.unwrap();
        assert!(!recovered.from_cache);
        assert_eq!(recovered.results.land_use.unwrap().status, ZonalStatus::Ok);

        let cached = analyzer.analyze(request).await.unwrap();
        assert!(cached.from_cache);
    }

    #[tokio::test]
    async fn test_missing_polygon_layer_report_is_cached() {
        let analyzer = analyzer().with_unavailable_polygons("Shapefile municipios unavailable");
        let request = AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0);

        analyzer.analyze(request.clone()).await.unwrap();
        assert!(analyzer.analyze(request).await.unwrap().from_cache);
    }
}
