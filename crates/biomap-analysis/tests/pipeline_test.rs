use std::fs;
use std::path::Path;
use std::sync::Arc;

use biomap_analysis::{AnalysisCacheKey, ProximityAnalyzer};
use biomap_core::config::{FieldConfig, InfrastructureLayerConfig};
use biomap_core::models::{AnalysisRequest, LandUseTable, Point};
use biomap_geo::ProjectionService;
use biomap_raster::{open_raster_backend, ZonalStatus};
use biomap_store::{load_attribute_store, load_infrastructure, load_polygon_layer};
use tempfile::TempDir;

fn ring(west: f64, south: f64, size: f64) -> String {
    format!(
        "[[[{w},{s}],[{e},{s}],[{e},{n}],[{w},{n}],[{w},{s}]]]",
        w = west,
        s = south,
        e = west + size,
        n = south + size
    )
}

/// Five municipalities on a grid around the reference point, one far away.
fn write_fixtures(dir: &Path) {
    let cells = [
        ("3538709", "Piracicaba", -47.4, -22.6),
        ("3526902", "Limeira", -47.2, -22.6),
        ("3545803", "Santa Bárbara d'Oeste", -47.4, -22.8),
        ("3519071", "Hortolândia", -47.2, -22.8),
        ("3548500", "Santos", -46.4, -24.0),
    ];
    let features: Vec<String> = cells
        .iter()
        .map(|(code, name, west, south)| {
            format!(
                r#"{{"type": "Feature", "id": "{code}", "geometry": {{"type": "Polygon", "coordinates": {ring}}},
                    "properties": {{"CD_MUN": "{code}", "NM_MUN": "{name}"}}}}"#,
                code = code,
                name = name,
                ring = ring(*west, *south, 0.2)
            )
        })
        .collect();
    fs::write(
        dir.join("municipios.geojson"),
        format!(r#"{{"type": "FeatureCollection", "features": [{}]}}"#, features.join(",")),
    )
    .unwrap();

    fs::write(
        dir.join("biogas.csv"),
        "CD_MUN;NM_MUN;total_biogas_m3_year;urban_biogas_m3_year;agricultural_biogas_m3_year;energy_potential_mwh_year;population\n\
         3538709;Piracicaba;1.000,0;400;600;18;410000\n\
         3526902;Limeira;500;500;;9;300000\n\
         3545803;Santa Bárbara d'Oeste;250;;250;;190000\n",
    )
    .unwrap();

    fs::write(
        dir.join("Subestacoes_Energia.geojson"),
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-47.25, -22.45]}, "properties": {"nome": "SE Piracicaba"}}
        ]}"#,
    )
    .unwrap();
}

fn analyzer(dir: &Path) -> ProximityAnalyzer {
    let fields = FieldConfig::default();
    let projection = Arc::new(ProjectionService::sao_paulo().unwrap());
    let polygons = load_polygon_layer(Some(dir.join("municipios.geojson").as_path()), &fields).unwrap();
    let attributes = load_attribute_store(Some(dir.join("biogas.csv").as_path()), &polygons, &fields).unwrap();
    let layers = vec![
        InfrastructureLayerConfig {
            layer_type: "substation".to_string(),
            display_name: "Subestação Elétrica".to_string(),
            files: vec!["Subestacoes_Energia.geojson".to_string()],
            max_distance_km: 50.0,
        },
        InfrastructureLayerConfig {
            layer_type: "ete".to_string(),
            display_name: "ETE".to_string(),
            files: vec!["ETEs_2019_SP".to_string()],
            max_distance_km: 30.0,
        },
    ];
    let infrastructure = load_infrastructure(&layers, dir, &projection, &fields);
    let raster = open_raster_backend(Some(dir.join("missing_mapbiomas.tif").as_path()), 16);

    ProximityAnalyzer::new(Arc::clone(&projection))
        .with_polygons(Arc::new(polygons))
        .with_attributes(attributes)
        .with_raster(raster, Arc::new(LandUseTable::mapbiomas()))
        .with_infrastructure(Arc::new(infrastructure))
}

#[tokio::test]
async fn test_reference_scenario() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    let analyzer = analyzer(dir.path());

    let request = AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0);
    let report = analyzer.analyze(request).await.unwrap();

    // Buffer
    assert!((report.summary.total_area_km2 - 1256.6).abs() / 1256.6 < 0.02);

    // Municipalities: the four neighbours, nearest first, Santos excluded
    let municipalities = &report.results.municipalities;
    assert_eq!(municipalities.len(), 4);
    assert_eq!(municipalities[0].name, "Piracicaba");
    assert_eq!(municipalities[0].distance_km, 0.0);
    assert!(municipalities.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    assert!(municipalities.iter().all(|m| m.name != "Santos"));

    // Attributes joined from the CSV; Hortolândia has no row
    let biogas = report.results.biogas_potential.as_ref().unwrap();
    assert_eq!(biogas.total_m3_year, 1750.0);
    assert_eq!(biogas.by_category["Urbano"], 900.0);
    assert_eq!(biogas.by_category["Agrícola"], 850.0);
    assert_eq!(biogas.energy_potential_mwh_year, 27.0);
    assert_eq!(biogas.homes_powered_equivalent, 15);
    assert_eq!(report.summary.total_population, 900_000);

    // Raster absent: explicit unavailability, other sections intact
    let land_use = report.results.land_use.as_ref().unwrap();
    assert_eq!(land_use.status, ZonalStatus::Unavailable);
    assert_eq!(land_use.total_area_km2, 0.0);
    assert_eq!(land_use.dominant_class_id, None);
    assert!(land_use.per_class.is_empty());
    assert!(land_use.error.is_some());

    let infrastructure = report.results.infrastructure.as_ref().unwrap();
    assert_eq!(infrastructure.len(), 2);
    assert!(infrastructure[0].found);
    assert_eq!(infrastructure[0].name.as_deref(), Some("SE Piracicaba"));
    assert!(!infrastructure[1].found);
    assert!(infrastructure[1].error.is_some());
}

#[tokio::test]
async fn test_near_duplicate_requests_share_cache_slot() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    let analyzer = analyzer(dir.path());

    let first = AnalysisRequest::new(Point::new(-22.5, -47.3), 20.0);
    let second = AnalysisRequest::new(Point::new(-22.50001, -47.29999), 20.04);
    assert_eq!(AnalysisCacheKey::from_request(&first), AnalysisCacheKey::from_request(&second));

    let cold = analyzer.analyze(first).await.unwrap();
    let warm = analyzer.analyze(second).await.unwrap();
    assert!(!cold.from_cache);
    assert!(warm.from_cache);
    assert_eq!(warm.results.municipalities, cold.results.municipalities);
    assert_eq!(warm.request.point.lat, -22.50001);

    let stats = analyzer.cache().stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_concurrent_requests() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());
    let analyzer = Arc::new(analyzer(dir.path()));

    let handles: Vec<_> = [10.0, 15.0, 25.0, 35.0]
        .into_iter()
        .map(|radius| {
            let analyzer = Arc::clone(&analyzer);
            tokio::spawn(async move {
                analyzer
                    .analyze(AnalysisRequest::new(Point::new(-22.5, -47.3), radius))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(!report.results.municipalities.is_empty());
    }
    assert_eq!(analyzer.cache().len(), 4);
}
