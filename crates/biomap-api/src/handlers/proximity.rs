use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use biomap_analysis::AnalysisReport;
use biomap_core::error::BiomapError;
use biomap_core::models::Point;

use crate::dto::{
    AnalyzeRequest, InfrastructureTypeInfo, InfrastructureTypesResponse, PointQuery,
    RadiusRecommendationsResponse, ValidatePointResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn analyze_proximity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    tracing::info!(
        latitude = request.latitude,
        longitude = request.longitude,
        radius_km = request.radius_km,
        "Processing proximity analysis request"
    );

    let report = state
        .analyzer
        .analyze(request.to_analysis_request())
        .await
        .map_err(|e| {
            match &e {
                BiomapError::Validation { .. } => tracing::warn!(error = %e, "Analysis request rejected"),
                _ => tracing::error!(error = %e, "Proximity analysis failed"),
            }
            ApiError::from(e)
        })?;

    Ok(Json(report))
}

pub async fn validate_point(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PointQuery>,
) -> Json<ValidatePointResponse> {
    let point = Point::new(query.latitude, query.longitude);
    let validator = state.analyzer.validator();

    let warnings = match validator.validate_point(&point) {
        Ok(()) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };

    Json(ValidatePointResponse {
        valid: warnings.is_empty(),
        latitude: query.latitude,
        longitude: query.longitude,
        within_region: validator.region.contains(&point),
        warnings,
        bounds: validator.region.into(),
    })
}

pub async fn radius_recommendations(
    State(state): State<Arc<AppState>>,
) -> Json<RadiusRecommendationsResponse> {
    let validator = state.analyzer.validator();
    Json(RadiusRecommendationsResponse::new(
        validator.min_radius_km,
        validator.max_radius_km,
    ))
}

fn layer_description(layer_type: &str) -> &'static str {
    match layer_type {
        "gas_pipeline" => "Gasodutos de distribuição e transporte",
        "substation" => "Subestações de energia elétrica",
        "railway" => "Linhas ferroviárias para transporte",
        "transmission_line" => "Linhas de transmissão de energia",
        "ete" => "Estações de tratamento de esgoto",
        _ => "Camada de infraestrutura",
    }
}

pub async fn infrastructure_types(
    State(state): State<Arc<AppState>>,
) -> Json<InfrastructureTypesResponse> {
    let layers: Vec<InfrastructureTypeInfo> = state
        .analyzer
        .infrastructure()
        .summaries()
        .into_iter()
        .map(|summary| InfrastructureTypeInfo {
            description: layer_description(&summary.layer_type).to_string(),
            layer_type: summary.layer_type,
            display_name: summary.display_name,
            max_distance_km: summary.max_distance_km,
            feature_count: summary.feature_count,
            available: summary.available,
        })
        .collect();

    Json(InfrastructureTypesResponse {
        total_layers: layers.len(),
        layers,
    })
}
