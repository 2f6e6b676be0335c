use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use biomap_raster::TileCoordinate;

use crate::dto::{BoundsResponse, ClassesResponse, RasterMetadataResponse};
use crate::error::ApiError;
use crate::state::AppState;

const TILE_CACHE_CONTROL: &str = "public, max-age=86400";

fn parse_tile_path(z: &str, x: &str, y: &str) -> Result<(u8, u32, u32), ApiError> {
    let invalid = || {
        ApiError::bad_request(format!("Invalid tile path {}/{}/{}", z, x, y))
            .with_code("INVALID_TILE")
            .with_suggestion("Use /tiles/{z}/{x}/{y}.png with non-negative integers")
    };
    let y = y.strip_suffix(".png").ok_or_else(invalid)?;

    let z = z.parse().map_err(|_| invalid())?;
    let x = x.parse().map_err(|_| invalid())?;
    let y = y.parse().map_err(|_| invalid())?;
    Ok((z, x, y))
}

fn png_response(png: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, TILE_CACHE_CONTROL),
        ],
        png,
    )
        .into_response()
}

pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let (z, x, y) = parse_tile_path(&z, &x, &y)?;
    let coordinate: TileCoordinate = state.renderer.validate(z, x, y)?;

    if let Some(png) = state.tile_cache.get(&coordinate) {
        tracing::debug!(tile = %coordinate, "Tile served from cache");
        return Ok(png_response(png));
    }

    let renderer = Arc::clone(&state.renderer);
    let rendered = tokio::task::spawn_blocking(move || {
        renderer.render_png(coordinate.z, coordinate.x, coordinate.y)
    })
    .await
    .map_err(|e| ApiError::internal("Tile rendering task failed").with_details(e.to_string()))??;

    let png = Bytes::from(rendered.tile);
    if rendered.degraded {
        tracing::debug!(tile = %coordinate, "Degraded tile not cached");
    } else {
        state.tile_cache.insert(coordinate, png.clone());
    }
    Ok(png_response(png))
}

pub async fn get_metadata(State(state): State<Arc<AppState>>) -> Json<RasterMetadataResponse> {
    let (min_zoom, max_zoom) = state.renderer.zoom_range();
    let mut response = RasterMetadataResponse {
        name: state.land_use.name.clone(),
        year: state.land_use.year,
        available: false,
        source: state.raster.describe(),
        bounds: state.land_use.default_bounds,
        crs: None,
        width: None,
        height: None,
        pixel_size: None,
        file_size_mb: state
            .raster
            .file_size_bytes()
            .map(|bytes| (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0),
        tile_size: state.renderer.tile_size(),
        zoom_range: [min_zoom, max_zoom],
        classes: state.classes.legend().cloned().collect(),
        error: None,
    };

    match state.raster.metadata() {
        Ok(meta) => {
            let (pixel_width, pixel_height) = meta.pixel_size();
            response.available = true;
            response.bounds = meta.bounds();
            response.crs = Some(format!("EPSG:{}", meta.epsg.unwrap_or(4326)));
            response.width = Some(meta.width);
            response.height = Some(meta.height);
            response.pixel_size = Some([pixel_width, pixel_height]);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Raster metadata unavailable");
            response.error = Some(e.to_string());
        }
    }

    Json(response)
}

pub async fn get_bounds(State(state): State<Arc<AppState>>) -> Json<BoundsResponse> {
    let (bounds, source) = match state.raster.metadata() {
        Ok(meta) => (meta.bounds(), "raster"),
        Err(_) => (state.land_use.default_bounds, "default"),
    };

    Json(BoundsResponse {
        west: bounds.west,
        south: bounds.south,
        east: bounds.east,
        north: bounds.north,
        crs: "EPSG:4326".to_string(),
        source: source.to_string(),
    })
}

pub async fn get_classes(State(state): State<Arc<AppState>>) -> Json<ClassesResponse> {
    let classes: Vec<_> = state.classes.legend().cloned().collect();
    Json(ClassesResponse {
        year: state.land_use.year,
        total_classes: classes.len(),
        classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_parse_tile_path() {
        assert_eq!(parse_tile_path("10", "380", "578.png").unwrap(), (10, 380, 578));

        let missing_suffix = parse_tile_path("10", "380", "578").unwrap_err();
        assert_eq!(missing_suffix.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing_suffix.code, "INVALID_TILE");

        assert!(parse_tile_path("300", "1", "1.png").is_err());
        assert!(parse_tile_path("10", "-1", "1.png").is_err());
    }
}
