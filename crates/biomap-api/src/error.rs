use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use biomap_core::error::BiomapError;
use serde::Serialize;

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
    pub details: Option<String>,
    pub suggestion: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            details: None,
            suggestion: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            code: self.code,
            details: self.details,
            suggestion: self.suggestion,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<BiomapError> for ApiError {
    fn from(err: BiomapError) -> Self {
        let code = err.code();
        match err {
            BiomapError::Validation {
                code,
                message,
                suggestion,
            } => Self::new(StatusCode::BAD_REQUEST, code, message).with_suggestion(suggestion),
            BiomapError::InvalidTile { .. } => {
                Self::new(StatusCode::BAD_REQUEST, code, err.to_string())
            }
            BiomapError::Projection(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, "Coordinate transformation failed")
                    .with_details(err.to_string())
            }
            BiomapError::ResourceUnavailable { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, code, err.to_string())
            }
            BiomapError::Timeout { .. } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, code, err.to_string())
            }
            _ => Self::internal("Internal error").with_code(code).with_details(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomap_core::error::{codes, ProjectionError};

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ApiError::from(BiomapError::validation(
            codes::INVALID_RADIUS,
            "Radius must be between 1 and 50 km",
            "Use a radius of 20 km",
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_RADIUS");
        assert_eq!(err.suggestion.as_deref(), Some("Use a radius of 20 km"));
    }

    #[test]
    fn test_status_mapping() {
        let projection = ApiError::from(BiomapError::Projection(ProjectionError::NonFinite {
            x: f64::NAN,
            y: 0.0,
        }));
        assert_eq!(projection.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(projection.code, "PROJECTION_FAILED");

        let unavailable = ApiError::from(BiomapError::unavailable("land-use raster", "missing"));
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);

        let io = ApiError::from(BiomapError::Io(std::io::Error::other("disk")));
        assert_eq!(io.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.code, "IO_ERROR");
        assert!(io.details.unwrap().contains("disk"));
    }
}
