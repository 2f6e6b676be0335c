//! Error types for Biomap

use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable codes attached to validation failures.
pub mod codes {
    pub const INVALID_COORDINATES: &str = "INVALID_COORDINATES";
    pub const INVALID_RADIUS: &str = "INVALID_RADIUS";
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Failed to build transformation {from} -> {to}: {reason}")]
    Setup {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Coordinate ({x}, {y}) is not finite")]
    NonFinite { x: f64, y: f64 },

    #[error("Reprojection of ({x}, {y}) failed: {reason}")]
    Transform { x: f64, y: f64, reason: String },

    #[error("Projection lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum BiomapError {
    // Request errors
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
        suggestion: String,
    },

    #[error("Invalid tile {z}/{x}/{y}: {reason}")]
    InvalidTile { z: u8, x: u32, y: u32, reason: String },

    // Resource errors
    #[error("{resource} unavailable: {reason}")]
    ResourceUnavailable { resource: String, reason: String },

    #[error("Raster read failed: {reason}")]
    Raster { reason: String },

    #[error("Invalid {format} data in {path}: {message}")]
    Format {
        format: String,
        path: PathBuf,
        message: String,
    },

    // Computation errors
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Operation timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Background task {operation} failed: {reason}")]
    Task { operation: String, reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BiomapError {
    pub fn validation(
        code: &'static str,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn unavailable(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Stable code reported to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => code,
            Self::InvalidTile { .. } => "INVALID_TILE",
            Self::ResourceUnavailable { .. } => "RESOURCE_UNAVAILABLE",
            Self::Raster { .. } => "RASTER_ERROR",
            Self::Format { .. } => "FORMAT_ERROR",
            Self::Projection(_) => "PROJECTION_FAILED",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Task { .. } => "TASK_FAILED",
            Self::ConfigMissing { .. } | Self::ConfigInvalid { .. } => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

impl From<serde_json::Error> for BiomapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BiomapError>;
