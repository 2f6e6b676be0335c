//! Biomap Core - Domain models, configuration, and validation
//!
//! This crate holds the data model shared by the analysis kernel, the error
//! taxonomy, the layered configuration and the collaborator ports.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod rounding;
pub mod validation;

pub use error::{BiomapError, CacheError, ProjectionError, Result};
pub use rounding::round_to;
