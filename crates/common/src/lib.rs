//! Snowball Common Library
//!
//! Shared code for the snowballing runner including:
//! - Paper identifiers, directions and provenance
//! - Scholarly metadata client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod scholar;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{Direction, PaperId, Provenance};
pub use scholar::MetadataClient;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
