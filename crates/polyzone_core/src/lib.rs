//! Core domain logic for the zone polygon registry.
//! This crate is the single source of truth for identity and geometry
//! invariants; adapters only translate requests and responses.

pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, RegistryConfig};
pub use ingest::geojson::{multipolygon_from_value, parse_feature_collection, GeoJsonError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::coordinate::{
    ClassificationResult, Coordinate, CoordinateError, UNCLASSIFIED_LABEL,
};
pub use model::geometry::{BoundingBox, ZoneGeometry, SRID_WGS84};
pub use model::identity::{Glosa, IdentityValidationError, PolygonIdentity, PostalCode};
pub use repo::polygon_repo::{
    GeometryStore, PolygonRecord, SqliteGeometryStore, StoreError, StoreResult,
};
pub use service::classify_service::ClassificationService;
pub use service::error::{ErrorKind, RegistryError, RegistryResult, ValidationError};
pub use service::registry_service::RegistryService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
