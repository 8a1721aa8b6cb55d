//! External payload ingestion.
//!
//! # Responsibility
//! - Convert caller-supplied GeoJSON into validated `ZoneGeometry` values.
//!
//! # Invariants
//! - Geometry payloads are fully parsed before any store access.

pub mod geojson;
