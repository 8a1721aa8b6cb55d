//! Domain model for zone polygons and point classification.
//!
//! # Responsibility
//! - Define the canonical identity and geometry of a zone polygon.
//! - Define transient coordinate and classification values.
//!
//! # Invariants
//! - A zone is identified by one `PolygonIdentity`; the composite
//!   `"<glosa> - <postal_code>"` string is display-only.
//! - All persisted geometry is a WGS84 (SRID 4326) MultiPolygon.

pub mod coordinate;
pub mod geometry;
pub mod identity;
