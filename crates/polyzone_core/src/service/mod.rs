//! Core use-case services.
//!
//! # Responsibility
//! - Enforce identity rules and preconditions before touching the store.
//! - Map store outcomes to the discriminated `RegistryError` taxonomy.
//! - Keep adapters (CLI, HTTP) decoupled from storage details.

pub mod classify_service;
pub mod error;
pub mod registry_service;

use crate::service::error::RegistryResult;
use log::{info, warn};
use std::time::Instant;

/// Runs one use-case and emits a structured outcome line.
fn run_logged<T>(
    event: &'static str,
    op: impl FnOnce() -> RegistryResult<T>,
) -> RegistryResult<T> {
    let started_at = Instant::now();
    let result = op();
    match &result {
        Ok(_) => info!(
            "event={} module=service status=ok duration_ms={}",
            event,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event={} module=service status=error duration_ms={} error_code={} error={}",
            event,
            started_at.elapsed().as_millis(),
            err.kind().as_str(),
            err
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::classify_service::ClassificationService;
    use super::error::{ErrorKind, ValidationError};
    use super::registry_service::RegistryService;
    use crate::model::coordinate::{Coordinate, CoordinateError};
    use crate::model::geometry::ZoneGeometry;
    use crate::model::identity::{Glosa, PolygonIdentity, PostalCode};
    use crate::repo::polygon_repo::{GeometryStore, PolygonRecord, StoreResult};
    use serde_json::json;

    /// Store that fails the test on any access.
    struct UntouchableStore;

    impl GeometryStore for UntouchableStore {
        fn insert(&self, _: &PolygonIdentity, _: &ZoneGeometry) -> StoreResult<()> {
            panic!("insert reached the store")
        }
        fn replace(&self, _: &PostalCode, _: &ZoneGeometry) -> StoreResult<()> {
            panic!("replace reached the store")
        }
        fn delete(&self, _: &PostalCode) -> StoreResult<()> {
            panic!("delete reached the store")
        }
        fn rename(&self, _: &PostalCode, _: &PolygonIdentity) -> StoreResult<()> {
            panic!("rename reached the store")
        }
        fn get(&self, _: &PostalCode) -> StoreResult<Option<PolygonRecord>> {
            panic!("get reached the store")
        }
        fn find_by_postal_code(&self, _: &PostalCode) -> StoreResult<Option<PolygonIdentity>> {
            panic!("find_by_postal_code reached the store")
        }
        fn find_by_glosa(&self, _: &Glosa) -> StoreResult<Option<PolygonIdentity>> {
            panic!("find_by_glosa reached the store")
        }
        fn find_containing(&self, _: f64, _: f64) -> StoreResult<Vec<PolygonIdentity>> {
            panic!("find_containing reached the store")
        }
        fn list_all(&self) -> StoreResult<Vec<PolygonIdentity>> {
            panic!("list_all reached the store")
        }
    }

    fn valid_collection() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]
                }
            }]
        })
    }

    #[test]
    fn invalid_postal_codes_fail_before_store_access() {
        let service = RegistryService::new(UntouchableStore);
        for bad in ["123", "abcdefg"] {
            let err = service
                .insert_polygon("Zona A", bad, &valid_collection())
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
            assert_eq!(
                service.replace_polygon(bad, &valid_collection()).unwrap_err().kind(),
                ErrorKind::ValidationError
            );
            assert_eq!(
                service.delete_polygon(bad).unwrap_err().kind(),
                ErrorKind::ValidationError
            );
            assert_eq!(
                service.update_postal_code("1234567", bad).unwrap_err().kind(),
                ErrorKind::ValidationError
            );
        }
    }

    #[test]
    fn invalid_names_and_geojson_fail_before_store_access() {
        let service = RegistryService::new(UntouchableStore);
        assert_eq!(
            service
                .insert_named_polygon("Zona A 1234567", &valid_collection())
                .unwrap_err()
                .kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            service
                .rename_polygon("Zona A - 1234567", "Zona B")
                .unwrap_err()
                .kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            service.update_glosa("1234567", "   ").unwrap_err().kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            service
                .insert_polygon("Zona A", "1234567", &json!({ "type": "FeatureCollection" }))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidGeoJson
        );
        assert_eq!(
            service
                .insert_from_feature_name(&valid_collection())
                .unwrap_err()
                .to_string(),
            ValidationError::MissingFeatureName.to_string()
        );
    }

    #[test]
    fn classification_input_is_validated_before_store_access() {
        let service = ClassificationService::new(UntouchableStore);
        let empty = service.classify(&[]).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::ValidationError);

        let err = service
            .classify(&[Coordinate::new(-20.0, -70.0), Coordinate::new(120.0, 0.0)])
            .unwrap_err();
        assert!(matches!(
            err,
            super::error::RegistryError::Validation(ValidationError::Coordinate {
                index: 1,
                error: CoordinateError::LatitudeOutOfRange(_),
            })
        ));
    }
}
