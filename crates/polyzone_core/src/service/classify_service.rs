//! Point classification use-case service.
//!
//! # Responsibility
//! - Resolve each coordinate to at most one zone via the store's
//!   intersection query.
//!
//! # Invariants
//! - Output has the same length and order as the input.
//! - Every coordinate is validated before the first store query.
//! - Overlapping zones resolve to the lowest postal code.

use crate::model::coordinate::{ClassificationResult, Coordinate};
use crate::model::identity::PolygonIdentity;
use crate::repo::polygon_repo::GeometryStore;
use crate::service::error::{RegistryResult, ValidationError};
use crate::service::run_logged;
use log::debug;

/// Classification service over a geometry store.
pub struct ClassificationService<S: GeometryStore> {
    store: S,
}

impl<S: GeometryStore> ClassificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Classifies a batch of coordinates.
    ///
    /// # Errors
    /// - `Validation` for an empty batch or any out-of-range coordinate.
    /// - `Store` when a containment query fails.
    pub fn classify(&self, coordinates: &[Coordinate]) -> RegistryResult<Vec<ClassificationResult>> {
        run_logged("classify", || {
            if coordinates.is_empty() {
                return Err(ValidationError::EmptyCoordinates.into());
            }
            for (index, coordinate) in coordinates.iter().enumerate() {
                coordinate
                    .validate()
                    .map_err(|error| ValidationError::Coordinate { index, error })?;
            }

            let results = coordinates
                .iter()
                .map(|coordinate| self.resolve(coordinate))
                .collect::<RegistryResult<Vec<_>>>()?;
            debug!(
                "event=classify module=service requested={} classified={}",
                results.len(),
                results.iter().filter(|result| result.is_classified()).count()
            );
            Ok(results)
        })
    }

    /// Classifies one coordinate.
    pub fn classify_point(&self, coordinate: Coordinate) -> RegistryResult<ClassificationResult> {
        run_logged("classify_point", || {
            coordinate
                .validate()
                .map_err(|error| ValidationError::Coordinate { index: 0, error })?;
            self.resolve(&coordinate)
        })
    }

    fn resolve(&self, coordinate: &Coordinate) -> RegistryResult<ClassificationResult> {
        let matches = self.store.find_containing(coordinate.lon, coordinate.lat)?;
        Ok(matches
            .into_iter()
            .next()
            .map(labelled)
            .unwrap_or_else(ClassificationResult::unclassified))
    }
}

fn labelled(identity: PolygonIdentity) -> ClassificationResult {
    ClassificationResult {
        glosa: identity.glosa.into(),
        postal_code: identity.postal_code.into(),
    }
}
