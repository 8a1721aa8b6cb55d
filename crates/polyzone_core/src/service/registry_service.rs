//! Zone registry use-case service.
//!
//! # Responsibility
//! - Run the insert/replace/rename/delete protocol over a `GeometryStore`.
//! - Validate every raw input before the first store call.
//!
//! # Invariants
//! - A request that fails validation or a precondition never reaches a
//!   store mutation.
//! - Glosa and postal code are each unique across all zones; a rename may
//!   not take either part from another zone.
//! - Store transactions repeat the collision checks, so a concurrent writer
//!   surfaces as `DuplicateIdentifier` instead of a torn write.

use crate::ingest::geojson::{feature_name, multipolygon_from_value};
use crate::model::identity::{Glosa, PolygonIdentity, PostalCode};
use crate::repo::polygon_repo::{GeometryStore, PolygonRecord};
use crate::service::error::{RegistryError, RegistryResult, ValidationError};
use crate::service::run_logged;
use serde_json::Value;

/// Registry service facade over geometry store implementations.
pub struct RegistryService<S: GeometryStore> {
    store: S,
}

impl<S: GeometryStore> RegistryService<S> {
    /// Creates a service using the provided store handle.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Inserts a zone from separate glosa and postal code fields.
    ///
    /// # Errors
    /// - `Validation` for a blank glosa or malformed postal code.
    /// - `InvalidGeoJson` when the FeatureCollection cannot be combined.
    /// - `DuplicateIdentifier` when either part is already taken.
    pub fn insert_polygon(
        &self,
        glosa: &str,
        postal_code: &str,
        geojson: &Value,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_insert", || {
            let identity = PolygonIdentity::parse(glosa, postal_code)?;
            self.insert_identity(identity, geojson)
        })
    }

    /// Inserts a zone named by a composite `"<glosa> - <postal_code>"`.
    pub fn insert_named_polygon(
        &self,
        name: &str,
        geojson: &Value,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_insert", || {
            let identity = PolygonIdentity::parse_composite(name)?;
            self.insert_identity(identity, geojson)
        })
    }

    /// Inserts a zone whose composite name is the first feature's
    /// `properties.name`.
    pub fn insert_from_feature_name(&self, geojson: &Value) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_insert", || {
            let name = feature_name(geojson)?.ok_or(ValidationError::MissingFeatureName)?;
            let identity = PolygonIdentity::parse_composite(&name)?;
            self.insert_identity(identity, geojson)
        })
    }

    /// Swaps the geometry of the zone keyed by `postal_code`.
    ///
    /// Returns the unchanged identity of the replaced zone.
    pub fn replace_polygon(
        &self,
        postal_code: &str,
        geojson: &Value,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_replace", || {
            let postal_code = PostalCode::parse(postal_code)?;
            let geometry = multipolygon_from_value(geojson)?;
            let current = self.require_code(&postal_code)?;
            self.store.replace(&current.postal_code, &geometry)?;
            Ok(current)
        })
    }

    /// Swaps geometry for a zone addressed by its composite name.
    ///
    /// Both name parts must match the stored zone.
    pub fn replace_named_polygon(
        &self,
        name: &str,
        geojson: &Value,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_replace", || {
            let identity = PolygonIdentity::parse_composite(name)?;
            let geometry = multipolygon_from_value(geojson)?;
            let current = self.require_identity(&identity)?;
            self.store.replace(&current.postal_code, &geometry)?;
            Ok(current)
        })
    }

    /// Deletes the zone keyed by `postal_code` and returns its identity.
    pub fn delete_polygon(&self, postal_code: &str) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_delete", || {
            let postal_code = PostalCode::parse(postal_code)?;
            let current = self.require_code(&postal_code)?;
            self.store.delete(&current.postal_code)?;
            Ok(current)
        })
    }

    /// Deletes a zone addressed by its composite name.
    pub fn delete_named_polygon(&self, name: &str) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_delete", || {
            let identity = PolygonIdentity::parse_composite(name)?;
            let current = self.require_identity(&identity)?;
            self.store.delete(&current.postal_code)?;
            Ok(current)
        })
    }

    /// Renames a zone from one composite name to another.
    ///
    /// # Contract
    /// - `old_name` must match an existing zone on both parts.
    /// - `new_name` must not exist, and neither of its parts may belong to
    ///   another zone.
    pub fn rename_polygon(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_rename", || {
            let old_identity = PolygonIdentity::parse_composite(old_name)?;
            let new_identity = PolygonIdentity::parse_composite(new_name)?;
            let current = self.require_identity(&old_identity)?;
            self.apply_rename(&current, new_identity)
        })
    }

    /// Changes the glosa of the zone keyed by `postal_code`.
    pub fn update_glosa(
        &self,
        postal_code: &str,
        new_glosa: &str,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_update_glosa", || {
            let postal_code = PostalCode::parse(postal_code)?;
            let new_glosa = Glosa::parse(new_glosa)?;
            let current = self.require_code(&postal_code)?;
            let renamed = PolygonIdentity::new(new_glosa, current.postal_code.clone());
            self.apply_rename(&current, renamed)
        })
    }

    /// Moves a zone from `old_code` to `new_code`, keeping its glosa.
    pub fn update_postal_code(
        &self,
        old_code: &str,
        new_code: &str,
    ) -> RegistryResult<PolygonIdentity> {
        run_logged("polygon_update_postal_code", || {
            let old_code = PostalCode::parse(old_code)?;
            let new_code = PostalCode::parse(new_code)?;
            let current = self.require_code(&old_code)?;
            let renamed = PolygonIdentity::new(current.glosa.clone(), new_code);
            self.apply_rename(&current, renamed)
        })
    }

    /// Lists every zone identity ordered by postal code.
    pub fn list_polygons(&self) -> RegistryResult<Vec<PolygonIdentity>> {
        run_logged("polygon_list", || Ok(self.store.list_all()?))
    }

    /// Loads one zone with its geometry.
    pub fn get_polygon(&self, postal_code: &str) -> RegistryResult<Option<PolygonRecord>> {
        run_logged("polygon_get", || {
            let postal_code = PostalCode::parse(postal_code)?;
            Ok(self.store.get(&postal_code)?)
        })
    }

    fn insert_identity(
        &self,
        identity: PolygonIdentity,
        geojson: &Value,
    ) -> RegistryResult<PolygonIdentity> {
        let geometry = multipolygon_from_value(geojson)?;
        self.ensure_parts_available(&identity, None)?;
        self.store.insert(&identity, &geometry)?;
        Ok(identity)
    }

    fn apply_rename(
        &self,
        current: &PolygonIdentity,
        renamed: PolygonIdentity,
    ) -> RegistryResult<PolygonIdentity> {
        if renamed.matches(current) {
            return Err(RegistryError::DuplicateIdentifier(format!(
                "`{renamed}` is already the identifier of this polygon"
            )));
        }
        self.ensure_parts_available(&renamed, Some(&current.postal_code))?;
        self.store.rename(&current.postal_code, &renamed)?;
        Ok(renamed)
    }

    /// Rejects identities whose glosa or postal code belongs to a zone other
    /// than `owner`.
    fn ensure_parts_available(
        &self,
        identity: &PolygonIdentity,
        owner: Option<&PostalCode>,
    ) -> RegistryResult<()> {
        let foreign = |existing: &PolygonIdentity| Some(&existing.postal_code) != owner;

        if let Some(existing) = self.store.find_by_postal_code(&identity.postal_code)? {
            if foreign(&existing) {
                return Err(RegistryError::DuplicateIdentifier(format!(
                    "postal code `{}` is used by `{existing}`",
                    identity.postal_code
                )));
            }
        }
        if let Some(existing) = self.store.find_by_glosa(&identity.glosa)? {
            if foreign(&existing) {
                return Err(RegistryError::DuplicateIdentifier(format!(
                    "glosa `{}` is used by `{existing}`",
                    identity.glosa
                )));
            }
        }
        Ok(())
    }

    fn require_code(&self, postal_code: &PostalCode) -> RegistryResult<PolygonIdentity> {
        self.store
            .find_by_postal_code(postal_code)?
            .ok_or_else(|| RegistryError::NotFound(postal_code.to_string()))
    }

    fn require_identity(&self, identity: &PolygonIdentity) -> RegistryResult<PolygonIdentity> {
        self.store
            .find_by_postal_code(&identity.postal_code)?
            .filter(|current| current.matches(identity))
            .ok_or_else(|| RegistryError::NotFound(identity.to_string()))
    }
}
