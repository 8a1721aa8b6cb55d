//! Zone polygon store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist named zone MultiPolygons with their bounding boxes.
//! - Answer "which zones intersect this point" queries.
//!
//! # Invariants
//! - `zone_polygons` and `zone_polygons_rtree` rows are written in the same
//!   transaction and share the same `id`.
//! - `glosa_key` (`Glosa::key`) and `postal_code` are each unique.
//! - `replace` updates geometry in place; `id` and `created_at` survive.
//! - Overlapping matches are ordered by `postal_code ASC`.
//! - Read paths reject undecodable persisted geometry instead of masking it.

use crate::db::DbError;
use crate::ingest::geojson::geometry_from_str;
use crate::model::geometry::{BoundingBox, ZoneGeometry, SRID_WGS84};
use crate::model::identity::{Glosa, PolygonIdentity, PostalCode};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Geometry store error for persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound(PostalCode),
    /// A uniqueness constraint rejected the write.
    Duplicate(String),
    InvalidData(String),
}

impl StoreError {
    /// Returns whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Db(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(code) => write!(f, "polygon not found: {code}"),
            Self::Duplicate(message) => write!(f, "duplicate polygon identifier: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted polygon data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Duplicate(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, message) = &value {
            if is_unique_violation(err.extended_code) {
                return Self::Duplicate(
                    message
                        .clone()
                        .unwrap_or_else(|| "uniqueness constraint failed".to_string()),
                );
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Full stored zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolygonRecord {
    pub identity: PolygonIdentity,
    pub geometry: ZoneGeometry,
}

/// Storage contract for zone polygons.
pub trait GeometryStore {
    /// Persists a new zone.
    fn insert(&self, identity: &PolygonIdentity, geometry: &ZoneGeometry) -> StoreResult<()>;
    /// Swaps the geometry of an existing zone, keeping its identity.
    fn replace(&self, postal_code: &PostalCode, geometry: &ZoneGeometry) -> StoreResult<()>;
    /// Removes a zone.
    fn delete(&self, postal_code: &PostalCode) -> StoreResult<()>;
    /// Rewrites identity fields; geometry is untouched.
    fn rename(&self, postal_code: &PostalCode, new_identity: &PolygonIdentity) -> StoreResult<()>;
    fn get(&self, postal_code: &PostalCode) -> StoreResult<Option<PolygonRecord>>;
    fn find_by_postal_code(&self, postal_code: &PostalCode)
        -> StoreResult<Option<PolygonIdentity>>;
    /// Case-insensitive glosa lookup.
    fn find_by_glosa(&self, glosa: &Glosa) -> StoreResult<Option<PolygonIdentity>>;
    /// Zones whose geometry intersects the point, lowest postal code first.
    fn find_containing(&self, lon: f64, lat: f64) -> StoreResult<Vec<PolygonIdentity>>;
    /// All zone identities ordered by postal code.
    fn list_all(&self) -> StoreResult<Vec<PolygonIdentity>>;
}

/// SQLite-backed geometry store.
pub struct SqliteGeometryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGeometryStore<'conn> {
    /// Wraps a migrated connection from `db::open_db*`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self) -> StoreResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl GeometryStore for SqliteGeometryStore<'_> {
    fn insert(&self, identity: &PolygonIdentity, geometry: &ZoneGeometry) -> StoreResult<()> {
        let tx = self.begin()?;
        insert_in_tx(&tx, identity, geometry)?;
        tx.commit()?;
        Ok(())
    }

    fn replace(&self, postal_code: &PostalCode, geometry: &ZoneGeometry) -> StoreResult<()> {
        let bbox = bounding_box_of(geometry)?;
        let tx = self.begin()?;
        let (id, _) = lookup_by_code(&tx, postal_code)?
            .ok_or_else(|| StoreError::NotFound(postal_code.clone()))?;

        tx.execute(
            "UPDATE zone_polygons_rtree
             SET min_lon = ?2, max_lon = ?3, min_lat = ?4, max_lat = ?5
             WHERE id = ?1;",
            params![id, bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat],
        )?;
        tx.execute(
            "UPDATE zone_polygons
             SET geometry = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, geometry.to_geojson_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, postal_code: &PostalCode) -> StoreResult<()> {
        let tx = self.begin()?;
        let (id, _) = lookup_by_code(&tx, postal_code)?
            .ok_or_else(|| StoreError::NotFound(postal_code.clone()))?;

        delete_in_tx(&tx, id)?;
        tx.commit()?;
        Ok(())
    }

    fn rename(&self, postal_code: &PostalCode, new_identity: &PolygonIdentity) -> StoreResult<()> {
        let tx = self.begin()?;
        let (id, _) = lookup_by_code(&tx, postal_code)?
            .ok_or_else(|| StoreError::NotFound(postal_code.clone()))?;

        let collision: Option<String> = tx
            .query_row(
                "SELECT glosa || ' - ' || postal_code
                 FROM zone_polygons
                 WHERE id <> ?1
                   AND (glosa_key = ?2 OR postal_code = ?3)
                 LIMIT 1;",
                params![id, new_identity.glosa.key(), new_identity.postal_code.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = collision {
            return Err(StoreError::Duplicate(format!(
                "`{new_identity}` collides with `{existing}`"
            )));
        }

        tx.execute(
            "UPDATE zone_polygons
             SET glosa = ?2,
                 glosa_key = ?3,
                 postal_code = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                new_identity.glosa.as_str(),
                new_identity.glosa.key(),
                new_identity.postal_code.as_str(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, postal_code: &PostalCode) -> StoreResult<Option<PolygonRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT glosa, postal_code, srid, geometry
             FROM zone_polygons
             WHERE postal_code = ?1;",
        )?;
        let mut rows = stmt.query([postal_code.as_str()])?;
        if let Some(row) = rows.next()? {
            let identity = parse_identity_row(row)?;
            let geometry = parse_geometry_row(row)?;
            return Ok(Some(PolygonRecord { identity, geometry }));
        }
        Ok(None)
    }

    fn find_by_postal_code(
        &self,
        postal_code: &PostalCode,
    ) -> StoreResult<Option<PolygonIdentity>> {
        Ok(lookup_by_code(self.conn, postal_code)?.map(|(_, identity)| identity))
    }

    fn find_by_glosa(&self, glosa: &Glosa) -> StoreResult<Option<PolygonIdentity>> {
        let mut stmt = self.conn.prepare(
            "SELECT glosa, postal_code
             FROM zone_polygons
             WHERE glosa_key = ?1;",
        )?;
        let mut rows = stmt.query([glosa.key()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_identity_row(row)?));
        }
        Ok(None)
    }

    fn find_containing(&self, lon: f64, lat: f64) -> StoreResult<Vec<PolygonIdentity>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.glosa, p.postal_code, p.srid, p.geometry
             FROM zone_polygons_rtree r
             INNER JOIN zone_polygons p ON p.id = r.id
             WHERE r.min_lon <= ?1 AND r.max_lon >= ?1
               AND r.min_lat <= ?2 AND r.max_lat >= ?2
             ORDER BY p.postal_code ASC;",
        )?;
        let mut rows = stmt.query(params![lon, lat])?;
        let mut candidates = 0usize;
        let mut matches = Vec::new();
        while let Some(row) = rows.next()? {
            candidates += 1;
            if parse_geometry_row(row)?.intersects_point(lon, lat) {
                matches.push(parse_identity_row(row)?);
            }
        }
        debug!(
            "event=find_containing module=repo candidates={} matches={}",
            candidates,
            matches.len()
        );
        Ok(matches)
    }

    fn list_all(&self) -> StoreResult<Vec<PolygonIdentity>> {
        let mut stmt = self.conn.prepare(
            "SELECT glosa, postal_code
             FROM zone_polygons
             ORDER BY postal_code ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut identities = Vec::new();
        while let Some(row) = rows.next()? {
            identities.push(parse_identity_row(row)?);
        }
        Ok(identities)
    }
}

fn insert_in_tx(
    tx: &Transaction<'_>,
    identity: &PolygonIdentity,
    geometry: &ZoneGeometry,
) -> StoreResult<()> {
    let bbox = bounding_box_of(geometry)?;

    tx.execute(
        "INSERT INTO zone_polygons (glosa, glosa_key, postal_code, srid, geometry)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            identity.glosa.as_str(),
            identity.glosa.key(),
            identity.postal_code.as_str(),
            SRID_WGS84,
            geometry.to_geojson_string(),
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "INSERT INTO zone_polygons_rtree (id, min_lon, max_lon, min_lat, max_lat)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![id, bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat],
    )?;
    Ok(())
}

fn bounding_box_of(geometry: &ZoneGeometry) -> StoreResult<BoundingBox> {
    geometry
        .bounding_box()
        .ok_or_else(|| StoreError::InvalidData("geometry has no bounding box".to_string()))
}

fn delete_in_tx(tx: &Transaction<'_>, id: i64) -> StoreResult<()> {
    tx.execute("DELETE FROM zone_polygons_rtree WHERE id = ?1;", [id])?;
    tx.execute("DELETE FROM zone_polygons WHERE id = ?1;", [id])?;
    Ok(())
}

fn lookup_by_code(
    conn: &Connection,
    postal_code: &PostalCode,
) -> StoreResult<Option<(i64, PolygonIdentity)>> {
    let mut stmt = conn.prepare(
        "SELECT id, glosa, postal_code
         FROM zone_polygons
         WHERE postal_code = ?1;",
    )?;
    let mut rows = stmt.query([postal_code.as_str()])?;
    if let Some(row) = rows.next()? {
        let id: i64 = row.get("id")?;
        return Ok(Some((id, parse_identity_row(row)?)));
    }
    Ok(None)
}

fn parse_identity_row(row: &Row<'_>) -> StoreResult<PolygonIdentity> {
    let glosa: String = row.get("glosa")?;
    let postal_code: String = row.get("postal_code")?;
    PolygonIdentity::parse(&glosa, &postal_code).map_err(|err| {
        StoreError::InvalidData(format!(
            "invalid identity `{glosa}` / `{postal_code}` in zone_polygons: {err}"
        ))
    })
}

fn parse_geometry_row(row: &Row<'_>) -> StoreResult<ZoneGeometry> {
    let srid: i64 = row.get("srid")?;
    if srid != SRID_WGS84 {
        return Err(StoreError::InvalidData(format!(
            "unexpected srid `{srid}` in zone_polygons.srid"
        )));
    }
    let text: String = row.get("geometry")?;
    geometry_from_str(&text).map_err(|err| {
        StoreError::InvalidData(format!("undecodable zone_polygons.geometry: {err}"))
    })
}

fn is_unique_violation(extended_code: i32) -> bool {
    extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
}
