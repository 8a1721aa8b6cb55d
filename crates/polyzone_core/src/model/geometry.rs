//! Zone geometry value.
//!
//! # Responsibility
//! - Hold a WGS84 MultiPolygon and answer point intersection queries.
//! - Render geometry back to GeoJSON for persistence and display.
//!
//! # Invariants
//! - Coordinates are `(lon, lat)` pairs in SRID 4326.
//! - A `ZoneGeometry` always has at least one member polygon.

use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// Spatial reference of every stored geometry (WGS84 long/lat).
pub const SRID_WGS84: i64 = 4326;

/// Axis-aligned envelope in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Combined MultiPolygon geometry of one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneGeometry {
    shape: MultiPolygon<f64>,
}

impl ZoneGeometry {
    /// Wraps member polygons. Returns `None` for an empty set.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Option<Self> {
        if polygons.is_empty() {
            return None;
        }
        Some(Self {
            shape: MultiPolygon::new(polygons),
        })
    }

    /// Builds a single-member geometry from an exterior ring of `(lon, lat)`.
    pub fn from_exterior(ring: &[(f64, f64)]) -> Option<Self> {
        let coords = ring
            .iter()
            .map(|&(lon, lat)| Coord { x: lon, y: lat })
            .collect::<Vec<_>>();
        Self::from_polygons(vec![Polygon::new(LineString::new(coords), Vec::new())])
    }

    pub fn polygon_count(&self) -> usize {
        self.shape.0.len()
    }

    /// Boundary-inclusive point test, same semantics as `ST_Intersects`.
    pub fn intersects_point(&self, lon: f64, lat: f64) -> bool {
        self.shape.intersects(&Point::new(lon, lat))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.shape.bounding_rect().map(|rect| BoundingBox {
            min_lon: rect.min().x,
            max_lon: rect.max().x,
            min_lat: rect.min().y,
            max_lat: rect.max().y,
        })
    }

    /// GeoJSON `MultiPolygon` geometry object.
    pub fn to_geojson_value(&self) -> Value {
        let coordinates = self
            .shape
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(ring_positions)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        json!({
            "type": "MultiPolygon",
            "coordinates": coordinates,
        })
    }

    pub fn to_geojson_string(&self) -> String {
        self.to_geojson_value().to_string()
    }
}

impl Serialize for ZoneGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson_value().serialize(serializer)
    }
}

fn ring_positions(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|coord| [coord.x, coord.y]).collect()
}
