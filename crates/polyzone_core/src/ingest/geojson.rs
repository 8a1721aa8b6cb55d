//! GeoJSON FeatureCollection parsing.
//!
//! # Responsibility
//! - Extract every feature's Polygon/MultiPolygon coordinates and combine
//!   them, in input order, into one `ZoneGeometry`.
//! - Decode stored MultiPolygon geometry objects.
//!
//! # Invariants
//! - Rings need at least four positions; positions need two finite numbers.
//! - Topology (self-intersection, winding, overlap) is never checked.

use crate::model::geometry::ZoneGeometry;
use geo::{Coord, LineString, Polygon};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_RING_POSITIONS: usize = 4;

/// GeoJSON payload failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoJsonError {
    /// Payload text is not JSON.
    MalformedJson(String),
    /// Top-level object is not a `FeatureCollection`.
    NotFeatureCollection,
    /// `features` is missing or empty.
    NoFeatures,
    /// Feature at index has no geometry object.
    MissingGeometry { feature: usize },
    /// Geometry type other than Polygon/MultiPolygon.
    UnsupportedGeometry { feature: usize, kind: String },
    /// Coordinates do not have the expected nesting or values.
    InvalidCoordinates { feature: usize, message: String },
}

impl Display for GeoJsonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson(message) => write!(f, "malformed GeoJSON: {message}"),
            Self::NotFeatureCollection => write!(f, "GeoJSON must be a FeatureCollection"),
            Self::NoFeatures => write!(f, "GeoJSON FeatureCollection has no features"),
            Self::MissingGeometry { feature } => {
                write!(f, "feature {feature} has no geometry")
            }
            Self::UnsupportedGeometry { feature, kind } => write!(
                f,
                "feature {feature} has unsupported geometry type `{kind}`; expected Polygon or MultiPolygon"
            ),
            Self::InvalidCoordinates { feature, message } => {
                write!(f, "feature {feature} has invalid coordinates: {message}")
            }
        }
    }
}

impl Error for GeoJsonError {}

pub type GeoJsonResult<T> = Result<T, GeoJsonError>;

/// Parses FeatureCollection text into one combined geometry.
pub fn parse_feature_collection(text: &str) -> GeoJsonResult<ZoneGeometry> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| GeoJsonError::MalformedJson(err.to_string()))?;
    multipolygon_from_value(&value)
}

/// Combines the polygons of a FeatureCollection value.
///
/// A JSON string holding the collection is decoded first, since some
/// clients send the payload double-encoded.
pub fn multipolygon_from_value(value: &Value) -> GeoJsonResult<ZoneGeometry> {
    if let Value::String(text) = value {
        return parse_feature_collection(text);
    }

    let features = feature_list(value)?;
    let mut polygons = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .filter(|geometry| geometry.is_object())
            .ok_or(GeoJsonError::MissingGeometry { feature: index })?;
        polygons.extend(geometry_polygons(geometry, index)?);
    }

    ZoneGeometry::from_polygons(polygons).ok_or(GeoJsonError::NoFeatures)
}

/// Decodes a bare `Polygon`/`MultiPolygon` geometry object.
pub fn geometry_from_value(value: &Value) -> GeoJsonResult<ZoneGeometry> {
    let polygons = geometry_polygons(value, 0)?;
    ZoneGeometry::from_polygons(polygons).ok_or_else(|| GeoJsonError::InvalidCoordinates {
        feature: 0,
        message: "geometry has no polygons".to_string(),
    })
}

/// Decodes a stored geometry text column.
pub fn geometry_from_str(text: &str) -> GeoJsonResult<ZoneGeometry> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| GeoJsonError::MalformedJson(err.to_string()))?;
    geometry_from_value(&value)
}

/// Returns `properties.name` of the first feature, if present.
pub fn feature_name(value: &Value) -> GeoJsonResult<Option<String>> {
    if let Value::String(text) = value {
        let decoded: Value = serde_json::from_str(text)
            .map_err(|err| GeoJsonError::MalformedJson(err.to_string()))?;
        return feature_name(&decoded);
    }

    let features = feature_list(value)?;
    Ok(features
        .first()
        .and_then(|feature| feature.pointer("/properties/name"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

fn feature_list(value: &Value) -> GeoJsonResult<&Vec<Value>> {
    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(GeoJsonError::NotFeatureCollection);
    }
    match value.get("features").and_then(Value::as_array) {
        Some(features) if !features.is_empty() => Ok(features),
        _ => Err(GeoJsonError::NoFeatures),
    }
}

fn geometry_polygons(geometry: &Value, feature: usize) -> GeoJsonResult<Vec<Polygon<f64>>> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| invalid(feature, "missing `coordinates`"))?;

    match kind {
        "Polygon" => Ok(vec![parse_polygon(coordinates, feature)?]),
        "MultiPolygon" => as_array(coordinates, feature, "multipolygon")?
            .iter()
            .map(|polygon| parse_polygon(polygon, feature))
            .collect(),
        other => Err(GeoJsonError::UnsupportedGeometry {
            feature,
            kind: other.to_string(),
        }),
    }
}

fn parse_polygon(value: &Value, feature: usize) -> GeoJsonResult<Polygon<f64>> {
    let rings = as_array(value, feature, "polygon")?;
    let mut rings = rings.iter().map(|ring| parse_ring(ring, feature));
    let exterior = rings
        .next()
        .ok_or_else(|| invalid(feature, "polygon has no rings"))??;
    let interiors = rings.collect::<GeoJsonResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value, feature: usize) -> GeoJsonResult<LineString<f64>> {
    let positions = as_array(value, feature, "ring")?;
    if positions.len() < MIN_RING_POSITIONS {
        return Err(invalid(
            feature,
            &format!(
                "ring has {} positions; at least {MIN_RING_POSITIONS} required",
                positions.len()
            ),
        ));
    }
    let coords = positions
        .iter()
        .map(|position| parse_position(position, feature))
        .collect::<GeoJsonResult<Vec<_>>>()?;
    Ok(LineString::new(coords))
}

fn parse_position(value: &Value, feature: usize) -> GeoJsonResult<Coord<f64>> {
    let numbers = as_array(value, feature, "position")?;
    let lon = numbers.first().and_then(Value::as_f64);
    let lat = numbers.get(1).and_then(Value::as_f64);
    match (lon, lat) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
        _ => Err(invalid(feature, "position needs two finite numbers")),
    }
}

fn as_array<'a>(value: &'a Value, feature: usize, what: &str) -> GeoJsonResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| invalid(feature, &format!("{what} must be an array")))
}

fn invalid(feature: usize, message: &str) -> GeoJsonError {
    GeoJsonError::InvalidCoordinates {
        feature,
        message: message.to_string(),
    }
}
