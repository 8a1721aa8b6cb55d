//! Transient classification inputs and outputs.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Label emitted in both result fields when no zone contains a point.
pub const UNCLASSIFIED_LABEL: &str = "No clasificado";

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// Coordinate range violation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    NonFinite,
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
}

impl Display for CoordinateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite => write!(f, "coordinate values must be finite numbers"),
            Self::LatitudeOutOfRange(lat) => {
                write!(f, "latitude {lat} is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange(lon) => {
                write!(f, "longitude {lon} is outside [-180, 180]")
            }
        }
    }
}

impl Error for CoordinateError {}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(CoordinateError::LongitudeOutOfRange(self.lon));
        }
        Ok(())
    }
}

/// Outcome of classifying one coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub glosa: String,
    pub postal_code: String,
}

impl ClassificationResult {
    pub fn unclassified() -> Self {
        Self {
            glosa: UNCLASSIFIED_LABEL.to_string(),
            postal_code: UNCLASSIFIED_LABEL.to_string(),
        }
    }

    pub fn is_classified(&self) -> bool {
        self.postal_code != UNCLASSIFIED_LABEL
    }
}
