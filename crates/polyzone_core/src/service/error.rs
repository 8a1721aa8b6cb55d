//! Service error taxonomy shared by registry and classification use-cases.

use crate::ingest::geojson::GeoJsonError;
use crate::model::coordinate::CoordinateError;
use crate::model::identity::IdentityValidationError;
use crate::repo::polygon_repo::StoreError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Caller-fixable input problem. No mutation is attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Identity(IdentityValidationError),
    Coordinate {
        index: usize,
        error: CoordinateError,
    },
    EmptyCoordinates,
    /// GeoJSON carries no `properties.name` to derive an identity from.
    MissingFeatureName,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity(err) => write!(f, "{err}"),
            Self::Coordinate { index, error } => write!(f, "coordinate {index}: {error}"),
            Self::EmptyCoordinates => write!(f, "at least one coordinate is required"),
            Self::MissingFeatureName => {
                write!(f, "first GeoJSON feature has no `properties.name`")
            }
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Identity(err) => Some(err),
            Self::Coordinate { error, .. } => Some(error),
            Self::EmptyCoordinates | Self::MissingFeatureName => None,
        }
    }
}

/// Stable error kind codes exposed to adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    DuplicateIdentifier,
    #[serde(rename = "invalid_geojson")]
    InvalidGeoJson,
    StoreError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NotFound => "not_found",
            Self::DuplicateIdentifier => "duplicate_identifier",
            Self::InvalidGeoJson => "invalid_geojson",
            Self::StoreError => "store_error",
        }
    }
}

/// Discriminated failure of a registry or classification operation.
#[derive(Debug)]
pub enum RegistryError {
    Validation(ValidationError),
    /// No zone matches the given identifier.
    NotFound(String),
    /// The identifier, or one of its parts, is already taken.
    DuplicateIdentifier(String),
    InvalidGeoJson(GeoJsonError),
    /// Persistence failure; the mutation was rolled back.
    Store(StoreError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateIdentifier(_) => ErrorKind::DuplicateIdentifier,
            Self::InvalidGeoJson(_) => ErrorKind::InvalidGeoJson,
            Self::Store(_) => ErrorKind::StoreError,
        }
    }

    /// True for lock contention or busy timeouts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_retryable())
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "polygon not found: {id}"),
            Self::DuplicateIdentifier(id) => write!(f, "polygon identifier already in use: {id}"),
            Self::InvalidGeoJson(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "store failure: {err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::InvalidGeoJson(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotFound(_) | Self::DuplicateIdentifier(_) => None,
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<IdentityValidationError> for RegistryError {
    fn from(value: IdentityValidationError) -> Self {
        Self::Validation(ValidationError::Identity(value))
    }
}

impl From<GeoJsonError> for RegistryError {
    fn from(value: GeoJsonError) -> Self {
        Self::InvalidGeoJson(value)
    }
}

impl From<StoreError> for RegistryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(code) => Self::NotFound(code.to_string()),
            StoreError::Duplicate(message) => Self::DuplicateIdentifier(message),
            other => Self::Store(other),
        }
    }
}
