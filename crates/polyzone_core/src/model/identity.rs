//! Zone identity values and their format rules.
//!
//! # Responsibility
//! - Validate glosa and postal code inputs at construction time.
//! - Decompose composite `"<glosa> - <postal_code>"` names at the ingestion
//!   boundary only.
//!
//! # Invariants
//! - `Glosa` is non-empty after trimming and stored trimmed.
//! - `PostalCode` is exactly seven ASCII digits.
//! - Glosa equality for uniqueness purposes ignores case.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Separator between glosa and postal code in composite names.
pub const COMPOSITE_SEPARATOR: &str = " - ";

static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{7}$").expect("valid postal code regex"));
static COMPOSITE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[\w ]+ - [0-9]{7}$").expect("valid composite name regex"));

/// Identity format violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    /// Glosa is empty or whitespace only.
    EmptyGlosa,
    /// Postal code is not exactly seven ASCII digits.
    InvalidPostalCode(String),
    /// Composite name does not match `<name> - <7 digits>`.
    InvalidCompositeName(String),
}

impl Display for IdentityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyGlosa => write!(f, "glosa cannot be empty"),
            Self::InvalidPostalCode(value) => {
                write!(f, "postal code `{value}` must be exactly 7 digits")
            }
            Self::InvalidCompositeName(value) => write!(
                f,
                "polygon name `{value}` must match `<name> - <7 digit postal code>`"
            ),
        }
    }
}

impl Error for IdentityValidationError {}

/// Human-readable zone label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Glosa(String);

impl Glosa {
    /// Validates and trims a glosa.
    pub fn parse(value: &str) -> Result<Self, IdentityValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentityValidationError::EmptyGlosa);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unicode lowercase fold. Two glosas with the same key are the same
    /// name for uniqueness purposes.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Case-insensitive comparison used for uniqueness checks.
    pub fn matches(&self, other: &Glosa) -> bool {
        self.key() == other.key()
    }
}

impl Display for Glosa {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Glosa {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Glosa> for String {
    fn from(value: Glosa) -> Self {
        value.0
    }
}

/// Seven digit postal code. Stable key of a zone record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Validates a postal code. Surrounding whitespace is not tolerated.
    pub fn parse(value: &str) -> Result<Self, IdentityValidationError> {
        if !POSTAL_CODE_RE.is_match(value) {
            return Err(IdentityValidationError::InvalidPostalCode(
                value.to_string(),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PostalCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}

/// Canonical identity of a zone polygon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolygonIdentity {
    pub glosa: Glosa,
    pub postal_code: PostalCode,
}

impl PolygonIdentity {
    pub fn new(glosa: Glosa, postal_code: PostalCode) -> Self {
        Self { glosa, postal_code }
    }

    /// Validates raw glosa and postal code fields.
    pub fn parse(glosa: &str, postal_code: &str) -> Result<Self, IdentityValidationError> {
        Ok(Self::new(Glosa::parse(glosa)?, PostalCode::parse(postal_code)?))
    }

    /// Decomposes a composite `"<glosa> - <postal_code>"` name.
    ///
    /// The split happens on the last separator occurrence.
    pub fn parse_composite(value: &str) -> Result<Self, IdentityValidationError> {
        let invalid = || IdentityValidationError::InvalidCompositeName(value.to_string());
        if !COMPOSITE_NAME_RE.is_match(value) {
            return Err(invalid());
        }
        let (name_part, code_part) = value.rsplit_once(COMPOSITE_SEPARATOR).ok_or_else(invalid)?;
        let glosa = Glosa::parse(name_part).map_err(|_| invalid())?;
        let postal_code = PostalCode::parse(code_part).map_err(|_| invalid())?;
        Ok(Self::new(glosa, postal_code))
    }

    /// Returns whether both components match, glosa case-insensitively.
    pub fn matches(&self, other: &PolygonIdentity) -> bool {
        self.postal_code == other.postal_code && self.glosa.matches(&other.glosa)
    }
}

impl Display for PolygonIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{COMPOSITE_SEPARATOR}{}", self.glosa, self.postal_code)
    }
}

#[cfg(test)]
mod tests {
    use super::{Glosa, IdentityValidationError, PolygonIdentity, PostalCode};

    #[test]
    fn postal_code_requires_seven_ascii_digits() {
        assert!(PostalCode::parse("1234567").is_ok());
        for bad in ["123", "abcdefg", "12345678", " 1234567", "١٢٣٤٥٦٧", ""] {
            assert_eq!(
                PostalCode::parse(bad),
                Err(IdentityValidationError::InvalidPostalCode(bad.to_string()))
            );
        }
    }

    #[test]
    fn glosa_is_trimmed_and_rejects_blank() {
        assert_eq!(Glosa::parse("  Zona A ").unwrap().as_str(), "Zona A");
        assert_eq!(Glosa::parse(" \t"), Err(IdentityValidationError::EmptyGlosa));
    }

    #[test]
    fn composite_name_splits_on_last_separator() {
        let identity = PolygonIdentity::parse_composite("Iquique Zona 1 - 1234567").unwrap();
        assert_eq!(identity.glosa.as_str(), "Iquique Zona 1");
        assert_eq!(identity.postal_code.as_str(), "1234567");
        assert_eq!(identity.to_string(), "Iquique Zona 1 - 1234567");
    }

    #[test]
    fn composite_name_accepts_diacritics() {
        let identity = PolygonIdentity::parse_composite("Población Ñuñoa - 7750000").unwrap();
        assert_eq!(identity.glosa.as_str(), "Población Ñuñoa");
    }

    #[test]
    fn composite_name_rejects_malformed_values() {
        for bad in ["Zona A", "Zona A - 123", "Zona A-1234567", " - 1234567", "Zona/A - 1234567"] {
            assert!(
                matches!(
                    PolygonIdentity::parse_composite(bad),
                    Err(IdentityValidationError::InvalidCompositeName(_))
                ),
                "`{bad}` should be rejected"
            );
        }
    }

    #[test]
    fn identity_match_ignores_glosa_case() {
        let left = PolygonIdentity::parse("Zona A", "1234567").unwrap();
        let right = PolygonIdentity::parse("ZONA a", "1234567").unwrap();
        let other_code = PolygonIdentity::parse("Zona A", "7654321").unwrap();
        assert!(left.matches(&right));
        assert!(!left.matches(&other_code));
    }

    #[test]
    fn glosa_key_folds_non_ascii_letters() {
        let lower = Glosa::parse("Población Ñuñoa").unwrap();
        let upper = Glosa::parse("POBLACIÓN ÑUÑOA").unwrap();
        assert_eq!(lower.key(), "población ñuñoa");
        assert_eq!(lower.key(), upper.key());
        assert!(lower.matches(&upper));
    }

    #[test]
    fn serde_rejects_invalid_postal_code() {
        let parsed: Result<PostalCode, _> = serde_json::from_str("\"12a4567\"");
        assert!(parsed.is_err());
    }
}
