//! Tracked objects and their reported positions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geometry::GeoPoint;

/// Identifier of a tracked object (a vessel).
///
/// Identifiers are assigned by the external tracking feed, so they are kept
/// as opaque strings rather than UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wraps an external identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single position report. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub object_id: ObjectId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed over ground in knots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Heading in degrees true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl Position {
    /// Creates a position without speed or heading.
    #[must_use]
    pub fn new(object_id: impl Into<ObjectId>, timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            object_id: object_id.into(),
            timestamp,
            latitude,
            longitude,
            speed: None,
            heading: None,
        }
    }

    /// Sets speed over ground in knots.
    #[must_use]
    pub const fn with_speed(mut self, knots: f64) -> Self {
        self.speed = Some(knots);
        self
    }

    /// Sets heading in degrees.
    #[must_use]
    pub const fn with_heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    /// The reported location as a point.
    #[must_use]
    pub const fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Checks that the coordinates are usable for geometry.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for non-finite or out-of-range coordinates.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_lat("latitude", self.latitude)?;
        validate_lon("longitude", self.longitude)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

pub(crate) fn validate_lat(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteCoordinate {
            field: field.to_string(),
            value,
        });
    }
    if !(-90.0..=90.0).contains(&value) {
        return Err(ValidationError::LatitudeOutOfRange { value });
    }
    Ok(())
}

pub(crate) fn validate_lon(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteCoordinate {
            field: field.to_string(),
            value,
        });
    }
    if !(-180.0..=180.0).contains(&value) {
        return Err(ValidationError::LongitudeOutOfRange { value });
    }
    Ok(())
}
