//! Fence definitions.
//!
//! Two representations exist:
//! - [`FenceRecord`]: the loosely-typed shape a fence store hands back, with
//!   a string `fence_type` and optional geometry fields.
//! - [`Fence`]: the validated form the engine evaluates, with the shape as a
//!   tagged union.
//!
//! Conversion from record to fence happens once per cycle at load time, so a
//! malformed record is rejected on its own instead of corrupting geometry.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geometry::{self, GeoPoint};
use crate::position::{validate_lat, validate_lon, ObjectId};

/// Identifier of a fence, assigned by the fence store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FenceId(String);

impl FenceId {
    /// Wraps a store-assigned identifier.
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

impl fmt::Display for FenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FenceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A circular region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: GeoPoint,
    pub radius_nm: f64,
}

impl Circle {
    #[must_use]
    pub const fn new(center_lat: f64, center_lon: f64, radius_nm: f64) -> Self {
        Self {
            center: GeoPoint::new(center_lat, center_lon),
            radius_nm,
        }
    }

    #[must_use]
    pub fn contains(&self, p: GeoPoint) -> bool {
        geometry::is_point_in_circle(p.lat, p.lon, self.center.lat, self.center.lon, self.radius_nm)
    }
}

/// Fence geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FenceShape {
    /// Center and radius.
    Circle(Circle),

    /// Ordered vertices. Ordering matters for the edge-crossing test, winding
    /// direction does not.
    ///
    /// `fallback` is the circle stored alongside the polygon, if any. It is
    /// used when the polygon has fewer than 3 vertices; without it such a
    /// polygon contains nothing.
    Polygon {
        vertices: Vec<GeoPoint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Circle>,
    },
}

impl FenceShape {
    /// Returns true if this is a polygon with enough vertices to ray-cast.
    #[must_use]
    pub fn is_usable_polygon(&self) -> bool {
        matches!(self, Self::Polygon { vertices, .. } if vertices.len() >= 3)
    }
}

/// A validated geographic fence with alert preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fence {
    pub id: FenceId,
    pub name: String,
    pub shape: FenceShape,
    pub watched_object_ids: BTreeSet<ObjectId>,
    pub alert_on_entry: bool,
    pub alert_on_exit: bool,
    pub alert_on_dwell: bool,
    pub dwell_threshold_hours: Option<f64>,
    pub active: bool,
}

impl Fence {
    /// Creates an active fence alerting on entry and exit, watching nothing.
    #[must_use]
    pub fn new(id: impl Into<FenceId>, shape: FenceShape) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            shape,
            watched_object_ids: BTreeSet::new(),
            alert_on_entry: true,
            alert_on_exit: true,
            alert_on_dwell: false,
            dwell_threshold_hours: None,
            active: true,
        }
    }

    /// Shorthand for a circular fence.
    #[must_use]
    pub fn circle(id: impl Into<FenceId>, center_lat: f64, center_lon: f64, radius_nm: f64) -> Self {
        Self::new(id, FenceShape::Circle(Circle::new(center_lat, center_lon, radius_nm)))
    }

    /// Shorthand for a polygon fence with no fallback circle.
    #[must_use]
    pub fn polygon(id: impl Into<FenceId>, vertices: Vec<GeoPoint>) -> Self {
        Self::new(
            id,
            FenceShape::Polygon {
                vertices,
                fallback: None,
            },
        )
    }

    #[must_use]
    pub fn watching<I, O>(mut self, objects: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<ObjectId>,
    {
        self.watched_object_ids.extend(objects.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_alerts(mut self, on_entry: bool, on_exit: bool) -> Self {
        self.alert_on_entry = on_entry;
        self.alert_on_exit = on_exit;
        self
    }

    /// Enables dwell alerts after `threshold_hours` of continuous containment.
    #[must_use]
    pub const fn with_dwell(mut self, threshold_hours: f64) -> Self {
        self.alert_on_dwell = true;
        self.dwell_threshold_hours = Some(threshold_hours);
        self
    }

    /// The dwell threshold, if dwell alerts are enabled and configured.
    #[must_use]
    pub fn dwell_threshold(&self) -> Option<f64> {
        if self.alert_on_dwell {
            self.dwell_threshold_hours
        } else {
            None
        }
    }

    /// Point used for distance and ETA projections toward this fence.
    ///
    /// Circle center for circles; vertex centroid for usable polygons; the
    /// fallback circle's center (or whatever vertices exist) otherwise.
    #[must_use]
    pub fn reference_point(&self) -> Option<GeoPoint> {
        match &self.shape {
            FenceShape::Circle(c) => Some(c.center),
            FenceShape::Polygon { vertices, .. } if vertices.len() >= 3 => geometry::vertex_centroid(vertices),
            FenceShape::Polygon { vertices, fallback } => fallback
                .map(|c| c.center)
                .or_else(|| geometry::vertex_centroid(vertices)),
        }
    }
}

/// Fence as persisted by an external fence store.
///
/// Field names follow the store's camelCase JSON. `fence_type` is one of
/// `circle`, `port_area` (a circular port zone) or `polygon`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FenceRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub fence_type: String,
    #[serde(default)]
    pub center_lat: Option<f64>,
    #[serde(default)]
    pub center_lon: Option<f64>,
    #[serde(default)]
    pub radius_nm: Option<f64>,
    #[serde(default)]
    pub polygon_coords: Option<Vec<GeoPoint>>,
    #[serde(default, alias = "watchedObjectIds")]
    pub vessel_ids: Vec<ObjectId>,
    #[serde(default = "default_true")]
    pub alert_on_entry: bool,
    #[serde(default = "default_true")]
    pub alert_on_exit: bool,
    #[serde(default)]
    pub alert_on_dwell: bool,
    #[serde(default, alias = "dwellThresholdHours")]
    pub dwell_threshold_hrs: Option<f64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

impl FenceRecord {
    /// Parses one record from untyped JSON.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MalformedRecord` when the value does not have
    /// the record's shape, e.g. a coordinate given as a string.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::MalformedRecord {
            reason: e.to_string(),
        })
    }

    /// Validates the record into a typed [`Fence`].
    ///
    /// A polygon with fewer than 3 vertices is NOT an error; it falls back to
    /// its circle fields if present.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for missing ids, unknown fence types,
    /// non-finite or out-of-range coordinates, negative radii, missing circle
    /// geometry on a circular fence, or a non-positive dwell threshold.
    pub fn into_fence(self) -> Result<Fence, ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "id".to_string(),
            });
        }

        let shape = match self.fence_type.trim().to_ascii_lowercase().as_str() {
            "circle" | "port_area" => FenceShape::Circle(self.required_circle()?),
            "polygon" => {
                let vertices = self.polygon_coords.clone().unwrap_or_default();
                for v in &vertices {
                    validate_lat("polygonCoords.lat", v.lat)?;
                    validate_lon("polygonCoords.lon", v.lon)?;
                }
                FenceShape::Polygon {
                    vertices,
                    fallback: self.optional_circle()?,
                }
            }
            other => {
                return Err(ValidationError::UnknownFenceType {
                    fence_type: other.to_string(),
                })
            }
        };

        if let Some(hours) = self.dwell_threshold_hrs {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(ValidationError::InvalidDwellThreshold { value: hours });
            }
        }

        Ok(Fence {
            name: if self.name.is_empty() { self.id.clone() } else { self.name },
            id: FenceId::new(self.id),
            shape,
            watched_object_ids: self.vessel_ids.into_iter().collect(),
            alert_on_entry: self.alert_on_entry,
            alert_on_exit: self.alert_on_exit,
            alert_on_dwell: self.alert_on_dwell,
            dwell_threshold_hours: self.dwell_threshold_hrs,
            active: self.active,
        })
    }

    fn required_circle(&self) -> Result<Circle, ValidationError> {
        self.optional_circle()?.ok_or_else(|| {
            let field = if self.center_lat.is_none() {
                "centerLat"
            } else if self.center_lon.is_none() {
                "centerLon"
            } else {
                "radiusNm"
            };
            ValidationError::MissingField {
                field: field.to_string(),
            }
        })
    }

    fn optional_circle(&self) -> Result<Option<Circle>, ValidationError> {
        let (Some(lat), Some(lon), Some(radius)) = (self.center_lat, self.center_lon, self.radius_nm) else {
            return Ok(None);
        };
        validate_lat("centerLat", lat)?;
        validate_lon("centerLon", lon)?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ValidationError::InvalidRadius { value: radius });
        }
        Ok(Some(Circle::new(lat, lon, radius)))
    }
}

impl From<&Fence> for FenceRecord {
    fn from(fence: &Fence) -> Self {
        let (fence_type, circle, polygon_coords) = match &fence.shape {
            FenceShape::Circle(c) => ("circle", Some(*c), None),
            FenceShape::Polygon { vertices, fallback } => ("polygon", *fallback, Some(vertices.clone())),
        };
        Self {
            id: fence.id.to_string(),
            name: fence.name.clone(),
            fence_type: fence_type.to_string(),
            center_lat: circle.map(|c| c.center.lat),
            center_lon: circle.map(|c| c.center.lon),
            radius_nm: circle.map(|c| c.radius_nm),
            polygon_coords,
            vessel_ids: fence.watched_object_ids.iter().cloned().collect(),
            alert_on_entry: fence.alert_on_entry,
            alert_on_exit: fence.alert_on_exit,
            alert_on_dwell: fence.alert_on_dwell,
            dwell_threshold_hrs: fence.dwell_threshold_hours,
            active: fence.active,
        }
    }
}

impl TryFrom<FenceRecord> for Fence {
    type Error = ValidationError;

    fn try_from(record: FenceRecord) -> Result<Self, Self::Error> {
        record.into_fence()
    }
}
