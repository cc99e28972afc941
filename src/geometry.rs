//! Geometry kernel: pure, stateless spherical and planar helpers.
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_NM`]. Polygon containment treats latitude/longitude as a
//! flat Cartesian plane, which is adequate for fences spanning a few hundred
//! nautical miles.
//!
//! # Known limitations
//!
//! - Haversine loses sub-nm precision close to antipodal points.
//! - Polygons crossing the ±180° meridian are not unwrapped; a fence drawn
//!   across the antimeridian is evaluated as the (very wide) polygon its raw
//!   longitudes describe.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a point from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point in nautical miles.
    #[must_use]
    pub fn distance_nm(&self, other: &Self) -> f64 {
        haversine_distance_nm(self.lat, self.lon, other.lat, other.lon)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points, in nautical miles.
#[must_use]
pub fn haversine_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

/// Rounding allowance on the circle boundary, in nautical miles (~2 µm).
pub const BOUNDARY_TOLERANCE_NM: f64 = 1e-9;

/// Returns true if the point lies within `radius_nm` of the circle center.
///
/// The boundary is inclusive: a point at exactly `radius_nm` is inside. This
/// keeps a vessel sitting on the edge from flapping between entry and exit.
/// A point constructed at the radius may compute a few ulps beyond it, so
/// distances within [`BOUNDARY_TOLERANCE_NM`] of the radius count as on it.
#[must_use]
pub fn is_point_in_circle(p_lat: f64, p_lon: f64, c_lat: f64, c_lon: f64, radius_nm: f64) -> bool {
    haversine_distance_nm(p_lat, p_lon, c_lat, c_lon) <= radius_nm + BOUNDARY_TOLERANCE_NM
}

/// Ray-casting point-in-polygon test.
///
/// A ray is cast from the point in the +longitude direction; an odd number of
/// edge crossings means inside. The last vertex is implicitly joined to the
/// first, so callers need not close the ring. Fewer than 3 vertices never
/// contain anything.
///
/// The boundary is inclusive, as for circles: a point equal to a vertex, or
/// lying exactly on an edge, is inside. Edge membership uses an exact
/// collinearity test, so a point only approximately on a slanted edge is
/// classified by the ray cast.
#[must_use]
pub fn is_point_in_polygon(p_lat: f64, p_lon: f64, vertices: &[GeoPoint]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (yi, xi) = (vertices[i].lat, vertices[i].lon);
        let (yj, xj) = (vertices[j].lat, vertices[j].lon);

        if on_segment(p_lat, p_lon, vertices[i], vertices[j]) {
            return true;
        }

        // (yi > p) != (yj > p) guarantees yj != yi, so the division is safe.
        if (yi > p_lat) != (yj > p_lat) && p_lon < (xj - xi) * (p_lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

fn on_segment(p_lat: f64, p_lon: f64, a: GeoPoint, b: GeoPoint) -> bool {
    let cross = (b.lon - a.lon) * (p_lat - a.lat) - (b.lat - a.lat) * (p_lon - a.lon);
    #[allow(clippy::float_cmp)]
    let collinear = cross == 0.0;
    collinear
        && p_lat >= a.lat.min(b.lat)
        && p_lat <= a.lat.max(b.lat)
        && p_lon >= a.lon.min(b.lon)
        && p_lon <= a.lon.max(b.lon)
}

/// Result of an ETA projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtaEstimate {
    /// Great-circle distance to the destination.
    pub distance_nm: f64,
    /// Hours to arrival; `f64::INFINITY` when the object is not moving.
    pub eta_hours: f64,
    /// Projected arrival time; [`EtaEstimate::NEVER`] when unreachable.
    pub eta_timestamp: DateTime<Utc>,
}

impl EtaEstimate {
    /// Sentinel timestamp meaning "effectively never".
    pub const NEVER: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

    /// Returns true if the estimate is the "never arrives" sentinel.
    ///
    /// Callers must check this before doing arithmetic on `eta_timestamp`.
    #[must_use]
    pub fn is_never(&self) -> bool {
        self.eta_timestamp == Self::NEVER || !self.eta_hours.is_finite()
    }
}

/// Projects time of arrival at `speed_knots` along the great circle.
///
/// A non-positive or non-finite speed yields an infinite `eta_hours` and the
/// [`EtaEstimate::NEVER`] timestamp instead of dividing by zero. An ETA too
/// far in the future to represent also collapses to the sentinel.
#[must_use]
pub fn estimate_eta(
    cur_lat: f64,
    cur_lon: f64,
    dest_lat: f64,
    dest_lon: f64,
    speed_knots: f64,
    now: DateTime<Utc>,
) -> EtaEstimate {
    let distance_nm = haversine_distance_nm(cur_lat, cur_lon, dest_lat, dest_lon);

    if !speed_knots.is_finite() || speed_knots <= 0.0 {
        return EtaEstimate {
            distance_nm,
            eta_hours: f64::INFINITY,
            eta_timestamp: EtaEstimate::NEVER,
        };
    }

    let eta_hours = distance_nm / speed_knots;
    let eta_timestamp = hours_to_duration(eta_hours)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(EtaEstimate::NEVER);

    EtaEstimate {
        distance_nm,
        eta_hours,
        eta_timestamp,
    }
}

/// Converts fractional hours to a chrono duration, `None` if unrepresentable.
pub(crate) fn hours_to_duration(hours: f64) -> Option<Duration> {
    let millis = hours * 3_600_000.0;
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Duration::try_milliseconds(millis.round() as i64)
}

/// Elapsed time between two instants in fractional hours.
#[must_use]
pub fn elapsed_hours(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = (now - since).num_milliseconds() as f64;
    millis / 3_600_000.0
}

/// Arithmetic mean of the vertices, used as a polygon's reference point.
#[must_use]
pub fn vertex_centroid(vertices: &[GeoPoint]) -> Option<GeoPoint> {
    if vertices.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = vertices.len() as f64;
    let (lat_sum, lon_sum) = vertices
        .iter()
        .fold((0.0, 0.0), |(la, lo), v| (la + v.lat, lo + v.lon));
    Some(GeoPoint::new(lat_sum / n, lon_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 10.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(10.0, 0.0),
        ]
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_distance_nm(1.3, 103.8, 1.3, 103.8), 0.0);
    }

    #[test]
    fn haversine_one_degree_of_latitude_is_about_sixty_nm() {
        let d = haversine_distance_nm(0.0, 0.0, 1.0, 0.0);
        assert!((d - 60.04).abs() < 0.05, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = haversine_distance_nm(1.30, 103.80, 22.74, 69.68);
        let b = haversine_distance_nm(22.74, 69.68, 1.30, 103.80);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn circle_boundary_is_inclusive() {
        let d = haversine_distance_nm(1.30, 103.80, 1.38, 103.80);
        assert!(is_point_in_circle(1.38, 103.80, 1.30, 103.80, d));
        assert!(is_point_in_circle(1.38, 103.80, 1.30, 103.80, d - BOUNDARY_TOLERANCE_NM / 2.0));
        assert!(!is_point_in_circle(1.38, 103.80, 1.30, 103.80, d - 1e-6));
    }

    #[test]
    fn polygon_inside_and_outside() {
        let sq = square();
        assert!(is_point_in_polygon(5.0, 5.0, &sq));
        assert!(!is_point_in_polygon(15.0, 5.0, &sq));
        assert!(!is_point_in_polygon(5.0, -1.0, &sq));
        assert!(!is_point_in_polygon(5.0, 11.0, &sq));
    }

    #[test]
    fn polygon_vertices_are_inside() {
        for v in square() {
            assert!(is_point_in_polygon(v.lat, v.lon, &square()), "vertex {v:?}");
        }
    }

    #[test]
    fn polygon_edges_are_inside() {
        let sq = square();
        assert!(is_point_in_polygon(0.0, 5.0, &sq));
        assert!(is_point_in_polygon(10.0, 5.0, &sq));
        assert!(is_point_in_polygon(5.0, 0.0, &sq));
        assert!(is_point_in_polygon(5.0, 10.0, &sq));
        // Collinear with an edge but beyond its end.
        assert!(!is_point_in_polygon(0.0, 12.0, &sq));
        assert!(!is_point_in_polygon(-2.0, 0.0, &sq));
    }

    #[test]
    fn polygon_with_two_vertices_contains_nothing() {
        let line = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(10.0, 10.0)];
        assert!(!is_point_in_polygon(5.0, 5.0, &line));
        assert!(!is_point_in_polygon(0.0, 0.0, &line));
    }

    #[test]
    fn polygon_accepts_explicitly_closed_ring() {
        let mut sq = square();
        sq.push(sq[0]);
        assert!(is_point_in_polygon(5.0, 5.0, &sq));
        assert!(!is_point_in_polygon(-5.0, 5.0, &sq));
    }

    #[test]
    fn polygon_concave_notch_is_outside() {
        // U shape open to the north.
        let u = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 9.0),
            GeoPoint::new(9.0, 9.0),
            GeoPoint::new(9.0, 6.0),
            GeoPoint::new(3.0, 6.0),
            GeoPoint::new(3.0, 3.0),
            GeoPoint::new(9.0, 3.0),
            GeoPoint::new(9.0, 0.0),
        ];
        assert!(is_point_in_polygon(1.5, 4.5, &u));
        assert!(!is_point_in_polygon(6.0, 4.5, &u));
        assert!(is_point_in_polygon(6.0, 1.5, &u));
    }

    #[test]
    fn eta_zero_speed_is_never() {
        let now = Utc::now();
        let eta = estimate_eta(1.3, 103.8, 22.7, 69.7, 0.0, now);
        assert!(eta.eta_hours.is_infinite());
        assert_eq!(eta.eta_timestamp, EtaEstimate::NEVER);
        assert!(eta.is_never());
        assert!(eta.distance_nm > 0.0);
    }

    #[test]
    fn eta_negative_and_nan_speed_are_never() {
        let now = Utc::now();
        assert!(estimate_eta(0.0, 0.0, 1.0, 0.0, -3.0, now).is_never());
        assert!(estimate_eta(0.0, 0.0, 1.0, 0.0, f64::NAN, now).is_never());
    }

    #[test]
    fn eta_projects_arrival() {
        let now = Utc::now();
        let eta = estimate_eta(0.0, 0.0, 1.0, 0.0, 10.0, now);
        assert!((eta.eta_hours - eta.distance_nm / 10.0).abs() < 1e-12);
        assert!(!eta.is_never());
        let expected = now + Duration::milliseconds((eta.eta_hours * 3_600_000.0).round() as i64);
        assert_eq!(eta.eta_timestamp, expected);
    }

    #[test]
    fn eta_unrepresentable_collapses_to_sentinel() {
        let now = Utc::now();
        let eta = estimate_eta(0.0, 0.0, 0.0, 180.0, 1e-300, now);
        assert!(eta.eta_hours.is_finite());
        assert!(eta.is_never());
    }

    #[test]
    fn centroid_of_square() {
        let c = vertex_centroid(&square()).unwrap();
        assert_eq!(c, GeoPoint::new(5.0, 5.0));
        assert!(vertex_centroid(&[]).is_none());
    }

    #[test]
    fn elapsed_hours_is_fractional() {
        let t0 = Utc::now();
        assert!((elapsed_hours(t0, t0 + Duration::minutes(90)) - 1.5).abs() < 1e-12);
    }
}
