//! Containment evaluation: dispatches a position to the right geometry test.

use chrono::{DateTime, Utc};

use crate::fence::{Fence, FenceShape};
use crate::geometry::{self, EtaEstimate};
use crate::position::Position;

/// Returns true if `position` lies inside `fence`.
///
/// Dispatch:
/// - polygon with at least 3 vertices: ray casting;
/// - anything else uses the circle test, which covers every circle fence and a
///   degenerate polygon that carries a fallback circle;
/// - a degenerate polygon without a fallback contains nothing.
#[must_use]
pub fn check_containment(position: &Position, fence: &Fence) -> bool {
    let p = position.point();
    match &fence.shape {
        FenceShape::Polygon { vertices, .. } if vertices.len() >= 3 => {
            geometry::is_point_in_polygon(p.lat, p.lon, vertices)
        }
        FenceShape::Polygon { fallback, .. } => fallback.is_some_and(|c| c.contains(p)),
        FenceShape::Circle(c) => c.contains(p),
    }
}

/// Projects the ETA from `position` to the fence's reference point.
///
/// Uses the position's reported speed; a missing speed is treated as
/// stationary and yields the "never" estimate. Returns `None` only for a
/// fence with no geometry at all.
#[must_use]
pub fn eta_to_fence(position: &Position, fence: &Fence, now: DateTime<Utc>) -> Option<EtaEstimate> {
    let dest = fence.reference_point()?;
    Some(geometry::estimate_eta(
        position.latitude,
        position.longitude,
        dest.lat,
        dest.lon,
        position.speed.unwrap_or(0.0),
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::Circle;
    use crate::geometry::GeoPoint;

    fn at(lat: f64, lon: f64) -> Position {
        Position::new("v1", Utc::now(), lat, lon)
    }

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ]
    }

    #[test]
    fn circle_fence_uses_circle_test() {
        let fence = Fence::circle("c", 1.30, 103.80, 5.0);
        assert!(check_containment(&at(1.30, 103.80), &fence));
        assert!(check_containment(&at(1.35, 103.80), &fence));
        assert!(!check_containment(&at(1.50, 103.80), &fence));
    }

    #[test]
    fn polygon_fence_uses_ray_casting() {
        let fence = Fence::polygon("p", square());
        assert!(check_containment(&at(0.5, 0.5), &fence));
        assert!(!check_containment(&at(1.5, 0.5), &fence));
    }

    #[test]
    fn degenerate_polygon_falls_back_to_circle() {
        let fence = Fence::new(
            "p",
            FenceShape::Polygon {
                vertices: vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(11.0, 11.0)],
                fallback: Some(Circle::new(0.0, 0.0, 30.0)),
            },
        );
        assert!(check_containment(&at(0.1, 0.1), &fence));
        assert!(!check_containment(&at(10.5, 10.5), &fence));
    }

    #[test]
    fn degenerate_polygon_without_fallback_contains_nothing() {
        let fence = Fence::polygon("p", vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]);
        assert!(!check_containment(&at(0.5, 0.5), &fence));
        assert!(!check_containment(&at(0.0, 0.0), &fence));
    }

    #[test]
    fn usable_polygon_ignores_fallback_circle() {
        let fence = Fence::new(
            "p",
            FenceShape::Polygon {
                vertices: square(),
                fallback: Some(Circle::new(50.0, 50.0, 10.0)),
            },
        );
        assert!(check_containment(&at(0.5, 0.5), &fence));
        assert!(!check_containment(&at(50.0, 50.0), &fence));
    }

    #[test]
    fn eta_to_fence_uses_position_speed() {
        let now = Utc::now();
        let fence = Fence::circle("c", 1.0, 0.0, 1.0);

        let moving = at(0.0, 0.0).with_speed(12.0);
        let eta = eta_to_fence(&moving, &fence, now).unwrap();
        assert!(!eta.is_never());
        assert!((eta.eta_hours - eta.distance_nm / 12.0).abs() < 1e-12);

        let drifting = at(0.0, 0.0);
        assert!(eta_to_fence(&drifting, &fence, now).unwrap().is_never());
    }
}
