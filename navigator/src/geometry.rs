//! Planar geometry on the playing field.
//!
//! Positions are field millimetres, headings are degrees measured the same
//! way as `atan2` (counter-clockwise from the +x axis).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Robot position and heading as reported by telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point,
    pub heading: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32, heading: f32) -> Self {
        Self {
            position: Point::new(x, y),
            heading,
        }
    }
}

/// Angle the robot at `origin` has to rotate by to face `target`.
///
/// Positive means counter-clockwise. The result lies in `(-180, 180]` for any
/// finite heading.
pub fn bearing(origin: &Pose, target: Point) -> f32 {
    let dy = target.y - origin.position.y;
    let dx = target.x - origin.position.x;
    wrap_degrees(dy.atan2(dx).to_degrees() - origin.heading)
}

/// Wrap an angle into `(-180, 180]`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f32 {
    (b.x - a.x).hypot(b.y - a.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn bearing_straight_ahead_is_zero() {
        let pose = Pose::new(0.0, 0.0, 0.0);
        assert!(approx(bearing(&pose, Point::new(1000.0, 0.0)), 0.0));
    }

    #[test]
    fn bearing_subtracts_heading() {
        // Facing north, target east: turn clockwise by 90
        let pose = Pose::new(0.0, 0.0, 90.0);
        assert!(approx(bearing(&pose, Point::new(10.0, 0.0)), -90.0));

        // Facing east, target north: counter-clockwise by 90
        let pose = Pose::new(0.0, 0.0, 0.0);
        assert!(approx(bearing(&pose, Point::new(0.0, 10.0)), 90.0));
    }

    #[test]
    fn bearing_wraps_to_shortest_turn() {
        // atan2 gives -170, heading 170 -> raw -340, wrapped to 20
        let target = Point::new(
            (-170.0f32).to_radians().cos() * 100.0,
            (-170.0f32).to_radians().sin() * 100.0,
        );
        let pose = Pose::new(0.0, 0.0, 170.0);
        assert!(approx(bearing(&pose, target), 20.0));

        // atan2 gives 170, heading -170 -> raw 340, wrapped to -20
        let target = Point::new(
            170.0f32.to_radians().cos() * 100.0,
            170.0f32.to_radians().sin() * 100.0,
        );
        let pose = Pose::new(0.0, 0.0, -170.0);
        assert!(approx(bearing(&pose, target), -20.0));
    }

    #[test]
    fn bearing_directly_behind_is_positive_180() {
        let pose = Pose::new(0.0, 0.0, 0.0);
        let b = bearing(&pose, Point::new(-10.0, 0.0));
        assert!(b > -180.0 && approx(b.abs(), 180.0), "{b}");
    }

    #[test]
    fn bearing_never_returns_minus_180() {
        let pose = Pose::new(0.0, 0.0, 360.0);
        let b = bearing(&pose, Point::new(-10.0, 0.0));
        assert!(b > -180.0 && approx(b.abs(), 180.0), "{b}");
    }

    #[test]
    fn bearing_stays_in_half_open_range() {
        let targets = [
            Point::new(1.0, 0.0),
            Point::new(-1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, -1.0),
            Point::new(-3.0, -4.0),
            Point::new(7.0, -0.5),
        ];
        for heading in (-1080..=1080).step_by(15) {
            let pose = Pose::new(0.0, 0.0, heading as f32);
            for target in targets {
                let b = bearing(&pose, target);
                assert!(b > -180.0 && b <= 180.0, "heading {heading}: {b}");
            }
        }
    }

    #[test]
    fn bearing_normalizes_headings_beyond_one_turn() {
        let east = Point::new(1000.0, 0.0);
        assert!(approx(bearing(&Pose::new(0.0, 0.0, 720.0), east), 0.0));
        assert!(approx(bearing(&Pose::new(0.0, 0.0, -720.0), east), 0.0));
        assert!(approx(bearing(&Pose::new(0.0, 0.0, 400.0), east), -40.0));
        assert!(approx(bearing(&Pose::new(0.0, 0.0, -400.0), east), 40.0));

        let b = bearing(&Pose::new(0.0, 0.0, -540.0), east);
        assert!(b > -180.0 && approx(b, 180.0), "{b}");
    }

    #[test]
    fn wraps_degrees_into_half_open_range() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(540.0), 180.0);
        assert_eq!(wrap_degrees(-90.0), -90.0);
        assert_eq!(wrap_degrees(-300.0), 60.0);
    }

    #[test]
    fn bearing_antisymmetric_under_half_turn() {
        // Rotating the heading by 180 flips which side the target is on
        let target = Point::new(300.0, 400.0);
        for heading in [-120.0f32, -45.0, 0.0, 10.0, 30.0, 95.0] {
            let a = bearing(&Pose::new(0.0, 0.0, heading), target);
            let b = bearing(&Pose::new(0.0, 0.0, heading + 180.0), target);
            let diff = (a - b).abs();
            assert!(approx(diff, 180.0), "heading {heading}: {a} vs {b}");
            assert_eq!(a.signum(), -b.signum(), "heading {heading}: {a} vs {b}");
        }
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Point::new(3.0, -4.0);
        let b = Point::new(-9.0, 12.0);
        assert_eq!(distance(a, b), distance(b, a));
        assert_eq!(distance(a, a), 0.0);
        assert!(approx(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0));
    }
}
