//! Ground-plane geometry used for zone membership and fire-mission sampling.

use glam::{Vec2, Vec3};

/// Projects a world position onto the ground plane, keeping `x` and `z`.
#[must_use]
pub fn ground(position: Vec3) -> Vec2 {
    Vec2::new(position.x, position.z)
}

/// Closed polyline that bounds a zone, stored in world coordinates.
///
/// Vertices are authored relative to the polyline origin. They are translated
/// once at construction so membership tests never repeat the work.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneBoundary {
    origin: Vec3,
    points: Vec<Vec2>,
}

impl ZoneBoundary {
    /// Creates a boundary from an origin and vertices relative to it.
    #[must_use]
    pub fn new(origin: Vec3, vertices: &[Vec3]) -> Self {
        let points = vertices
            .iter()
            .map(|vertex| ground(origin + *vertex))
            .collect();
        Self { origin, points }
    }

    /// World origin of the polyline.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Translated ground-plane vertices.
    #[must_use]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Reports whether the polyline has too few vertices to enclose an area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3
    }

    /// Even-odd point-in-polygon test on the ground plane.
    ///
    /// Degenerate boundaries contain nothing.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        if self.is_degenerate() {
            return false;
        }

        let mut inside = false;
        let mut previous = self.points[self.points.len() - 1];
        for &current in &self.points {
            let straddles = (current.y > point.y) != (previous.y > point.y);
            if straddles {
                let crossing = (previous.x - current.x) * (point.y - current.y)
                    / (previous.y - current.y)
                    + current.x;
                if point.x < crossing {
                    inside = !inside;
                }
            }
            previous = current;
        }
        inside
    }

    /// Convenience wrapper projecting a world position before testing it.
    #[must_use]
    pub fn contains_position(&self, position: Vec3) -> bool {
        self.contains(ground(position))
    }

    /// Axis-aligned bounds of the translated vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds2> {
        let first = *self.points.first()?;
        let (min, max) = self
            .points
            .iter()
            .fold((first, first), |(min, max), point| {
                (min.min(*point), max.max(*point))
            });
        Some(Bounds2 { min, max })
    }
}

/// Axis-aligned rectangle on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2 {
    /// Lower corner (smallest `x` and `z`).
    pub min: Vec2,
    /// Upper corner (largest `x` and `z`).
    pub max: Vec2,
}

impl Bounds2 {
    /// Reports whether the point lies within the rectangle, edges included.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> ZoneBoundary {
        ZoneBoundary::new(
            Vec3::new(100.0, 5.0, 100.0),
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(50.0, 0.0, 0.0),
                Vec3::new(50.0, 0.0, 50.0),
                Vec3::new(0.0, 0.0, 50.0),
            ],
        )
    }

    #[test]
    fn membership_uses_translated_vertices() {
        let boundary = square();
        assert!(boundary.contains(Vec2::new(125.0, 125.0)));
        assert!(!boundary.contains(Vec2::new(25.0, 25.0)));
        assert!(boundary.contains_position(Vec3::new(101.0, 900.0, 149.0)));
    }

    #[test]
    fn concave_notch_is_outside() {
        let boundary = ZoneBoundary::new(
            Vec3::ZERO,
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(30.0, 0.0, 0.0),
                Vec3::new(30.0, 0.0, 30.0),
                Vec3::new(20.0, 0.0, 30.0),
                Vec3::new(20.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 30.0),
                Vec3::new(0.0, 0.0, 30.0),
            ],
        );
        assert!(!boundary.contains(Vec2::new(15.0, 20.0)));
        assert!(boundary.contains(Vec2::new(5.0, 20.0)));
        assert!(boundary.contains(Vec2::new(15.0, 5.0)));
    }

    #[test]
    fn degenerate_boundary_contains_nothing() {
        let boundary = ZoneBoundary::new(Vec3::ZERO, &[Vec3::ZERO, Vec3::X]);
        assert!(boundary.is_degenerate());
        assert!(!boundary.contains(Vec2::ZERO));
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let bounds = square().bounds().expect("bounds");
        assert_eq!(bounds.min, Vec2::new(100.0, 100.0));
        assert_eq!(bounds.max, Vec2::new(150.0, 150.0));
        assert!(ZoneBoundary::new(Vec3::ZERO, &[]).bounds().is_none());
    }
}
