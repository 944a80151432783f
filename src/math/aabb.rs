//! Axis-aligned chunk bounds, exported as glTF accessor min/max

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around a set of points, or `None` for an empty set
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Aabb::new(first, first), |mut bounds, p| {
            bounds.expand(*p);
            bounds
        }))
    }

    /// Grow to include `point`
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let points = [
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.5, 0.0, -6.0),
        ];
        let aabb = Aabb::from_points(&points).unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -6.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));

        let empty: [Vec3; 0] = [];
        assert!(Aabb::from_points(&empty).is_none());
    }

    #[test]
    fn test_expand_keeps_existing_extent() {
        let mut aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        aabb.expand(Vec3::new(0.5, 3.0, -2.0));
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 1.0));
    }
}
