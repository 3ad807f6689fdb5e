//! Axis-aligned bounding box, ported from the original engine's
//! `AxisAlignedBBox<Dim>` (`component/axis_aligned_bbox.hpp`), specialized to
//! 3 dimensions since every consumer in this crate (Geometry's bounding box,
//! spec §3) is a 3D mesh bound. `cgmath::Point3`/`Matrix4` stand in for the
//! original's `glm::vec`/`glm::mat`.

use cgmath::{EuclideanSpace, Matrix4, Point3, Transform, Vector3};

/// An axis-aligned bounding box. The default (`reset`) box is "invalid":
/// min is `+infinity`, max is `-infinity`, so it contains nothing and
/// `expand_by` on it always takes the shape of whatever is expanded into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb3 {
    pub fn invalid() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// A degenerate box collapsed to a single point.
    pub fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point in `points`. Used by geometry
    /// upload (spec §3's Geometry "bounding box (for 3D)").
    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Self {
        let mut bbox = Self::invalid();
        for p in points {
            bbox.expand_by(p);
        }
        bbox
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::from_vec((self.min.to_vec() + self.max.to_vec()) / 2.0)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn volume(&self) -> f32 {
        let e = self.extent();
        e.x * e.y * e.z
    }

    pub fn expand_by_point(&mut self, p: Point3<f32>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn expand_by(&mut self, p: Point3<f32>) {
        self.expand_by_point(p);
    }

    pub fn expand_by_bbox(&mut self, other: &Aabb3) {
        self.expand_by_point(other.min);
        self.expand_by_point(other.max);
    }

    pub fn contains(&self, p: Point3<f32>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Transforms the box by `matrix`, returning the AABB of the 8
    /// transformed corners (spec §8 property 8: "AABB(min,max).transform(M,T)
    /// equals the AABB of the 2^D transformed corners").
    pub fn transform(&self, matrix: &Matrix4<f32>) -> Self {
        let corners = [
            Point3::new(self.min.x, self.min.y, self.min.z),
            Point3::new(self.max.x, self.min.y, self.min.z),
            Point3::new(self.min.x, self.max.y, self.min.z),
            Point3::new(self.max.x, self.max.y, self.min.z),
            Point3::new(self.min.x, self.min.y, self.max.z),
            Point3::new(self.max.x, self.min.y, self.max.z),
            Point3::new(self.min.x, self.max.y, self.max.z),
            Point3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut bbox = Self::invalid();
        for corner in corners {
            bbox.expand_by(matrix.transform_point(corner));
        }
        bbox
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::invalid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Matrix4, Vector3};

    #[test]
    fn expand_by_grows_to_contain() {
        let mut bbox = Aabb3::invalid();
        bbox.expand_by(Point3::new(1.0, 2.0, 3.0));
        bbox.expand_by(Point3::new(-1.0, 0.0, 5.0));
        assert_eq!(bbox.min, Point3::new(-1.0, 0.0, 3.0));
        assert_eq!(bbox.max, Point3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn transform_matches_transformed_corners() {
        let bbox = Aabb3::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let matrix = Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0))
            * Matrix4::from_angle_z(Deg(90.0));

        let transformed = bbox.transform(&matrix);

        let mut expected = Aabb3::invalid();
        for corner in [
            Point3::new(-1.0, -1.0, -1.0),
            Point3::new(1.0, -1.0, -1.0),
            Point3::new(-1.0, 1.0, -1.0),
            Point3::new(1.0, 1.0, -1.0),
            Point3::new(-1.0, -1.0, 1.0),
            Point3::new(1.0, -1.0, 1.0),
            Point3::new(-1.0, 1.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ] {
            expected.expand_by(matrix.transform_point(corner));
        }

        assert!((transformed.min.x - expected.min.x).abs() < 1e-4);
        assert!((transformed.max.x - expected.max.x).abs() < 1e-4);
        assert!((transformed.min.y - expected.min.y).abs() < 1e-4);
        assert!((transformed.max.y - expected.max.y).abs() < 1e-4);
    }

    #[test]
    fn invalid_box_has_no_volume() {
        assert!(!Aabb3::invalid().is_valid());
    }
}
