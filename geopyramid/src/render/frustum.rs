//! View frustum planes used for culling tile bounds.

use crate::projection::Vec3;

/// A plane `normal · p + distance = 0`. Points with a positive signed distance
/// lie on the side the normal faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    normal: Vec3,
    distance: f64,
}

impl Plane {
    /// Create a plane, normalizing `normal` and scaling `distance` with it.
    pub fn new(normal: Vec3, distance: f64) -> Self {
        let length = normal.magnitude();
        if length == 0.0 {
            return Self {
                normal,
                distance,
            };
        }
        Self {
            normal: normal * (1.0 / length),
            distance: distance / length,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Signed distance from the plane to `point`.
    pub fn distance_to(&self, point: &Vec3) -> f64 {
        self.normal.dot(point) + self.distance
    }
}

/// Six inward-facing planes bounding the visible volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Planes are ordered left, right, bottom, top, near, far. Each normal must
    /// point into the visible volume.
    pub fn new(
        left: Plane,
        right: Plane,
        bottom: Plane,
        top: Plane,
        near: Plane,
        far: Plane,
    ) -> Self {
        Self {
            planes: [left, right, bottom, top, near, far],
        }
    }

    /// An axis-aligned box-shaped volume from `min` to `max`.
    pub fn from_box(min: Vec3, max: Vec3) -> Self {
        Self::new(
            Plane::new(Vec3::new(1.0, 0.0, 0.0), -min.x),
            Plane::new(Vec3::new(-1.0, 0.0, 0.0), max.x),
            Plane::new(Vec3::new(0.0, 1.0, 0.0), -min.y),
            Plane::new(Vec3::new(0.0, -1.0, 0.0), max.y),
            Plane::new(Vec3::new(0.0, 0.0, 1.0), -min.z),
            Plane::new(Vec3::new(0.0, 0.0, -1.0), max.z),
        )
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to(point) >= 0.0)
    }
}
