//! Transform math shared by the skeleton and geometry code
//!
//! Local bone transforms are stored as separate scale, rotation and
//! translation components. Whenever two transforms have to be combined the
//! components are composed into a [`Mat4`], multiplied, and decomposed back.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// A scale/rotation/translation triple.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Transform3 {
    pub scale: Vec3,
    pub rotation: Quat,
    pub translation: Vec3,
}

/// One sampled local transform of one bone at one frame.
pub type KeyFrame = Transform3;

impl Default for Transform3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform3 {
    pub const IDENTITY: Self = Self {
        scale: Vec3::ONE,
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(scale: Vec3, rotation: Quat, translation: Vec3) -> Self {
        Self {
            scale,
            rotation,
            translation,
        }
    }

    /// Compose into a matrix applying scale, then rotation, then translation
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Decompose a matrix built from scale, rotation and translation
    ///
    /// The rotation is renormalized so accumulated drift from repeated
    /// compose/decompose round trips does not grow.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            scale,
            rotation: rotation.normalize(),
            translation,
        }
    }

    /// Interpolate towards `other`
    ///
    /// Scale and translation are linear, rotation takes the shortest arc.
    pub fn blend(&self, t: f32, other: &Self) -> Self {
        Self {
            scale: self.scale.lerp(other.scale, t),
            rotation: self.rotation.slerp(other.rotation, t).normalize(),
            translation: self.translation.lerp(other.translation, t),
        }
    }

    /// Whether all components are within `epsilon` of `other`
    ///
    /// Rotations compare as orientations, so `q` and `-q` are equal.
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.scale.abs_diff_eq(other.scale, epsilon)
            && self.translation.abs_diff_eq(other.translation, epsilon)
            && (self.rotation.abs_diff_eq(other.rotation, epsilon)
                || self.rotation.abs_diff_eq(-other.rotation, epsilon))
    }
}

/// Yaw (rotation about +Y) of a quaternion, in radians.
pub fn yaw_of(rotation: Quat) -> f32 {
    let (yaw, _pitch, _roll) = rotation.to_euler(EulerRot::YXZ);
    yaw
}

/// A pure rotation about +Y.
pub fn yaw_rotation(yaw: f32) -> Quat {
    Quat::from_rotation_y(yaw)
}

/// Remove the yaw component from `rotation`, keeping pitch and roll.
pub fn strip_yaw(rotation: Quat) -> Quat {
    let (_yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    Quat::from_euler(EulerRot::YXZ, 0.0, pitch, roll)
}

/// Axis aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct BBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BBox {
    /// A box containing nothing. Adding any point makes it valid.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn add_bbox(&mut self, other: &Self) {
        if !other.is_empty() {
            self.add_point(other.min);
            self.add_point(other.max);
        }
    }

    pub fn inflate(&mut self, amount: Vec3) {
        self.min -= amount;
        self.max += amount;
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl FromIterator<Vec3> for BBox {
    fn from_iter<I: IntoIterator<Item = Vec3>>(iter: I) -> Self {
        let mut bbox = Self::EMPTY;
        for point in iter {
            bbox.add_point(point);
        }
        bbox
    }
}

/// Plane in `normal . p + distance = 0` form
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde-support",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Plane through three points, wound counter-clockwise around the normal.
    ///
    /// Collinear points give a zero normal.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self {
            normal,
            distance: -normal.dot(a),
        }
    }

    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}
