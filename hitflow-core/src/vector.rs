//! Small 2D/3D vector types used for hit positions and readout geometry.
//!
//! Lengths are in millimetres and angles in radians throughout the crate.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point or direction in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Unit vector along X.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along Y.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along Z.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product (`self × other`).
    #[inline]
    #[must_use]
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared magnitude.
    #[inline]
    #[must_use]
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }

    /// Magnitude.
    #[inline]
    #[must_use]
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    #[must_use]
    pub fn distance2(&self, other: &Self) -> f64 {
        (*self - *other).mag2()
    }

    /// Returns the unit vector with the same direction, or `None` for a
    /// zero (or non-finite) vector.
    #[must_use]
    pub fn unit(&self) -> Option<Self> {
        let mag = self.mag();
        if mag > 0.0 && mag.is_finite() {
            Some(*self * (1.0 / mag))
        } else {
            None
        }
    }

    /// Rotates the vector by `angle` radians about `axis` (right-hand rule).
    ///
    /// Uses Rodrigues' formula. A zero axis leaves the vector unchanged.
    #[must_use]
    pub fn rotate(&self, angle: f64, axis: &Self) -> Self {
        let Some(k) = axis.unit() else {
            return *self;
        };
        let (sin, cos) = angle.sin_cos();
        *self * cos + k.cross(self) * sin + k * (k.dot(self) * (1.0 - cos))
    }

    /// Rotates about the X axis.
    #[must_use]
    pub fn rotate_x(&self, angle: f64) -> Self {
        self.rotate(angle, &Self::X)
    }

    /// Rotates about the Y axis.
    #[must_use]
    pub fn rotate_y(&self, angle: f64) -> Self {
        self.rotate(angle, &Self::Y)
    }

    /// Rotates about the Z axis.
    #[must_use]
    pub fn rotate_z(&self, angle: f64) -> Self {
        self.rotate(angle, &Self::Z)
    }

    /// Unsigned angle to another vector in `[0, π]`.
    #[must_use]
    pub fn angle(&self, other: &Self) -> f64 {
        let denom = self.mag() * other.mag();
        if denom == 0.0 {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos()
    }

    /// Returns true when every component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// A point in a plane-local 2D frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
}

impl Vec2 {
    /// Creates a new 2D vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotates counter-clockwise by `angle` radians.
    #[must_use]
    pub fn rotate(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
