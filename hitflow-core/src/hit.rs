//! Hit record and hit type.

use crate::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Category of a hit.
///
/// Projected readouts only measure two coordinates: `Xz` hits carry a
/// meaningful x and z, `Yz` hits a meaningful y and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum HitType {
    /// Unclassified.
    Unknown,
    /// Hit measured in the XY plane only.
    Xy,
    /// X projection (x and z known).
    Xz,
    /// Y projection (y and z known).
    Yz,
    /// Full 3D hit.
    #[default]
    Xyz,
    /// Hit registered by a veto channel.
    Veto,
}

/// A single energy deposition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// X coordinate (mm).
    pub x: f64,
    /// Y coordinate (mm).
    pub y: f64,
    /// Z coordinate (mm).
    pub z: f64,
    /// Deposited energy (keV).
    pub energy: f64,
    /// Time (us).
    #[cfg_attr(feature = "serde", serde(default))]
    pub time: f64,
    /// Hit category.
    #[cfg_attr(feature = "serde", serde(default, rename = "type"))]
    pub hit_type: HitType,
}

impl Hit {
    /// Creates a 3D hit with zero time.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64, energy: f64) -> Self {
        Self {
            x,
            y,
            z,
            energy,
            time: 0.0,
            hit_type: HitType::Xyz,
        }
    }

    /// Creates a hit at the given position.
    #[inline]
    #[must_use]
    pub fn at(position: Vec3, energy: f64) -> Self {
        Self::new(position.x, position.y, position.z, energy)
    }

    /// Sets the hit time.
    #[must_use]
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the hit type.
    #[must_use]
    pub fn with_type(mut self, hit_type: HitType) -> Self {
        self.hit_type = hit_type;
        self
    }

    /// Returns the position as a vector.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}
