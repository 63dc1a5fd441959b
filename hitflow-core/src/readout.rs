//! Readout geometry: planes decomposed into rectangular modules of channels.
//!
//! A plane is defined by a position, a unit normal and an in-plane rotation.
//! Its local axes are always re-derived from those, so `axis_x`, `axis_y` and
//! `normal` form a right-handed orthonormal basis.

use std::f64::consts::TAU;

use crate::{Error, Result, Vec2, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used when classifying a normal as +Z or -Z.
const AXIS_TOLERANCE: f64 = 1e-12;

/// A rectangular, rotated module of a readout plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutModule {
    id: usize,
    origin: Vec2,
    size: Vec2,
    rotation: f64,
    channels_x: usize,
    channels_y: usize,
}

impl ReadoutModule {
    /// Creates a module with a single channel.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescription`] if the size is not positive.
    pub fn new(id: usize, origin: Vec2, size: Vec2, rotation: f64) -> Result<Self> {
        if !(size.x > 0.0 && size.y > 0.0 && size.x.is_finite() && size.y.is_finite()) {
            return Err(Error::InvalidDescription(format!(
                "module {id} has non-positive size ({}, {})",
                size.x, size.y
            )));
        }
        Ok(Self {
            id,
            origin,
            size,
            rotation,
            channels_x: 1,
            channels_y: 1,
        })
    }

    /// Sets the channel grid.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescription`] if either count is zero.
    pub fn with_channels(mut self, channels_x: usize, channels_y: usize) -> Result<Self> {
        if channels_x == 0 || channels_y == 0 {
            return Err(Error::InvalidDescription(format!(
                "module {} needs at least one channel per axis",
                self.id
            )));
        }
        self.channels_x = channels_x;
        self.channels_y = channels_y;
        Ok(self)
    }

    /// Module identifier.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Plane-local origin of the module corner.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Module size.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// In-plane rotation (radians).
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels_x * self.channels_y
    }

    /// Converts plane-local coordinates into module coordinates.
    #[must_use]
    pub fn to_module(&self, local: Vec2) -> Vec2 {
        (local - self.origin).rotate(-self.rotation)
    }

    /// Converts module coordinates into plane-local coordinates.
    #[must_use]
    pub fn to_plane(&self, module: Vec2) -> Vec2 {
        module.rotate(self.rotation) + self.origin
    }

    /// True if the plane-local point lies inside the module rectangle.
    #[must_use]
    pub fn contains(&self, local: Vec2) -> bool {
        let p = self.to_module(local);
        (0.0..=self.size.x).contains(&p.x) && (0.0..=self.size.y).contains(&p.y)
    }

    /// Channel index under a plane-local point, row-major in module y.
    #[must_use]
    pub fn find_channel(&self, local: Vec2) -> Option<usize> {
        if !self.contains(local) {
            return None;
        }
        let p = self.to_module(local);
        let ix = cell_index(p.x, self.size.x, self.channels_x);
        let iy = cell_index(p.y, self.size.y, self.channels_y);
        Some(iy * self.channels_x + ix)
    }

    /// Plane-local centre of a channel.
    #[must_use]
    pub fn channel_center(&self, channel: usize) -> Option<Vec2> {
        if channel >= self.channel_count() {
            return None;
        }
        let ix = channel % self.channels_x;
        let iy = channel / self.channels_x;
        let pitch_x = self.size.x / self.channels_x as f64;
        let pitch_y = self.size.y / self.channels_y as f64;
        let center = Vec2::new((ix as f64 + 0.5) * pitch_x, (iy as f64 + 0.5) * pitch_y);
        Some(self.to_plane(center))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_index(coordinate: f64, size: f64, cells: usize) -> usize {
    let idx = (coordinate / size * cells as f64).floor() as usize;
    idx.min(cells - 1)
}

/// A readout plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutPlane {
    id: usize,
    position: Vec3,
    normal: Vec3,
    rotation: f64,
    height: f64,
    axis_x: Vec3,
    axis_y: Vec3,
    modules: Vec<ReadoutModule>,
}

impl ReadoutPlane {
    /// Creates a plane without modules.
    ///
    /// # Errors
    /// Returns an error for a zero or non-finite normal, a non-finite
    /// position, or a negative height.
    pub fn new(id: usize, position: Vec3, normal: Vec3, height: f64) -> Result<Self> {
        if !position.is_finite() {
            return Err(invalid_vector("position", position));
        }
        let mut plane = Self {
            id,
            position,
            normal: Vec3::Z,
            rotation: 0.0,
            height: 0.0,
            axis_x: Vec3::X,
            axis_y: Vec3::Y,
            modules: Vec::new(),
        };
        plane.set_normal(normal)?;
        plane.set_height(height)?;
        Ok(plane)
    }

    /// Plane identifier.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Plane position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit normal.
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// In-plane rotation in `[0, 2π)`.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Height of the sensitive volume above the plane.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Local X axis.
    #[must_use]
    pub fn axis_x(&self) -> Vec3 {
        self.axis_x
    }

    /// Local Y axis.
    #[must_use]
    pub fn axis_y(&self) -> Vec3 {
        self.axis_y
    }

    /// Modules in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[ReadoutModule] {
        &self.modules
    }

    /// Module by index.
    #[must_use]
    pub fn module(&self, index: usize) -> Option<&ReadoutModule> {
        self.modules.get(index)
    }

    /// Appends a module.
    pub fn add_module(&mut self, module: ReadoutModule) {
        self.modules.push(module);
    }

    /// Moves the plane.
    ///
    /// # Errors
    /// Returns [`Error::InvalidVector`] for a non-finite position.
    pub fn set_position(&mut self, position: Vec3) -> Result<()> {
        if !position.is_finite() {
            return Err(invalid_vector("position", position));
        }
        self.position = position;
        Ok(())
    }

    /// Sets the normal; it is normalised and the axes re-derived.
    ///
    /// # Errors
    /// Returns [`Error::InvalidVector`] for a zero or non-finite normal.
    pub fn set_normal(&mut self, normal: Vec3) -> Result<()> {
        let unit = normal
            .unit()
            .ok_or_else(|| invalid_vector("normal", normal))?;
        self.normal = unit;
        self.update_axes();
        Ok(())
    }

    /// Sets the in-plane rotation, normalised to `[0, 2π)`.
    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = normalize_angle(rotation);
        self.update_axes();
    }

    /// Sets the height.
    ///
    /// # Errors
    /// Returns [`Error::NegativeHeight`] if `height < 0`.
    pub fn set_height(&mut self, height: f64) -> Result<()> {
        if height < 0.0 || height.is_nan() {
            return Err(Error::NegativeHeight(height));
        }
        self.height = height;
        Ok(())
    }

    /// Chooses the rotation so that `axis_x` points along `hint` projected
    /// onto the plane.
    ///
    /// # Errors
    /// Returns [`Error::AxisParallelToNormal`] when the projection vanishes.
    pub fn set_axis_x(&mut self, hint: Vec3) -> Result<()> {
        if !hint.is_finite() {
            return Err(invalid_vector("x-axis", hint));
        }
        let projected = hint - self.normal * hint.dot(&self.normal);
        let target = projected
            .unit()
            .filter(|_| projected.mag() > 1e-9 * hint.mag())
            .ok_or(Error::AxisParallelToNormal)?;

        let (base_x, _) = base_axes(self.normal);
        let sin = base_x.cross(&target).dot(&self.normal);
        let cos = base_x.dot(&target);
        self.set_rotation(sin.atan2(cos));
        Ok(())
    }

    /// Re-derives `axis_x` and `axis_y` from the normal and rotation.
    pub fn update_axes(&mut self) {
        let (x, y) = base_axes(self.normal);
        self.axis_x = x.rotate(self.rotation, &self.normal);
        self.axis_y = y.rotate(self.rotation, &self.normal);
    }

    /// Signed distance from the plane along its normal.
    #[must_use]
    pub fn distance_to_plane(&self, world: Vec3) -> f64 {
        (world - self.position).dot(&self.normal)
    }

    /// Projects a world point onto the plane's local axes.
    #[must_use]
    pub fn localize_point(&self, world: Vec3) -> Vec2 {
        let d = world - self.position;
        Vec2::new(self.axis_x.dot(&d), self.axis_y.dot(&d))
    }

    /// World position of a local point at `height` above the plane.
    #[must_use]
    pub fn to_world(&self, local: Vec2, height: f64) -> Vec3 {
        self.position + self.axis_x * local.x + self.axis_y * local.y + self.normal * height
    }

    /// Index of the first module containing `world`, if the point is within
    /// the sensitive height.
    #[must_use]
    pub fn find_module(&self, world: Vec3) -> Option<usize> {
        let distance = self.distance_to_plane(world);
        if !(distance > 0.0 && distance < self.height) {
            return None;
        }
        let local = self.localize_point(world);
        self.modules.iter().position(|m| m.contains(local))
    }

    /// Module and channel containing `world`.
    #[must_use]
    pub fn find_channel(&self, world: Vec3) -> Option<(usize, usize)> {
        let module = self.find_module(world)?;
        let local = self.localize_point(world);
        let channel = self.modules[module].find_channel(local)?;
        Some((module, channel))
    }

    /// Plane-local centre of a module channel.
    #[must_use]
    pub fn channel_center(&self, module: usize, channel: usize) -> Option<Vec2> {
        self.modules.get(module)?.channel_center(channel)
    }

    /// Total number of channels on the plane.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.modules.iter().map(ReadoutModule::channel_count).sum()
    }
}

/// Axes for zero rotation.
fn base_axes(normal: Vec3) -> (Vec3, Vec3) {
    if (normal - Vec3::Z).mag() < AXIS_TOLERANCE {
        (Vec3::X, Vec3::Y)
    } else if (normal + Vec3::Z).mag() < AXIS_TOLERANCE {
        (Vec3::new(0.0, -1.0, 0.0), Vec3::new(-1.0, 0.0, 0.0))
    } else {
        let axis = Vec3::Z.cross(&normal);
        let angle = Vec3::Z.dot(&normal).clamp(-1.0, 1.0).acos();
        (Vec3::X.rotate(angle, &axis), Vec3::Y.rotate(angle, &axis))
    }
}

fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

fn invalid_vector(what: &'static str, v: Vec3) -> Error {
    Error::InvalidVector {
        what,
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

/// All readout planes of a detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadoutGeometry {
    planes: Vec<ReadoutPlane>,
}

impl ReadoutGeometry {
    /// Creates an empty geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates a geometry from its description.
    ///
    /// # Errors
    /// Returns the first invalid plane or module found.
    pub fn from_description(description: &ReadoutDescription) -> Result<Self> {
        let mut geometry = Self::new();
        for (index, desc) in description.planes.iter().enumerate() {
            let id = desc.id.unwrap_or(index);
            let mut plane = ReadoutPlane::new(
                id,
                Vec3::from(desc.position),
                Vec3::from(desc.normal),
                desc.height,
            )?;
            match desc.axis_x {
                Some(hint) => plane.set_axis_x(Vec3::from(hint))?,
                None => plane.set_rotation(desc.rotation),
            }
            for (module_index, m) in desc.modules.iter().enumerate() {
                let module = ReadoutModule::new(
                    m.id.unwrap_or(module_index),
                    Vec2::new(m.origin[0], m.origin[1]),
                    Vec2::new(m.size[0], m.size[1]),
                    m.rotation,
                )?
                .with_channels(m.channels_x, m.channels_y)?;
                plane.add_module(module);
            }
            geometry.add_plane(plane);
        }
        log::debug!(
            "readout geometry: {} planes, {} channels",
            geometry.len(),
            geometry.channel_count()
        );
        Ok(geometry)
    }

    /// Appends a plane.
    pub fn add_plane(&mut self, plane: ReadoutPlane) {
        self.planes.push(plane);
    }

    /// Planes in declaration order.
    #[must_use]
    pub fn planes(&self) -> &[ReadoutPlane] {
        &self.planes
    }

    /// Plane by index.
    #[must_use]
    pub fn plane(&self, index: usize) -> Option<&ReadoutPlane> {
        self.planes.get(index)
    }

    /// Number of planes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    /// True when there is no plane.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// Total number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.planes.iter().map(ReadoutPlane::channel_count).sum()
    }

    /// Every `(plane, module)` pair containing `world`.
    #[must_use]
    pub fn find_containing(&self, world: Vec3) -> Vec<(usize, usize)> {
        self.planes
            .iter()
            .enumerate()
            .filter_map(|(p, plane)| plane.find_module(world).map(|m| (p, m)))
            .collect()
    }

    /// First `(plane, module, channel)` containing `world`.
    #[must_use]
    pub fn find_channel(&self, world: Vec3) -> Option<(usize, usize, usize)> {
        self.planes
            .iter()
            .enumerate()
            .find_map(|(p, plane)| plane.find_channel(world).map(|(m, c)| (p, m, c)))
    }
}

/// Serializable description of a readout geometry.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadoutDescription {
    /// Planes.
    pub planes: Vec<PlaneDescription>,
}

/// Serializable description of one readout plane.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PlaneDescription {
    /// Identifier; defaults to the plane index.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<usize>,
    /// Plane position (mm).
    pub position: [f64; 3],
    /// Plane normal.
    #[cfg_attr(feature = "serde", serde(default = "default_normal"))]
    pub normal: [f64; 3],
    /// In-plane rotation (radians). Ignored when `axis_x` is set.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: f64,
    /// Direction the local X axis should follow.
    #[cfg_attr(feature = "serde", serde(default))]
    pub axis_x: Option<[f64; 3]>,
    /// Sensitive height above the plane (mm).
    pub height: f64,
    /// Modules.
    #[cfg_attr(feature = "serde", serde(default))]
    pub modules: Vec<ModuleDescription>,
}

/// Serializable description of one module.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ModuleDescription {
    /// Identifier; defaults to the module index.
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: Option<usize>,
    /// Plane-local corner (mm).
    pub origin: [f64; 2],
    /// Size (mm).
    pub size: [f64; 2],
    /// In-plane rotation (radians).
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: f64,
    /// Channels along module x.
    #[cfg_attr(feature = "serde", serde(default = "default_channels"))]
    pub channels_x: usize,
    /// Channels along module y.
    #[cfg_attr(feature = "serde", serde(default = "default_channels"))]
    pub channels_y: usize,
}

#[cfg(feature = "serde")]
fn default_normal() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

#[cfg(feature = "serde")]
fn default_channels() -> usize {
    1
}
