//! Rigid transformations of whole hit clouds.

use hitflow_core::{Event, HitType, Vec3};

use crate::process::entry;
use crate::{Parameters, Process, Quantity, Result};

fn fmt_vec(v: Vec3) -> String {
    format!("({}, {}, {})", v.x, v.y, v.z)
}

/// Rotates every hit about an axis through a centre.
///
/// Clouds without any 3D hit are passed through unchanged, since a
/// rotation would mix a projection's meaningless coordinate into the
/// measured ones.
#[derive(Debug, Clone)]
pub struct HitsRotation {
    name: String,
    angle: f64,
    center: Vec3,
    axis: Vec3,
}

impl HitsRotation {
    /// Registry key.
    pub const TYPE: &'static str = "hitsRotation";

    /// Creates a rotation of `angle` radians about `axis` through `center`.
    #[must_use]
    pub fn new(angle: f64, center: Vec3, axis: Vec3) -> Self {
        Self {
            name: Self::TYPE.to_string(),
            angle,
            center,
            axis,
        }
    }
}

impl Default for HitsRotation {
    fn default() -> Self {
        Self::new(0.0, Vec3::ZERO, Vec3::Z)
    }
}

impl Process for HitsRotation {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        self.angle = params.quantity("angle", Quantity::Angle, self.angle)?;
        self.center = params.vector("center", Quantity::Length, self.center)?;
        self.axis = params.vector("axis", Quantity::Dimensionless, self.axis)?;
        if self.axis.unit().is_none() {
            return Err(params.invalid("axis", "rotation axis must be a non-zero vector"));
        }
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let id = event.id;
        let cloud = event.hit_cloud_mut()?;
        if !cloud.is_empty() && cloud.count_type(HitType::Xyz) == 0 {
            log::warn!("event {id}: no 3D hits, rotation skipped");
            return Some(event);
        }
        cloud.rotate(self.center, self.axis, self.angle);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("angle", format!("{} rad", self.angle)),
            entry("center", fmt_vec(self.center)),
            entry("axis", fmt_vec(self.axis)),
        ]
    }
}

/// Shifts every hit by a fixed vector.
#[derive(Debug, Clone)]
pub struct HitsTranslation {
    name: String,
    translation: Vec3,
}

impl HitsTranslation {
    /// Registry key.
    pub const TYPE: &'static str = "hitsTranslation";

    /// Sets the translation.
    #[must_use]
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }
}

impl Default for HitsTranslation {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            translation: Vec3::ZERO,
        }
    }
}

impl Process for HitsTranslation {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        self.translation = params.vector("translation", Quantity::Length, self.translation)?;
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        event.hit_cloud_mut()?.translate(self.translation);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![entry("translation", fmt_vec(self.translation))]
    }
}

/// Mirrors every hit across a plane.
#[derive(Debug, Clone)]
pub struct HitsSpecular {
    name: String,
    position: Vec3,
    normal: Vec3,
}

impl HitsSpecular {
    /// Registry key.
    pub const TYPE: &'static str = "hitsSpecular";

    /// Creates a reflection across the plane through `position`.
    #[must_use]
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            name: Self::TYPE.to_string(),
            position,
            normal,
        }
    }
}

impl Default for HitsSpecular {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z)
    }
}

impl Process for HitsSpecular {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        self.position = params.vector("position", Quantity::Length, self.position)?;
        self.normal = params.vector("normal", Quantity::Dimensionless, self.normal)?;
        if self.normal.unit().is_none() {
            return Err(params.invalid("normal", "plane normal must be a non-zero vector"));
        }
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        event.hit_cloud_mut()?.reflect(self.position, self.normal);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("position", fmt_vec(self.position)),
            entry("normal", fmt_vec(self.normal)),
        ]
    }
}

/// Rotates about the cloud's energy-weighted centre, then translates.
///
/// Rotations are applied about X, then Y, then Z.
#[derive(Debug, Clone)]
pub struct HitsRotateAndTranslate {
    name: String,
    rotation: Vec3,
    translation: Vec3,
}

impl HitsRotateAndTranslate {
    /// Registry key.
    pub const TYPE: &'static str = "hitsRotateAndTranslate";

    /// Creates the stage; `rotation` holds the X, Y and Z angles.
    #[must_use]
    pub fn new(rotation: Vec3, translation: Vec3) -> Self {
        Self {
            name: Self::TYPE.to_string(),
            rotation,
            translation,
        }
    }
}

impl Default for HitsRotateAndTranslate {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

impl Process for HitsRotateAndTranslate {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        self.rotation = Vec3::new(
            params.quantity("rotationX", Quantity::Angle, self.rotation.x)?,
            params.quantity("rotationY", Quantity::Angle, self.rotation.y)?,
            params.quantity("rotationZ", Quantity::Angle, self.rotation.z)?,
        );
        self.translation = params.vector("translation", Quantity::Length, self.translation)?;
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud_mut()?;
        if cloud.is_empty() {
            return None;
        }
        // zero-energy clouds fall back to the origin
        let center = cloud.mean_position().unwrap_or(Vec3::ZERO);
        let (rotation, translation) = (self.rotation, self.translation);
        cloud.map_positions(|p| {
            let d = (p - center)
                .rotate_x(rotation.x)
                .rotate_y(rotation.y)
                .rotate_z(rotation.z);
            center + d + translation
        });
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("rotation", fmt_vec(self.rotation)),
            entry("translation", fmt_vec(self.translation)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessConfig;
    use approx::assert_abs_diff_eq;
    use hitflow_core::{Hit, HitCloud};
    use std::f64::consts::FRAC_PI_2;

    fn cloud() -> HitCloud {
        [
            Hit::new(1.0, 0.0, 0.0, 1.0),
            Hit::new(0.0, 2.0, 1.0, 3.0),
            Hit::new(-1.0, -1.0, 4.0, 2.0),
        ]
        .into_iter()
        .collect()
    }

    fn positions(event: &Event) -> Vec<Vec3> {
        let cloud = event.hit_cloud().unwrap();
        (0..cloud.len()).map(|i| cloud.position(i)).collect()
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let mut process = HitsRotation::new(FRAC_PI_2, Vec3::ZERO, Vec3::Z);
        let event = process.process_event(Event::hits(0, cloud())).unwrap();
        let p = positions(&event);
        assert_abs_diff_eq!(p[0].x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[0].y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1].x, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1].z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_skips_projection_clouds() {
        let projected: HitCloud = [Hit::new(1.0, 0.0, 2.0, 1.0).with_type(HitType::Xz)]
            .into_iter()
            .collect();
        let mut process = HitsRotation::new(1.0, Vec3::ZERO, Vec3::Z);
        let event = process.process_event(Event::hits(0, projected.clone())).unwrap();
        assert_eq!(event.hit_cloud(), Some(&projected));
    }

    #[test]
    fn test_rotation_configure_degrees() {
        let config = ProcessConfig::new(HitsRotation::TYPE)
            .with_parameter("angle", "90deg")
            .with_parameter("axis", "(0, 0, 0)");
        let mut process = HitsRotation::default();
        assert!(process.configure(&config.parameters()).is_err());
    }

    #[test]
    fn test_translation_round_trip() {
        let v = Vec3::new(1.5, -2.0, 7.0);
        let mut forward = HitsTranslation::default().with_translation(v);
        let mut back = HitsTranslation::default().with_translation(-v);
        let original = cloud();
        let event = back
            .process_event(forward.process_event(Event::hits(0, original.clone())).unwrap())
            .unwrap();
        let restored = event.hit_cloud().unwrap();
        for i in 0..original.len() {
            assert_abs_diff_eq!(restored.position(i).x, original.position(i).x, epsilon = 1e-12);
            assert_abs_diff_eq!(restored.position(i).y, original.position(i).y, epsilon = 1e-12);
            assert_abs_diff_eq!(restored.position(i).z, original.position(i).z, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_specular_mirrors_z() {
        let mut process = HitsSpecular::new(Vec3::new(0.0, 0.0, 1.0), Vec3::Z);
        let event = process.process_event(Event::hits(0, cloud())).unwrap();
        let p = positions(&event);
        assert_abs_diff_eq!(p[0].z, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1].z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2].z, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2].x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_and_translate_keeps_shifted_centroid() {
        let original = cloud();
        let center = original.mean_position().unwrap();
        let shift = Vec3::new(10.0, 0.0, -3.0);
        let mut process = HitsRotateAndTranslate::new(Vec3::new(0.3, -0.2, 1.1), shift);
        let event = process.process_event(Event::hits(0, original.clone())).unwrap();
        let moved = event.hit_cloud().unwrap().mean_position().unwrap();
        assert_abs_diff_eq!(moved.x, center.x + shift.x, epsilon = 1e-9);
        assert_abs_diff_eq!(moved.y, center.y + shift.y, epsilon = 1e-9);
        assert_abs_diff_eq!(moved.z, center.z + shift.z, epsilon = 1e-9);
        // distances to the centre are preserved
        let cloud = event.hit_cloud().unwrap();
        for i in 0..cloud.len() {
            let before = (original.position(i) - center).mag();
            let after = (cloud.position(i) - moved).mag();
            assert_abs_diff_eq!(before, after, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rotate_and_translate_drops_empty() {
        let mut process = HitsRotateAndTranslate::default();
        assert!(process.process_event(Event::hits(0, HitCloud::new())).is_none());
    }
}
