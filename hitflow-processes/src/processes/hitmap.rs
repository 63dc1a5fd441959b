//! Named, ordered hit transformations.

use std::fmt;

use hitflow_core::{Event, Vec3};

use crate::process::entry;
use crate::{Parameters, Process, Quantity, Result};

/// Kind of a [`HitTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Mirror across the plane through `position` with normal `vector`.
    Specular,
    /// Rotate by `angle` about `vector` through `position`.
    Rotation,
    /// Shift by `vector`.
    Translation,
}

impl TransformKind {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "specular" => Some(Self::Specular),
            "rotation" => Some(Self::Rotation),
            "translation" => Some(Self::Translation),
            _ => None,
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specular => f.write_str("specular"),
            Self::Rotation => f.write_str("rotation"),
            Self::Translation => f.write_str("translation"),
        }
    }
}

/// A single named transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct HitTransform {
    /// Name referenced by the `order` list.
    pub name: String,
    /// Transformation kind.
    pub kind: TransformKind,
    /// Rotation centre or point on the mirror plane.
    pub position: Vec3,
    /// Translation, rotation axis or mirror normal.
    pub vector: Vec3,
    /// Rotation angle (radians).
    pub angle: f64,
}

impl HitTransform {
    /// Applies the transformation to a point.
    #[must_use]
    pub fn apply(&self, p: Vec3) -> Vec3 {
        match self.kind {
            TransformKind::Specular => match self.vector.unit() {
                Some(n) => {
                    let v = p - self.position;
                    self.position + v - n * (2.0 * v.dot(&n))
                }
                None => p,
            },
            TransformKind::Rotation => (p - self.position).rotate(self.angle, &self.vector) + self.position,
            TransformKind::Translation => p + self.vector,
        }
    }

    fn from_parameters(params: &Parameters<'_>, index: usize) -> Result<Self> {
        let name = params.text("name", &format!("t{index}"))?;
        let kind_text = params.text("type", "")?;
        let kind = TransformKind::parse(&kind_text).ok_or_else(|| {
            params.invalid(
                "transformations",
                format!("'{name}' has unknown type '{kind_text}' (specular, rotation, translation)"),
            )
        })?;
        Ok(Self {
            kind,
            position: params.vector("position", Quantity::Length, Vec3::ZERO)?,
            vector: params.vector("vector", Quantity::Length, Vec3::Z)?,
            angle: params.quantity("angle", Quantity::Angle, 0.0)?,
            name,
        })
    }
}

/// Applies a list of transformations, in a configurable order, to every hit.
///
/// Observables: `xMean`, `yMean`, `zMean` of the transformed cloud.
#[derive(Debug, Clone)]
pub struct HitmapTransformation {
    name: String,
    transforms: Vec<HitTransform>,
    order: Vec<usize>,
}

impl HitmapTransformation {
    /// Registry key.
    pub const TYPE: &'static str = "hitmapTransformation";

    /// Creates the stage, applying `transforms` in declaration order.
    #[must_use]
    pub fn new(transforms: Vec<HitTransform>) -> Self {
        let order = (0..transforms.len()).collect();
        Self {
            name: Self::TYPE.to_string(),
            transforms,
            order,
        }
    }

    /// Transformations in application order.
    pub fn ordered(&self) -> impl Iterator<Item = &HitTransform> {
        self.order.iter().map(|&i| &self.transforms[i])
    }
}

impl Default for HitmapTransformation {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Process for HitmapTransformation {
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
        let transforms = params
            .records("transformations")?
            .iter()
            .enumerate()
            .map(|(i, record)| HitTransform::from_parameters(record, i))
            .collect::<Result<Vec<_>>>()?;

        let order = match params.string_list("order")? {
            None => (0..transforms.len()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    transforms
                        .iter()
                        .position(|t| &t.name == name)
                        .ok_or_else(|| params.invalid("order", format!("no transformation named '{name}'")))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        self.transforms = transforms;
        self.order = order;
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud_mut()?;
        let transforms: Vec<&HitTransform> = self.order.iter().map(|&i| &self.transforms[i]).collect();
        cloud.map_positions(|p| transforms.iter().fold(p, |acc, t| t.apply(acc)));
        if let Some(mean) = cloud.mean_position() {
            event.analysis.set(&self.name, "xMean", mean.x);
            event.analysis.set(&self.name, "yMean", mean.y);
            event.analysis.set(&self.name, "zMean", mean.z);
        }
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        self.ordered()
            .map(|t| {
                entry(
                    &t.name,
                    format!(
                        "{} position=({}, {}, {}) vector=({}, {}, {}) angle={}",
                        t.kind, t.position.x, t.position.y, t.position.z, t.vector.x, t.vector.y, t.vector.z, t.angle
                    ),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessConfig;
    use approx::assert_abs_diff_eq;
    use hitflow_core::{Hit, HitCloud};
    use serde_json::json;

    fn config(order: Option<&[&str]>) -> ProcessConfig {
        let mut config = ProcessConfig::new(HitmapTransformation::TYPE).with_parameter(
            "transformations",
            json!([
                { "name": "shift", "type": "translation", "vector": "(1, 0, 0) cm" },
                { "name": "turn", "type": "rotation", "vector": [0, 0, 1], "angle": "90deg" },
                { "name": "mirror", "type": "specular", "position": [0, 0, 0], "vector": [1, 0, 0] }
            ]),
        );
        if let Some(order) = order {
            config = config.with_parameter("order", json!(order));
        }
        config
    }

    fn apply(config: &ProcessConfig) -> Vec3 {
        let mut process = HitmapTransformation::default();
        process.configure(&config.parameters()).unwrap();
        let cloud: HitCloud = std::iter::once(Hit::new(0.0, 0.0, 0.0, 1.0)).collect();
        let event = process.process_event(Event::hits(0, cloud)).unwrap();
        event.hit_cloud().unwrap().position(0)
    }

    #[test]
    fn test_declaration_order() {
        // (0,0,0) -> (10,0,0) -> (0,10,0) -> (0,10,0)
        let p = apply(&config(None));
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_explicit_order() {
        // (0,0,0) -> mirror (0,0,0) -> turn (0,0,0) -> shift (10,0,0)
        let p = apply(&config(Some(&["mirror", "turn", "shift"])));
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-9);

        // shift then mirror across x = 0
        let p = apply(&config(Some(&["shift", "mirror"])));
        assert_abs_diff_eq!(p.x, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mean_observables() {
        let mut process = HitmapTransformation::default();
        process.configure(&config(Some(&["shift"])).parameters()).unwrap();
        let cloud: HitCloud = [Hit::new(0.0, 0.0, 0.0, 1.0), Hit::new(2.0, 0.0, 4.0, 1.0)]
            .into_iter()
            .collect();
        let event = process.process_event(Event::hits(0, cloud)).unwrap();
        assert_abs_diff_eq!(event.analysis.get("hitmapTransformation_xMean").unwrap(), 11.0);
        assert_abs_diff_eq!(event.analysis.get("hitmapTransformation_zMean").unwrap(), 2.0);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let mut process = HitmapTransformation::default();
        assert!(process.configure(&config(Some(&["nope"])).parameters()).is_err());

        let bad = ProcessConfig::new(HitmapTransformation::TYPE)
            .with_parameter("transformations", json!([{ "name": "x", "type": "shear" }]));
        assert!(process.configure(&bad.parameters()).is_err());
    }
}
