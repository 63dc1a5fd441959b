//! Keeps hits that fall inside an instrumented readout volume.

use std::sync::Arc;

use hitflow_core::{Event, HitCloud, ReadoutGeometry};

use crate::process::entry;
use crate::{Error, Parameters, Process, ProcessContext, Result};

/// Filters hits against the readout geometry.
///
/// A hit is appended once for every plane whose module contains it, so a
/// hit inside two overlapping planes appears twice in the output. Events
/// left without hits are dropped.
#[derive(Debug, Clone)]
pub struct Fiducialization {
    name: String,
    geometry: Option<Arc<ReadoutGeometry>>,
}

impl Fiducialization {
    /// Registry key.
    pub const TYPE: &'static str = "fiducialization";
}

impl Default for Fiducialization {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            geometry: None,
        }
    }
}

impl Process for Fiducialization {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn configure(&mut self, _params: &Parameters<'_>) -> Result<()> {
        Ok(())
    }

    fn init_process(&mut self, ctx: &ProcessContext) -> Result<()> {
        let geometry = ctx.require_geometry(&self.name)?;
        if geometry.is_empty() {
            return Err(Error::GeometryNotReady {
                stage: self.name.clone(),
            });
        }
        self.geometry = Some(geometry);
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Option<Event> {
        let geometry = self.geometry.as_ref()?;
        let input = event.hit_cloud()?;

        let mut output = HitCloud::with_capacity(input.len());
        for hit in input.iter() {
            for _ in geometry.find_containing(hit.position()) {
                output.add_hit(hit);
            }
        }

        if output.is_empty() {
            log::debug!("event {}: no hit inside the readout", event.id);
            return None;
        }
        Some(event.with_payload(hitflow_core::EventPayload::Hits(output)))
    }

    fn end_process(&mut self) {
        self.geometry = None;
    }

    fn metadata(&self) -> Vec<(String, String)> {
        self.geometry
            .as_ref()
            .map(|g| vec![entry("planes", g.len())])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitflow_core::{Hit, HitType, ReadoutModule, ReadoutPlane, Vec2, Vec3};

    fn plane(id: usize, z: f64, normal: Vec3) -> ReadoutPlane {
        let mut plane = ReadoutPlane::new(id, Vec3::new(0.0, 0.0, z), normal, 10.0).unwrap();
        plane.add_module(
            ReadoutModule::new(0, Vec2::new(-5.0, -5.0), Vec2::new(10.0, 10.0), 0.0).unwrap(),
        );
        plane
    }

    fn initialised(geometry: ReadoutGeometry) -> Fiducialization {
        let mut process = Fiducialization::default();
        process
            .init_process(&ProcessContext::new().with_geometry(Arc::new(geometry)))
            .unwrap();
        process
    }

    #[test]
    fn test_requires_geometry() {
        let mut process = Fiducialization::default();
        assert!(matches!(
            process.init_process(&ProcessContext::new()),
            Err(Error::GeometryNotReady { .. })
        ));
    }

    #[test]
    fn test_keeps_inside_hits_with_attributes() {
        let mut geometry = ReadoutGeometry::new();
        geometry.add_plane(plane(0, 0.0, Vec3::Z));
        let mut process = initialised(geometry);

        let cloud: HitCloud = [
            Hit::new(0.0, 0.0, 5.0, 1.0).with_time(2.0).with_type(HitType::Veto),
            Hit::new(20.0, 0.0, 5.0, 1.0),
            Hit::new(0.0, 0.0, 15.0, 1.0),
        ]
        .into_iter()
        .collect();
        let event = process.process_event(Event::hits(3, cloud)).unwrap();
        let kept = event.hit_cloud().unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.hit(0).hit_type, HitType::Veto);
        assert!((kept.hit(0).time - 2.0).abs() < f64::EPSILON);
        assert_eq!(event.id, 3);
    }

    #[test]
    fn test_overlapping_planes_duplicate_hits() {
        let mut geometry = ReadoutGeometry::new();
        geometry.add_plane(plane(0, 0.0, Vec3::Z));
        geometry.add_plane(plane(1, 12.0, -Vec3::Z));
        let mut process = initialised(geometry);

        let cloud: HitCloud = std::iter::once(Hit::new(1.0, 1.0, 6.0, 2.0)).collect();
        let event = process.process_event(Event::hits(0, cloud)).unwrap();
        let kept = event.hit_cloud().unwrap();
        assert_eq!(kept.len(), 2);
        assert!((kept.total_energy() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_output_dropped() {
        let mut geometry = ReadoutGeometry::new();
        geometry.add_plane(plane(0, 0.0, Vec3::Z));
        let mut process = initialised(geometry);
        let cloud: HitCloud = std::iter::once(Hit::new(100.0, 0.0, 5.0, 1.0)).collect();
        assert!(process.process_event(Event::hits(0, cloud)).is_none());
    }
}
