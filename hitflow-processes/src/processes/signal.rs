//! Mapping between hit clouds and per-channel readout signals.

use std::sync::Arc;

use hitflow_core::{Event, EventKind, EventPayload, Hit, HitCloud, ReadoutGeometry, SignalEvent};

use crate::process::entry;
use crate::{Parameters, Process, ProcessContext, Quantity, Result};

fn positive(params: &Parameters<'_>, key: &str, value: f64) -> Result<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(params.invalid(key, format!("must be positive, got {value}")))
    }
}

/// Converts hits into channel signals.
///
/// Every hit is assigned to the readout channel below it; its arrival time
/// is the drift distance over the drift velocity, added to the hit time and
/// quantised down to the sampling period. Hits outside the readout are
/// discarded and events without any signal are dropped.
#[derive(Debug, Clone)]
pub struct HitsToSignal {
    name: String,
    drift_velocity: f64,
    sampling: f64,
    geometry: Option<Arc<ReadoutGeometry>>,
}

impl HitsToSignal {
    /// Registry key.
    pub const TYPE: &'static str = "hitsToSignal";

    /// Sets drift velocity (mm/us) and sampling period (us).
    #[must_use]
    pub fn with_timing(mut self, drift_velocity: f64, sampling: f64) -> Self {
        self.drift_velocity = drift_velocity;
        self.sampling = sampling;
        self
    }
}

impl Default for HitsToSignal {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            drift_velocity: 1.0,
            sampling: 0.1,
            geometry: None,
        }
    }
}

impl Process for HitsToSignal {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn output_kind(&self) -> EventKind {
        EventKind::Signal
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        let velocity = params.quantity("driftVelocity", Quantity::Velocity, self.drift_velocity)?;
        let sampling = params.quantity("sampling", Quantity::Time, self.sampling)?;
        self.drift_velocity = positive(params, "driftVelocity", velocity)?;
        self.sampling = positive(params, "sampling", sampling)?;
        Ok(())
    }

    fn init_process(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.geometry = Some(ctx.require_geometry(&self.name)?);
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Option<Event> {
        let geometry = self.geometry.as_ref()?;
        let cloud = event.hit_cloud()?;

        let mut signals = SignalEvent::default();
        let mut outside = 0usize;
        for hit in cloud.iter() {
            let position = hit.position();
            let Some((p, m, c)) = geometry.find_channel(position) else {
                outside += 1;
                continue;
            };
            let distance = geometry.planes()[p].distance_to_plane(position);
            let time = hit.time + distance / self.drift_velocity;
            let sampled = (time / self.sampling).floor() * self.sampling;
            signals.add_sample(p, m, c, sampled, hit.energy);
        }

        if outside > 0 {
            log::debug!("event {}: {outside} hits outside the readout", event.id);
        }
        if signals.is_empty() {
            return None;
        }
        Some(event.with_payload(EventPayload::Signal(signals)))
    }

    fn end_process(&mut self) {
        self.geometry = None;
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("driftVelocity", format!("{} mm/us", self.drift_velocity)),
            entry("sampling", format!("{} us", self.sampling)),
        ]
    }
}

/// Converts channel signals back into 3D hits.
///
/// Each sample above the threshold becomes a hit at its channel centre,
/// `time * drift_velocity` above the plane.
#[derive(Debug, Clone)]
pub struct SignalToHits {
    name: String,
    drift_velocity: f64,
    threshold: f64,
    geometry: Option<Arc<ReadoutGeometry>>,
}

impl SignalToHits {
    /// Registry key.
    pub const TYPE: &'static str = "signalToHits";

    /// Sets the drift velocity (mm/us).
    #[must_use]
    pub fn with_drift_velocity(mut self, drift_velocity: f64) -> Self {
        self.drift_velocity = drift_velocity;
        self
    }

    /// Sets the amplitude threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Default for SignalToHits {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            drift_velocity: 1.0,
            threshold: 0.0,
            geometry: None,
        }
    }
}

impl Process for SignalToHits {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn input_kind(&self) -> EventKind {
        EventKind::Signal
    }

    fn configure(&mut self, params: &Parameters<'_>) -> Result<()> {
        let velocity = params.quantity("driftVelocity", Quantity::Velocity, self.drift_velocity)?;
        self.drift_velocity = positive(params, "driftVelocity", velocity)?;
        self.threshold = params.number("threshold", self.threshold)?;
        Ok(())
    }

    fn init_process(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.geometry = Some(ctx.require_geometry(&self.name)?);
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Option<Event> {
        let geometry = self.geometry.as_ref()?;
        let signals = event.signals()?;

        let mut cloud = HitCloud::new();
        for signal in &signals.signals {
            let Some(plane) = geometry.plane(signal.plane) else {
                log::debug!("event {}: signal on unknown plane {}", event.id, signal.plane);
                continue;
            };
            let Some(center) = plane.channel_center(signal.module, signal.channel) else {
                log::debug!(
                    "event {}: unknown channel {}/{} on plane {}",
                    event.id,
                    signal.module,
                    signal.channel,
                    signal.plane
                );
                continue;
            };
            for &(time, amplitude) in &signal.samples {
                if amplitude > self.threshold {
                    let position = plane.to_world(center, time * self.drift_velocity);
                    cloud.add_hit(Hit::at(position, amplitude).with_time(time));
                }
            }
        }

        if cloud.is_empty() {
            return None;
        }
        Some(event.with_payload(EventPayload::Hits(cloud)))
    }

    fn end_process(&mut self) {
        self.geometry = None;
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("driftVelocity", format!("{} mm/us", self.drift_velocity)),
            entry("threshold", self.threshold),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessConfig;
    use approx::assert_abs_diff_eq;
    use hitflow_core::{ReadoutModule, ReadoutPlane, Vec2, Vec3};

    fn context() -> ProcessContext {
        let mut plane = ReadoutPlane::new(0, Vec3::ZERO, Vec3::Z, 10.0).unwrap();
        plane.add_module(
            ReadoutModule::new(0, Vec2::new(-50.0, -50.0), Vec2::new(100.0, 100.0), 0.0)
                .unwrap()
                .with_channels(10, 10)
                .unwrap(),
        );
        let mut geometry = ReadoutGeometry::new();
        geometry.add_plane(plane);
        ProcessContext::new().with_geometry(Arc::new(geometry))
    }

    fn event() -> Event {
        let cloud: HitCloud = [
            Hit::new(-45.0, -35.0, 2.25, 1.0),
            Hit::new(-44.0, -36.0, 2.21, 2.0),
            Hit::new(5.0, 5.0, 7.0, 4.0),
            Hit::new(500.0, 0.0, 5.0, 8.0),
        ]
        .into_iter()
        .collect();
        Event::hits(11, cloud)
    }

    #[test]
    fn test_hits_to_signal_channels_and_time() {
        let mut process = HitsToSignal::default();
        process.init_process(&context()).unwrap();
        let out = process.process_event(event()).unwrap();
        let signals = out.signals().unwrap();

        assert_eq!(signals.len(), 2);
        let first = &signals.signals[0];
        assert_eq!((first.plane, first.module, first.channel), (0, 0, 10));
        assert_eq!(first.samples.len(), 1);
        assert_abs_diff_eq!(first.samples[0].0, 2.2, epsilon = 1e-9);
        assert_abs_diff_eq!(first.samples[0].1, 3.0);
        // the hit outside every module is lost
        assert_abs_diff_eq!(signals.integral(), 7.0);
    }

    #[test]
    fn test_round_trip_through_signals() {
        let mut to_signal = HitsToSignal::default();
        let mut to_hits = SignalToHits::default();
        let ctx = context();
        to_signal.init_process(&ctx).unwrap();
        to_hits.init_process(&ctx).unwrap();

        let signal = to_signal.process_event(event()).unwrap();
        let hits = to_hits.process_event(signal).unwrap();
        assert_eq!(hits.id, 11);
        let cloud = hits.hit_cloud().unwrap();
        assert_eq!(cloud.len(), 2);
        let p = cloud.position(0);
        assert_abs_diff_eq!(p.x, -45.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, -35.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.z, 2.2, epsilon = 1e-9);
        assert_abs_diff_eq!(cloud.total_energy(), 7.0);
    }

    #[test]
    fn test_threshold_and_empty_output() {
        let mut to_signal = HitsToSignal::default();
        let mut to_hits = SignalToHits::default().with_threshold(5.0);
        let ctx = context();
        to_signal.init_process(&ctx).unwrap();
        to_hits.init_process(&ctx).unwrap();
        let signal = to_signal.process_event(event()).unwrap();
        assert!(to_hits.process_event(signal).is_none());

        let outside: HitCloud = std::iter::once(Hit::new(0.0, 0.0, 50.0, 1.0)).collect();
        assert!(to_signal.process_event(Event::hits(0, outside)).is_none());
    }

    #[test]
    fn test_velocity_units() {
        let config = ProcessConfig::new(HitsToSignal::TYPE)
            .with_parameter("driftVelocity", "2cm/us")
            .with_parameter("sampling", "50ns");
        let mut process = HitsToSignal::default();
        process.configure(&config.parameters()).unwrap();
        assert_abs_diff_eq!(process.drift_velocity, 20.0);
        assert_abs_diff_eq!(process.sampling, 0.05, epsilon = 1e-15);

        let bad = ProcessConfig::new(HitsToSignal::TYPE).with_parameter("sampling", 0);
        assert!(process.configure(&bad.parameters()).is_err());
    }
}
