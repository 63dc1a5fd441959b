//! Hit-count reduction stage.

use hitflow_core::{Event, ReductionConfig};

use crate::process::entry;
use crate::{Parameters, Process, Quantity, Result};

/// Merges nearby hits until the cloud is small enough.
///
/// Observables: `initialHits`, `finalHits`.
#[derive(Debug, Clone)]
pub struct HitsReduction {
    name: String,
    config: ReductionConfig,
}

impl HitsReduction {
    /// Registry key.
    pub const TYPE: &'static str = "hitsReduction";

    /// Creates the stage with the given reduction parameters.
    #[must_use]
    pub fn new(config: ReductionConfig) -> Self {
        Self {
            name: Self::TYPE.to_string(),
            config,
        }
    }

    /// Reduction parameters.
    #[must_use]
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }
}

impl Default for HitsReduction {
    fn default() -> Self {
        Self::new(ReductionConfig::default())
    }
}

impl Process for HitsReduction {
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
        let defaults = ReductionConfig::default();
        let starting =
            params.quantity("startingDistance", Quantity::Length, defaults.starting_distance)?;
        if !(starting > 0.0 && starting.is_finite()) {
            return Err(params.invalid(
                "startingDistance",
                format!("must be positive, got {starting}"),
            ));
        }
        let minimum =
            params.quantity("minimumDistance", Quantity::Length, defaults.minimum_distance)?;
        if !minimum.is_finite() {
            return Err(params.invalid("minimumDistance", format!("must be finite, got {minimum}")));
        }
        let factor = params.number("distanceStepFactor", defaults.distance_step_factor)?;
        if !(factor > 1.0 && factor.is_finite()) {
            return Err(params.invalid(
                "distanceStepFactor",
                format!("must be greater than 1, got {factor}"),
            ));
        }

        self.config = ReductionConfig::new()
            .with_starting_distance(starting)
            .with_minimum_distance(minimum)
            .with_distance_step_factor(factor)
            .with_max_nodes(params.count("maxNodes", defaults.max_nodes)?);
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud_mut()?;
        if cloud.is_empty() {
            return None;
        }
        let stats = match cloud.reduce(&self.config) {
            Ok(stats) => stats,
            Err(err) => {
                log::warn!("event {}: {err}", event.id);
                return None;
            }
        };
        log::debug!(
            "event {}: {} -> {} hits in {} passes",
            event.id,
            stats.initial_hits,
            stats.final_hits,
            stats.passes
        );
        event
            .analysis
            .set(&self.name, "initialHits", stats.initial_hits as f64);
        event
            .analysis
            .set(&self.name, "finalHits", stats.final_hits as f64);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("startingDistance", format!("{} mm", self.config.starting_distance)),
            entry("minimumDistance", format!("{} mm", self.config.minimum_distance)),
            entry("distanceStepFactor", self.config.distance_step_factor),
            entry("maxNodes", self.config.max_nodes),
        ]
    }
}
