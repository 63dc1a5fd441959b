//! Energy scale processes: normalisation and resolution smearing.

use std::fmt;

use hitflow_core::{Event, HitType};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::process::entry;
use crate::random::gaussian;
use crate::{Parameters, Process, ProcessContext, Quantity, Result};

/// Multiplies every hit energy by a constant factor.
#[derive(Debug, Clone)]
pub struct HitsNormalization {
    name: String,
    factor: f64,
}

impl HitsNormalization {
    /// Registry key.
    pub const TYPE: &'static str = "hitsNormalization";

    /// Creates the stage with the given factor.
    #[must_use]
    pub fn new(factor: f64) -> Self {
        Self {
            name: Self::TYPE.to_string(),
            factor,
        }
    }
}

impl Default for HitsNormalization {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Process for HitsNormalization {
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
        let factor = params.number("factor", self.factor)?;
        if !(factor >= 0.0 && factor.is_finite()) {
            return Err(params.invalid("factor", format!("must be non-negative, got {factor}")));
        }
        self.factor = factor;
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        event.hit_cloud_mut()?.scale_energy(self.factor);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![entry("factor", self.factor)]
    }
}

/// Which hits a smearing stage acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelType {
    /// Every hit except veto hits.
    #[default]
    Tpc,
    /// Veto hits only.
    Veto,
}

impl ChannelType {
    fn applies_to(self, hit_type: HitType) -> bool {
        match self {
            Self::Tpc => hit_type != HitType::Veto,
            Self::Veto => hit_type == HitType::Veto,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tpc => f.write_str("tpc"),
            Self::Veto => f.write_str("veto"),
        }
    }
}

/// Applies a Gaussian energy resolution, one gain per event.
///
/// The relative width scales as `1/sqrt(E)`:
/// `sigma = resolution * sqrt(E_ref / E) / 2.35 / 100`, with `resolution`
/// the FWHM in percent at `E_ref` and `E` the event's total energy.
#[derive(Debug, Clone)]
pub struct HitsSmearing {
    name: String,
    resolution: f64,
    energy_reference: f64,
    channel_type: ChannelType,
    seed: u64,
    rng: StdRng,
}

impl HitsSmearing {
    /// Registry key.
    pub const TYPE: &'static str = "hitsSmearing";

    /// Sets the FWHM resolution (%) at the reference energy (keV).
    #[must_use]
    pub fn with_resolution(mut self, resolution: f64, energy_reference: f64) -> Self {
        self.resolution = resolution;
        self.energy_reference = energy_reference;
        self
    }

    /// Selects the smeared hits.
    #[must_use]
    pub fn with_channel_type(mut self, channel_type: ChannelType) -> Self {
        self.channel_type = channel_type;
        self
    }

    /// Sets the seed (0 derives from the worker seed).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Relative gain width for an event of total energy `energy`.
    #[must_use]
    pub fn sigma(&self, energy: f64) -> f64 {
        self.resolution * (self.energy_reference / energy).sqrt() / 2.35 / 100.0
    }
}

impl Default for HitsSmearing {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            resolution: 15.0,
            energy_reference: 5.9,
            channel_type: ChannelType::Tpc,
            seed: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }
}

impl Process for HitsSmearing {
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
        let resolution = params.number("resolutionAtEref", self.resolution)?;
        if !(resolution >= 0.0 && resolution.is_finite()) {
            return Err(params.invalid("resolutionAtEref", "must be non-negative"));
        }
        let energy_reference =
            params.quantity("energyReference", Quantity::Energy, self.energy_reference)?;
        if !(energy_reference > 0.0 && energy_reference.is_finite()) {
            return Err(params.invalid("energyReference", "must be positive"));
        }
        let channel = params.text("channelType", &self.channel_type.to_string())?;
        self.channel_type = match channel.trim().to_ascii_lowercase().as_str() {
            "tpc" => ChannelType::Tpc,
            "veto" => ChannelType::Veto,
            other => {
                return Err(params.invalid(
                    "channelType",
                    format!("'{other}' is not a channel type (tpc, veto)"),
                ))
            }
        };
        self.resolution = resolution;
        self.energy_reference = energy_reference;
        self.seed = params.integer("seed", self.seed)?;
        Ok(())
    }

    fn init_process(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.rng = ctx.rng(self.seed);
        Ok(())
    }

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud_mut()?;
        let total = cloud.total_energy();
        if total <= 0.0 {
            return Some(event);
        }
        let sigma = self.sigma(total);
        let gain = gaussian(&mut self.rng, 1.0, sigma);
        for i in 0..cloud.len() {
            if self.channel_type.applies_to(cloud.hit_type(i)) {
                cloud.set_energy(i, cloud.energy(i) * gain);
            }
        }
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("resolutionAtEref", format!("{} %", self.resolution)),
            entry("energyReference", format!("{} keV", self.energy_reference)),
            entry("channelType", self.channel_type),
            entry("seed", self.seed),
        ]
    }
}
