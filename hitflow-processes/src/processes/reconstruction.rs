//! 3D hit reconstruction from XZ and YZ projections.
//!
//! Each projection is cut into z slices. Inside a slice every pairing of an
//! XZ hit with a YZ hit is a candidate 3D point, and the slicing whose
//! candidates carry the least combinatorial ambiguity is kept.

use std::collections::BTreeMap;

use hitflow_core::{Event, EventPayload, Hit, HitCloud, HitType};

use crate::process::entry;
use crate::{Parameters, Process, Quantity, Result};

/// `ln C(n, m)`, summed term by term. `None` when `m > n`.
#[must_use]
pub fn log_ambiguity(n: u64, m: u64) -> Option<f64> {
    if m > n {
        return None;
    }
    let m = m.min(n - m);
    Some(
        (0..m)
            .map(|k| ((n - k) as f64).ln() - ((k + 1) as f64).ln())
            .sum(),
    )
}

/// `C(n, m)` as a float. `None` when `m > n`.
#[must_use]
pub fn ambiguity(n: u64, m: u64) -> Option<f64> {
    log_ambiguity(n, m).map(f64::exp)
}

#[derive(Debug, Default)]
struct Slice {
    xz: Vec<usize>,
    yz: Vec<usize>,
}

impl Slice {
    fn is_matched(&self) -> bool {
        !self.xz.is_empty() && !self.yz.is_empty()
    }

    fn log_ambiguity(&self) -> f64 {
        let (nx, ny) = (self.xz.len() as u64, self.yz.len() as u64);
        log_ambiguity(nx * ny, nx.max(ny)).unwrap_or(0.0)
    }
}

/// A scored slicing of the z axis.
#[derive(Debug)]
struct Slicing {
    offset: f64,
    slices: BTreeMap<i64, Slice>,
}

impl Slicing {
    #[allow(clippy::cast_possible_truncation)]
    fn new(cloud: &HitCloud, offset: f64, z_range: f64) -> Self {
        let mut slices: BTreeMap<i64, Slice> = BTreeMap::new();
        for (i, hit) in cloud.iter().enumerate() {
            let bin = ((hit.z - offset) / z_range).floor() as i64;
            match hit.hit_type {
                HitType::Xz => slices.entry(bin).or_default().xz.push(i),
                HitType::Yz => slices.entry(bin).or_default().yz.push(i),
                _ => {}
            }
        }
        Self { offset, slices }
    }

    fn matched(&self) -> impl Iterator<Item = &Slice> {
        self.slices.values().filter(|s| s.is_matched())
    }

    fn score(&self) -> f64 {
        self.matched().map(Slice::log_ambiguity).sum()
    }
}

/// Combines XZ and YZ projection hits into 3D hits.
///
/// Observables: `ambiguity` (log ambiguity of the chosen slicing) and
/// `slices` (number of slices with both views).
#[derive(Debug, Clone)]
pub struct Hits3DReconstruction {
    name: String,
    z_range: f64,
    phases: usize,
    energy_scaling: bool,
}

impl Hits3DReconstruction {
    /// Registry key.
    pub const TYPE: &'static str = "hits3DReconstruction";

    /// Sets the slice width (mm).
    #[must_use]
    pub fn with_z_range(mut self, z_range: f64) -> Self {
        self.z_range = z_range;
        self
    }

    /// Sets the number of slicing offsets tried.
    #[must_use]
    pub fn with_phases(mut self, phases: usize) -> Self {
        self.phases = phases;
        self
    }

    /// Selects the energy sharing rule.
    #[must_use]
    pub fn with_energy_scaling(mut self, energy_scaling: bool) -> Self {
        self.energy_scaling = energy_scaling;
        self
    }

    fn best_slicing(&self, cloud: &HitCloud) -> Option<Slicing> {
        let mut best: Option<(f64, Slicing)> = None;
        for k in 0..self.phases {
            let offset = k as f64 * self.z_range / self.phases as f64;
            let slicing = Slicing::new(cloud, offset, self.z_range);
            if slicing.matched().next().is_none() {
                continue;
            }
            let score = slicing.score();
            // strict comparison keeps the smallest offset on ties
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((score, slicing));
            }
        }
        best.map(|(_, slicing)| slicing)
    }

    fn pair_energy(&self, ex: f64, ey: f64, total_x: f64, total_y: f64) -> f64 {
        if self.energy_scaling {
            if total_y > 0.0 {
                ex * ey / total_y
            } else {
                0.0
            }
        } else if total_x * total_y > 0.0 {
            ex * ey / (total_x * total_y) * (total_x + total_y) / 2.0
        } else {
            0.0
        }
    }
}

impl Default for Hits3DReconstruction {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
            z_range: 1.0,
            phases: 2,
            energy_scaling: true,
        }
    }
}

impl Process for Hits3DReconstruction {
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
        let z_range = params.quantity("zRange", Quantity::Length, self.z_range)?;
        if !(z_range > 0.0 && z_range.is_finite()) {
            return Err(params.invalid("zRange", format!("must be positive, got {z_range}")));
        }
        let phases = params.count("phases", self.phases)?;
        if phases == 0 {
            return Err(params.invalid("phases", "at least one phase is needed"));
        }
        self.z_range = z_range;
        self.phases = phases;
        self.energy_scaling = params.flag("energyScaling", self.energy_scaling)?;
        Ok(())
    }

    fn process_event(&mut self, event: Event) -> Option<Event> {
        let input = event.hit_cloud()?;
        let Some(slicing) = self.best_slicing(input) else {
            log::debug!("event {}: no slice with both projections", event.id);
            return None;
        };

        let mut output = HitCloud::new();
        for hit in input.iter() {
            if !matches!(hit.hit_type, HitType::Xz | HitType::Yz) {
                output.add_hit(hit);
            }
        }

        let mut matched = 0usize;
        for slice in slicing.matched() {
            matched += 1;
            let total_x: f64 = slice.xz.iter().map(|&i| input.energy(i)).sum();
            let total_y: f64 = slice.yz.iter().map(|&j| input.energy(j)).sum();
            for &i in &slice.xz {
                let hx = input.hit(i);
                for &j in &slice.yz {
                    let hy = input.hit(j);
                    let energy = self.pair_energy(hx.energy, hy.energy, total_x, total_y);
                    output.add_hit(
                        Hit::new(hx.x, hy.y, (hx.z + hy.z) / 2.0, energy)
                            .with_time((hx.time + hy.time) / 2.0),
                    );
                }
            }
        }

        let score = slicing.score();
        log::debug!(
            "event {}: offset {} mm, {matched} slices, ambiguity {score:.3}",
            event.id,
            slicing.offset
        );
        let mut event = event.with_payload(EventPayload::Hits(output));
        event.analysis.set(&self.name, "ambiguity", score);
        event.analysis.set(&self.name, "slices", matched as f64);
        Some(event)
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![
            entry("zRange", format!("{} mm", self.z_range)),
            entry("phases", self.phases),
            entry("energyScaling", self.energy_scaling),
        ]
    }
}
