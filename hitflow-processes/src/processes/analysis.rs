//! Summary observables of a hit cloud.

use hitflow_core::{Event, Vec3};

use crate::{Parameters, Process, Result};

/// Writes summary observables and passes the event on unchanged.
///
/// Observables: `nHits`, `energy`, `meanX/Y/Z`, `sigmaX/Y/Z`, `xy2Sigma`,
/// `xySigmaBalance`, `totalDistance`. Means and sigmas are energy weighted
/// and zero for clouds without energy.
#[derive(Debug, Clone)]
pub struct HitsAnalysis {
    name: String,
}

impl HitsAnalysis {
    /// Registry key.
    pub const TYPE: &'static str = "hitsAnalysis";
}

impl Default for HitsAnalysis {
    fn default() -> Self {
        Self {
            name: Self::TYPE.to_string(),
        }
    }
}

impl Process for HitsAnalysis {
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

    fn process_event(&mut self, mut event: Event) -> Option<Event> {
        let cloud = event.hit_cloud()?;
        let n_hits = cloud.len() as f64;
        let energy = cloud.total_energy();
        let mean = cloud.mean_position().unwrap_or(Vec3::ZERO);
        let sigma = cloud.sigma().unwrap_or(Vec3::ZERO);
        let distance = cloud.total_distance();

        let xy2 = sigma.x * sigma.x + sigma.y * sigma.y;
        let sum = sigma.x + sigma.y;
        let balance = if sum > 0.0 { (sigma.x - sigma.y) / sum } else { 0.0 };

        let record = &mut event.analysis;
        let name = self.name.as_str();
        record.set(name, "nHits", n_hits);
        record.set(name, "energy", energy);
        record.set(name, "meanX", mean.x);
        record.set(name, "meanY", mean.y);
        record.set(name, "meanZ", mean.z);
        record.set(name, "sigmaX", sigma.x);
        record.set(name, "sigmaY", sigma.y);
        record.set(name, "sigmaZ", sigma.z);
        record.set(name, "xy2Sigma", xy2);
        record.set(name, "xySigmaBalance", balance);
        record.set(name, "totalDistance", distance);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hitflow_core::{Hit, HitCloud};

    #[test]
    fn test_observables() {
        let cloud: HitCloud = [
            Hit::new(-1.0, 0.0, 2.0, 1.0),
            Hit::new(1.0, 0.0, 2.0, 1.0),
            Hit::new(1.0, 0.0, 2.0, 2.0),
        ]
        .into_iter()
        .collect();
        let mut process = HitsAnalysis::default();
        process.set_name("ana");
        let event = process.process_event(Event::hits(0, cloud)).unwrap();
        let get = |key: &str| event.analysis.get(&format!("ana_{key}")).unwrap();

        assert_abs_diff_eq!(get("nHits"), 3.0);
        assert_abs_diff_eq!(get("energy"), 4.0);
        assert_abs_diff_eq!(get("meanX"), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(get("meanZ"), 2.0, epsilon = 1e-12);
        // weighted variance: (2.25 + 0.25 * 3) / 4 = 0.75
        assert_abs_diff_eq!(get("sigmaX"), 0.75f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(get("sigmaY"), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(get("xy2Sigma"), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(get("xySigmaBalance"), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(get("totalDistance"), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_cloud_keeps_event() {
        let mut process = HitsAnalysis::default();
        let event = process.process_event(Event::hits(0, HitCloud::new())).unwrap();
        assert_eq!(event.analysis.get("hitsAnalysis_nHits"), Some(0.0));
        assert_eq!(event.analysis.get("hitsAnalysis_meanX"), Some(0.0));
    }
}
