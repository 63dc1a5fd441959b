//! Hit-count reduction by iterative proximity merging.

use crate::{Error, HitCloud, Result};

/// Configuration for hit reduction.
#[derive(Clone, Debug, PartialEq)]
pub struct ReductionConfig {
    /// Merge threshold used for the first pass (mm).
    pub starting_distance: f64,
    /// The threshold keeps growing at least up to this distance (mm).
    pub minimum_distance: f64,
    /// Growth factor applied to the threshold after each fixed point.
    pub distance_step_factor: f64,
    /// The threshold keeps growing while the cloud has more hits than this.
    pub max_nodes: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            starting_distance: 0.5,
            minimum_distance: 3.0,
            distance_step_factor: 1.5,
            max_nodes: 30,
        }
    }
}

impl ReductionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the starting distance.
    #[must_use]
    pub fn with_starting_distance(mut self, distance: f64) -> Self {
        self.starting_distance = distance;
        self
    }

    /// Sets the minimum distance.
    #[must_use]
    pub fn with_minimum_distance(mut self, distance: f64) -> Self {
        self.minimum_distance = distance;
        self
    }

    /// Sets the distance step factor.
    #[must_use]
    pub fn with_distance_step_factor(mut self, factor: f64) -> Self {
        self.distance_step_factor = factor;
        self
    }

    /// Sets the maximum number of hits.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Checks that the parameters describe a terminating reduction.
    ///
    /// # Errors
    /// Returns [`Error::InvalidReduction`] for a non-positive starting
    /// distance or a step factor not greater than one.
    pub fn validate(&self) -> Result<()> {
        if !(self.starting_distance > 0.0 && self.starting_distance.is_finite()) {
            return Err(Error::InvalidReduction(format!(
                "starting distance must be positive, got {}",
                self.starting_distance
            )));
        }
        if !(self.distance_step_factor > 1.0 && self.distance_step_factor.is_finite()) {
            return Err(Error::InvalidReduction(format!(
                "distance step factor must be greater than 1, got {}",
                self.distance_step_factor
            )));
        }
        if !self.minimum_distance.is_finite() {
            return Err(Error::InvalidReduction(
                "minimum distance must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a reduction run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReductionStatistics {
    /// Hits before reduction.
    pub initial_hits: usize,
    /// Hits after reduction.
    pub final_hits: usize,
    /// Number of thresholds visited.
    pub passes: usize,
    /// Candidate merges skipped because of zero combined energy.
    pub degenerate_merges: usize,
    /// Last threshold used (mm).
    pub final_distance: f64,
}

impl HitCloud {
    /// Merges close pairs until no pair is closer than `distance`.
    ///
    /// Pairs are visited in ascending `(i, j)` order. After a merge the scan
    /// for the same `i` restarts at `j = i + 1`, and full passes repeat until
    /// one performs no merge. Returns `(merges, degenerate)`.
    pub fn merge_within(&mut self, distance: f64) -> (usize, usize) {
        let threshold2 = distance * distance;
        let mut merges = 0;
        let mut degenerate = 0;
        loop {
            let mut merged = false;
            let mut i = 0;
            while i < self.len() {
                let mut j = i + 1;
                while j < self.len() {
                    if self.distance2(i, j) < threshold2 {
                        match self.merge_hits(i, j) {
                            Ok(()) => {
                                merged = true;
                                merges += 1;
                                j = i + 1;
                                continue;
                            }
                            Err(err) => {
                                log::debug!("skipping merge candidate: {err}");
                                degenerate += 1;
                            }
                        }
                    }
                    j += 1;
                }
                i += 1;
            }
            if !merged {
                break;
            }
        }
        (merges, degenerate)
    }

    /// Reduces the number of hits with a growing merge threshold.
    ///
    /// Starting at `starting_distance`, merges to a fixed point and multiplies
    /// the threshold by `distance_step_factor`, for as long as the threshold is
    /// below `minimum_distance` or the cloud has more than `max_nodes` hits.
    /// The loop also stops once the threshold spans the whole cloud and
    /// nothing is left to merge.
    ///
    /// # Errors
    /// Returns an error if the configuration fails [`ReductionConfig::validate`].
    pub fn reduce(&mut self, config: &ReductionConfig) -> Result<ReductionStatistics> {
        config.validate()?;

        let mut stats = ReductionStatistics {
            initial_hits: self.len(),
            ..ReductionStatistics::default()
        };

        let mut distance = config.starting_distance;
        while distance < config.minimum_distance || self.len() > config.max_nodes {
            let (merges, degenerate) = self.merge_within(distance);
            stats.passes += 1;
            stats.degenerate_merges += degenerate;
            stats.final_distance = distance;

            if merges == 0 && distance >= config.minimum_distance && !(self.extent() >= distance) {
                log::warn!(
                    "hit reduction stalled at {} hits (max nodes {})",
                    self.len(),
                    config.max_nodes
                );
                break;
            }
            distance *= config.distance_step_factor;
        }

        stats.final_hits = self.len();
        Ok(stats)
    }

    /// Diagonal of the bounding box; an upper bound on any pair distance.
    fn extent(&self) -> f64 {
        self.bounding_box()
            .map_or(0.0, |(min, max)| (max - min).mag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hit;

    fn line_cloud(n: usize, spacing: f64) -> HitCloud {
        (0..n)
            .map(|i| Hit::new(i as f64 * spacing, 0.0, 0.0, 1.0))
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(ReductionConfig::default().validate().is_ok());
        assert!(ReductionConfig::default()
            .with_distance_step_factor(1.0)
            .validate()
            .is_err());
        assert!(ReductionConfig::default()
            .with_starting_distance(0.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_merge_within_reaches_fixed_point() {
        let mut cloud = line_cloud(10, 0.4);
        let (merges, _) = cloud.merge_within(0.5);
        assert!(merges > 0);
        let snapshot = cloud.clone();
        let (again, _) = cloud.merge_within(0.5);
        assert_eq!(again, 0);
        assert_eq!(cloud, snapshot);
    }

    #[test]
    fn test_far_hits_are_not_merged() {
        let mut cloud = line_cloud(5, 10.0);
        let (merges, _) = cloud.merge_within(1.0);
        assert_eq!(merges, 0);
        assert_eq!(cloud.len(), 5);
    }

    #[test]
    fn test_reduce_respects_max_nodes() {
        let mut cloud = line_cloud(100, 1.0);
        let total = cloud.total_energy();
        let config = ReductionConfig::default().with_max_nodes(10);

        let stats = cloud.reduce(&config).unwrap();

        assert!(cloud.len() <= 10);
        assert_eq!(stats.initial_hits, 100);
        assert_eq!(stats.final_hits, cloud.len());
        assert!((cloud.total_energy() - total).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_terminates_when_max_nodes_unreachable() {
        let mut cloud = line_cloud(4, 1.0);
        let config = ReductionConfig::default().with_max_nodes(0);
        let stats = cloud.reduce(&config).unwrap();
        assert_eq!(cloud.len(), 1);
        assert_eq!(stats.final_hits, 1);
    }

    #[test]
    fn test_reduce_zero_energy_cloud_terminates() {
        let mut cloud: HitCloud = (0..4).map(|i| Hit::new(f64::from(i), 0.0, 0.0, 0.0)).collect();
        let config = ReductionConfig::default().with_max_nodes(1);
        let stats = cloud.reduce(&config).unwrap();
        assert_eq!(cloud.len(), 4);
        assert!(stats.degenerate_merges > 0);
    }

    #[test]
    fn test_reduce_empty_cloud() {
        let mut cloud = HitCloud::new();
        let stats = cloud.reduce(&ReductionConfig::default()).unwrap();
        assert_eq!(stats.final_hits, 0);
    }
}
