//! Structure of Arrays (`SoA`) hit cloud.
//!
//! `HitCloud` stores the hits of one event in parallel vectors rather than a
//! vector of [`Hit`] records, and keeps the total energy up to date on every
//! mutation.

use crate::{Error, Hit, HitType, Result, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The ordered collection of hits belonging to one event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitCloud {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    energy: Vec<f64>,
    time: Vec<f64>,
    hit_type: Vec<HitType>,
    total_energy: f64,
}

impl HitCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cloud with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            energy: Vec::with_capacity(capacity),
            time: Vec::with_capacity(capacity),
            hit_type: Vec::with_capacity(capacity),
            total_energy: 0.0,
        }
    }

    /// Returns the number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the cloud holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Sum of all hit energies.
    #[must_use]
    pub fn total_energy(&self) -> f64 {
        self.total_energy
    }

    /// Appends a hit. Negative energies are clamped to zero.
    pub fn add_hit(&mut self, hit: Hit) {
        let energy = if hit.energy < 0.0 {
            log::warn!("negative hit energy {} clamped to zero", hit.energy);
            0.0
        } else {
            hit.energy
        };
        self.x.push(hit.x);
        self.y.push(hit.y);
        self.z.push(hit.z);
        self.energy.push(energy);
        self.time.push(hit.time);
        self.hit_type.push(hit.hit_type);
        self.total_energy += energy;
    }

    /// Appends a 3D hit with zero time.
    pub fn push(&mut self, x: f64, y: f64, z: f64, energy: f64) {
        self.add_hit(Hit::new(x, y, z, energy));
    }

    /// Appends every hit of `other`.
    pub fn append(&mut self, other: &HitCloud) {
        self.x.extend_from_slice(&other.x);
        self.y.extend_from_slice(&other.y);
        self.z.extend_from_slice(&other.z);
        self.energy.extend_from_slice(&other.energy);
        self.time.extend_from_slice(&other.time);
        self.hit_type.extend_from_slice(&other.hit_type);
        self.total_energy += other.total_energy;
    }

    /// Removes every hit.
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.energy.clear();
        self.time.clear();
        self.hit_type.clear();
        self.total_energy = 0.0;
    }

    /// Returns hit `i`, or `None` if out of range.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<Hit> {
        (i < self.len()).then(|| self.hit(i))
    }

    /// Returns hit `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    #[must_use]
    pub fn hit(&self, i: usize) -> Hit {
        Hit {
            x: self.x[i],
            y: self.y[i],
            z: self.z[i],
            energy: self.energy[i],
            time: self.time[i],
            hit_type: self.hit_type[i],
        }
    }

    /// Position of hit `i`.
    #[inline]
    #[must_use]
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    /// Energy of hit `i`.
    #[inline]
    #[must_use]
    pub fn energy(&self, i: usize) -> f64 {
        self.energy[i]
    }

    /// Type of hit `i`.
    #[inline]
    #[must_use]
    pub fn hit_type(&self, i: usize) -> HitType {
        self.hit_type[i]
    }

    /// Iterates over the hits in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Hit> + '_ {
        (0..self.len()).map(|i| self.hit(i))
    }

    /// Replaces the energy of hit `i`, keeping the total consistent.
    pub fn set_energy(&mut self, i: usize, energy: f64) {
        let energy = energy.max(0.0);
        self.total_energy += energy - self.energy[i];
        self.energy[i] = energy;
    }

    /// Multiplies every energy by `factor` (negative factors clamp to zero).
    pub fn scale_energy(&mut self, factor: f64) {
        let factor = factor.max(0.0);
        for e in &mut self.energy {
            *e *= factor;
        }
        self.total_energy = self.energy.iter().sum();
    }

    /// Removes hit `i`, preserving the order of the remaining hits.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn remove_hit(&mut self, i: usize) -> Hit {
        let hit = self.hit(i);
        self.x.remove(i);
        self.y.remove(i);
        self.z.remove(i);
        self.energy.remove(i);
        self.time.remove(i);
        self.hit_type.remove(i);
        self.total_energy -= hit.energy;
        if self.is_empty() {
            self.total_energy = 0.0;
        }
        hit
    }

    /// Merges hit `j` into hit `i` at their energy-weighted centroid and
    /// removes `j`.
    ///
    /// The merged hit keeps the type of `i` and takes the energy-weighted
    /// time. Total energy is unchanged.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateMerge`] without modifying the cloud when the
    /// combined energy is zero.
    ///
    /// # Panics
    /// Panics if `i == j` or either index is out of range.
    pub fn merge_hits(&mut self, i: usize, j: usize) -> Result<()> {
        assert_ne!(i, j, "cannot merge a hit with itself");
        let (ei, ej) = (self.energy[i], self.energy[j]);
        let total = ei + ej;
        if total <= 0.0 {
            return Err(Error::DegenerateMerge {
                first: i.min(j),
                second: i.max(j),
            });
        }
        self.x[i] = (self.x[i] * ei + self.x[j] * ej) / total;
        self.y[i] = (self.y[i] * ei + self.y[j] * ej) / total;
        self.z[i] = (self.z[i] * ei + self.z[j] * ej) / total;
        self.time[i] = (self.time[i] * ei + self.time[j] * ej) / total;
        self.energy[i] = total;

        self.x.remove(j);
        self.y.remove(j);
        self.z.remove(j);
        self.energy.remove(j);
        self.time.remove(j);
        self.hit_type.remove(j);
        Ok(())
    }

    /// Exchanges the full records of hits `i` and `j`.
    pub fn swap_hits(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        self.y.swap(i, j);
        self.z.swap(i, j);
        self.energy.swap(i, j);
        self.time.swap(i, j);
        self.hit_type.swap(i, j);
    }

    /// Moves hit `i` to a new position.
    pub fn set_position(&mut self, i: usize, position: Vec3) {
        self.x[i] = position.x;
        self.y[i] = position.y;
        self.z[i] = position.z;
    }

    /// Applies `f` to every hit position.
    pub fn map_positions(&mut self, mut f: impl FnMut(Vec3) -> Vec3) {
        for i in 0..self.len() {
            let moved = f(self.position(i));
            self.set_position(i, moved);
        }
    }

    /// Adds `delta` to every position.
    pub fn translate(&mut self, delta: Vec3) {
        self.map_positions(|p| p + delta);
    }

    /// Rotates every position by `angle` radians about the axis through
    /// `center` with direction `axis` (right-hand rule).
    pub fn rotate(&mut self, center: Vec3, axis: Vec3, angle: f64) {
        self.map_positions(|p| (p - center).rotate(angle, &axis) + center);
    }

    /// Reflects every position across the plane through `point` with the
    /// given normal. A zero normal leaves the cloud unchanged.
    pub fn reflect(&mut self, point: Vec3, normal: Vec3) {
        let Some(n) = normal.unit() else {
            return;
        };
        self.map_positions(|p| {
            let v = p - point;
            point + v - n * (2.0 * v.dot(&n))
        });
    }

    /// Mean hit energy, `None` for an empty cloud.
    #[must_use]
    pub fn mean_energy(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.total_energy / self.len() as f64)
        }
    }

    /// Largest hit energy, `None` for an empty cloud.
    #[must_use]
    pub fn max_energy(&self) -> Option<f64> {
        self.energy.iter().copied().reduce(f64::max)
    }

    /// Smallest hit energy, `None` for an empty cloud.
    #[must_use]
    pub fn min_energy(&self) -> Option<f64> {
        self.energy.iter().copied().reduce(f64::min)
    }

    /// True when every hit has `z == 0`.
    #[must_use]
    pub fn is_xy(&self) -> bool {
        self.z.iter().all(|&v| v == 0.0)
    }

    /// True when every hit has `y == 0`.
    #[must_use]
    pub fn is_xz(&self) -> bool {
        self.y.iter().all(|&v| v == 0.0)
    }

    /// True when every hit has `x == 0`.
    #[must_use]
    pub fn is_yz(&self) -> bool {
        self.x.iter().all(|&v| v == 0.0)
    }

    /// Number of hits of the given type.
    #[must_use]
    pub fn count_type(&self, hit_type: HitType) -> usize {
        self.hit_type.iter().filter(|&&t| t == hit_type).count()
    }

    /// Squared distance between hits `i` and `j`.
    #[inline]
    #[must_use]
    pub fn distance2(&self, i: usize, j: usize) -> f64 {
        let dx = self.x[i] - self.x[j];
        let dy = self.y[i] - self.y[j];
        let dz = self.z[i] - self.z[j];
        dx * dx + dy * dy + dz * dz
    }

    /// Length of the polyline through the hits in insertion order.
    #[must_use]
    pub fn total_distance(&self) -> f64 {
        (1..self.len()).map(|i| self.distance2(i - 1, i).sqrt()).sum()
    }

    /// True when energies are in non-increasing order.
    #[must_use]
    pub fn is_sorted_by_energy(&self) -> bool {
        self.energy.windows(2).all(|w| w[1] <= w[0])
    }

    /// Energy-weighted mean position, `None` if the total energy is zero.
    #[must_use]
    pub fn mean_position(&self) -> Option<Vec3> {
        if self.total_energy <= 0.0 {
            return None;
        }
        let sum = (0..self.len()).fold(Vec3::ZERO, |acc, i| {
            acc + self.position(i) * self.energy[i]
        });
        Some(sum * (1.0 / self.total_energy))
    }

    /// Energy-weighted standard deviation along each axis.
    #[must_use]
    pub fn sigma(&self) -> Option<Vec3> {
        let mean = self.mean_position()?;
        let mut acc = Vec3::ZERO;
        for i in 0..self.len() {
            let d = self.position(i) - mean;
            acc += Vec3::new(d.x * d.x, d.y * d.y, d.z * d.z) * self.energy[i];
        }
        let var = acc * (1.0 / self.total_energy);
        Some(Vec3::new(var.x.sqrt(), var.y.sqrt(), var.z.sqrt()))
    }

    /// Axis-aligned bounding box as `(min, max)`.
    #[must_use]
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        if self.is_empty() {
            return None;
        }
        let mut min = self.position(0);
        let mut max = min;
        for i in 1..self.len() {
            let p = self.position(i);
            min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some((min, max))
    }
}

impl FromIterator<Hit> for HitCloud {
    fn from_iter<I: IntoIterator<Item = Hit>>(iter: I) -> Self {
        let mut cloud = HitCloud::new();
        for hit in iter {
            cloud.add_hit(hit);
        }
        cloud
    }
}

impl Extend<Hit> for HitCloud {
    fn extend<I: IntoIterator<Item = Hit>>(&mut self, iter: I) {
        for hit in iter {
            self.add_hit(hit);
        }
    }
}
