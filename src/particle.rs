//! Particle population and its per-cycle operations.
//!
//! A particle is one pose hypothesis; the population is an ordered,
//! fixed-size collection of them. Weights are not stored on the particles:
//! they are computed fresh from each sensor reading, consumed by the
//! resampler, and discarded. The population size is invariant across every
//! operation here, and no particle's update within a cycle depends on
//! another's.
//!
//! # Motion model asymmetry
//!
//! [`ParticleSet::propagate`] applies the *exact* commanded motion to every
//! particle and clamps positions to the field bounds. The stochastic motion
//! model (command plus Gaussian noise, no clamping) applies only to the true
//! pose, in [`crate::filter`]. Process noise is injected on the real system,
//! never on the hypotheses; the post-resample diffusion step is what keeps
//! the hypotheses spread out.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::field::ScalarField;
use crate::{FilterError, Pose};

/// Ordered, fixed-size population of pose hypotheses.
#[derive(Clone, Debug)]
pub struct ParticleSet {
    particles: Vec<Pose>,
}

impl ParticleSet {
    /// Draw a fresh population uniformly over the full pose domain:
    /// `x ~ U[0, W)`, `y ~ U[0, H)`, `theta ~ U[0, 2*pi)`, independently per
    /// axis per particle.
    pub fn initialize(
        num_particles: usize,
        width: usize,
        height: usize,
        rng: &mut StdRng,
    ) -> Self {
        assert!(num_particles > 0, "Number of particles must be positive");
        assert!(width > 0 && height > 0, "Field dimensions must be positive");
        let particles = (0..num_particles)
            .map(|_| {
                Pose::new(
                    rng.random_range(0.0..width as f64),
                    rng.random_range(0.0..height as f64),
                    rng.random_range(0.0..2.0 * std::f64::consts::PI),
                )
            })
            .collect();
        ParticleSet { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Read-only access to the population.
    pub fn particles(&self) -> &[Pose] {
        &self.particles
    }

    /// Advance every particle by the exact commanded motion, then clamp
    /// positions to `[0, W-1] x [0, H-1]`. Headings are never clamped or
    /// wrapped.
    pub fn propagate(&mut self, fwd: f64, turn: f64, width: usize, height: usize) {
        let x_max = (width - 1) as f64;
        let y_max = (height - 1) as f64;
        for p in &mut self.particles {
            p.x += fwd * p.theta.cos();
            p.y += fwd * p.theta.sin();
            p.theta += turn;
            p.x = p.x.clamp(0.0, x_max);
            p.y = p.y.clamp(0.0, y_max);
        }
    }

    /// Score every particle against a sensor reading taken at the true pose.
    ///
    /// Each particle's error is the absolute difference between the reading
    /// and the particle's own noiseless predicted reading. Weights are
    /// `max(error) - error`, so the best particle in the population gets the
    /// maximum weight and the worst gets zero. Particles sitting exactly on
    /// the field boundary are forced to zero weight regardless of error.
    /// Finally every weight is raised to `exponent` - an empirical sharpening
    /// heuristic, not a normalized likelihood.
    ///
    /// The returned vector is transient: it is consumed by
    /// [`ParticleSet::resample`] and never stored on the particles.
    pub fn weigh(
        &self,
        sensor_reading: f64,
        field: &ScalarField,
        exponent: i32,
    ) -> Result<Vec<f64>, FilterError> {
        let (width, height) = field.dimensions();
        let x_max = (width - 1) as f64;
        let y_max = (height - 1) as f64;
        let mut errors = Vec::with_capacity(self.particles.len());
        for p in &self.particles {
            let predicted = field.value_at(p.x as i64, p.y as i64)?;
            errors.push((sensor_reading - predicted).abs());
        }
        let max_error = errors.iter().cloned().fold(0.0, f64::max);
        let weights = self
            .particles
            .iter()
            .zip(errors.iter())
            .map(|(p, &error)| {
                if p.x == 0.0 || p.x == x_max || p.y == 0.0 || p.y == y_max {
                    0.0
                } else {
                    (max_error - error).powi(exponent)
                }
            })
            .collect();
        Ok(weights)
    }

    /// Multinomial resampling: replace the population with `N` draws (with
    /// replacement) from itself, each particle selected with probability
    /// proportional to its weight.
    ///
    /// A zero weight sum leaves the selection distribution undefined; the
    /// population is left untouched and [`FilterError::DegenerateWeights`]
    /// is returned so the orchestrator can apply its recovery policy.
    pub fn resample(&mut self, weights: &[f64], rng: &mut StdRng) -> Result<(), FilterError> {
        let n = self.particles.len();
        assert_eq!(weights.len(), n, "One weight per particle required");
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(FilterError::DegenerateWeights);
        }
        let mut cumulative = Vec::with_capacity(n);
        let mut running = 0.0;
        for &w in weights {
            running += w;
            cumulative.push(running);
        }
        let mut new_particles = Vec::with_capacity(n);
        for _ in 0..n {
            let u = rng.random::<f64>() * total;
            let index = cumulative.partition_point(|&c| c <= u).min(n - 1);
            new_particles.push(self.particles[index]);
        }
        self.particles = new_particles;
        Ok(())
    }

    /// Roughening: add small independent Gaussian noise to every particle to
    /// counteract the sample impoverishment left by resampling.
    ///
    /// No bounds clamping happens here. Particles may legally drift outside
    /// the field until the next [`ParticleSet::propagate`] reclamps them;
    /// field lookups guard against the out-of-range window themselves.
    pub fn diffuse(&mut self, sigma_pos: f64, sigma_turn: f64, rng: &mut StdRng) {
        assert!(sigma_pos >= 0.0, "Position diffusion must be non-negative");
        assert!(sigma_turn >= 0.0, "Heading diffusion must be non-negative");
        let pos_noise = Normal::new(0.0, sigma_pos).unwrap();
        let turn_noise = Normal::new(0.0, sigma_turn).unwrap();
        for p in &mut self.particles {
            p.x += pos_noise.sample(rng);
            p.y += pos_noise.sample(rng);
            p.theta += turn_noise.sample(rng);
        }
    }

    /// Best-guess position: the arithmetic mean of all particle positions.
    /// Heading is not aggregated.
    pub fn estimate(&self) -> (f64, f64) {
        let n = self.particles.len() as f64;
        let (sum_x, sum_y) = self
            .particles
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        (sum_x / n, sum_y / n)
    }

    /// Sum of the per-axis positional sample variances. Used to monitor the
    /// spread of the population.
    pub fn positional_variance(&self) -> f64 {
        let n = self.particles.len() as f64;
        let (mean_x, mean_y) = self.estimate();
        let (var_x, var_y) = self.particles.iter().fold((0.0, 0.0), |(vx, vy), p| {
            (vx + (p.x - mean_x).powi(2), vy + (p.y - mean_y).powi(2))
        });
        var_x / n + var_y / n
    }

    #[cfg(test)]
    pub(crate) fn from_poses(particles: Vec<Pose>) -> Self {
        assert!(!particles.is_empty());
        ParticleSet { particles }
    }
}
