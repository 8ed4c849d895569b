//! Localization filter orchestrator.
//!
//! The [`Localizer`] is the only stateful, long-lived owner in the system: it
//! holds the shared scalar field, the ground-truth pose, the particle
//! population, and the seeded random source. One control command drives one
//! full cycle:
//!
//! `AWAIT_COMMAND -> MOVE -> (SENSE -> WEIGHT -> RESAMPLE -> DIFFUSE)? -> AWAIT_COMMAND`
//!
//! with `HALTED` as the terminal state. Motion runs unconditionally; the
//! correction chain runs only when the command carried non-zero translation.
//! Pure rotation commands update poses but never trigger a sensor reading.
//! After every non-halt cycle the output sink receives the true pose, the
//! full population, and the best-guess estimate.
//!
//! The true pose moves stochastically (commanded motion plus Gaussian noise,
//! never clamped); the particles move deterministically and are clamped by
//! [`crate::particle::ParticleSet::propagate`]. See the module docs of
//! [`crate::particle`] for why the asymmetry exists.

use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::field::ScalarField;
use crate::particle::ParticleSet;
use crate::sensor::SensorModel;
use crate::{Command, FilterConfig, FilterError, Pose};

/// Receiver for per-cycle filter output: true pose, full population (for
/// visualization), and the best-guess position estimate. Fire-and-forget.
pub trait OutputSink {
    fn emit(&mut self, true_pose: &Pose, particles: &[Pose], estimate: (f64, f64));
}

/// Sink that discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _true_pose: &Pose, _particles: &[Pose], _estimate: (f64, f64)) {}
}

/// Recovery applied within a cycle that could not run its full correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleRecovery {
    /// All particle weights were zero; resampling and diffusion were skipped
    /// and the propagated population kept as-is.
    DegenerateWeights,
    /// The true pose left the field, so no reading could be taken; the
    /// correction step was skipped entirely.
    SensorOutOfRange,
}

/// What one processed command did to the filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleReport {
    /// The command carried non-zero translation.
    pub moved: bool,
    /// The full sense-weigh-resample-diffuse chain ran.
    pub corrected: bool,
    /// Recovery taken instead of a full correction, if any.
    pub recovery: Option<CycleRecovery>,
    /// Best-guess position after the cycle.
    pub estimate: (f64, f64),
}

/// Outcome of feeding one command to the filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// A cycle ran to completion.
    Cycle(CycleReport),
    /// The filter is halted; nothing was mutated.
    Halted,
}

/// Monte Carlo localization filter.
pub struct Localizer {
    field: Rc<ScalarField>,
    config: FilterConfig,
    sensor: SensorModel,
    true_pose: Pose,
    particles: ParticleSet,
    rng: StdRng,
    halted: bool,
    cycles: usize,
    corrections: usize,
}

impl Localizer {
    /// Create a localizer with a random seed.
    pub fn new(field: Rc<ScalarField>, config: FilterConfig, initial_pose: Pose) -> Self {
        Self::new_with_seed(field, config, initial_pose, rand::random())
    }

    /// Create a localizer with a specific random seed.
    ///
    /// All randomness in the filter (particle initialization, true-pose
    /// motion noise, sensor noise, resampling draws, diffusion) flows from
    /// this one seeded source, so runs are reproducible.
    pub fn new_with_seed(
        field: Rc<ScalarField>,
        config: FilterConfig,
        initial_pose: Pose,
        seed: u64,
    ) -> Self {
        assert!(config.num_particles > 0, "Number of particles must be positive");
        assert!(config.sigma_step >= 0.0, "Step noise must be non-negative");
        assert!(config.sigma_turn >= 0.0, "Turn noise must be non-negative");
        assert!(config.sigma_pos >= 0.0, "Diffusion noise must be non-negative");
        let (width, height) = field.dimensions();
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = ParticleSet::initialize(config.num_particles, width, height, &mut rng);
        let sensor = SensorModel::new(config.sigma_sensor);
        Localizer {
            field,
            config,
            sensor,
            true_pose: initial_pose,
            particles,
            rng,
            halted: false,
            cycles: 0,
            corrections: 0,
        }
    }

    /// Process one control command through a full filter cycle.
    ///
    /// On [`Command::Halt`] the filter transitions to its terminal state and
    /// every subsequent call is a no-op returning [`StepOutcome::Halted`].
    /// Degenerate weights and an out-of-field true pose are recovered within
    /// the cycle (see [`CycleRecovery`]); any other error aborts the cycle.
    pub fn step(
        &mut self,
        command: Command,
        sink: &mut dyn OutputSink,
    ) -> Result<StepOutcome, FilterError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }
        if command == Command::Halt {
            self.halted = true;
            return Ok(StepOutcome::Halted);
        }

        let fwd = command.translation();
        let turn = command.rotation();
        let (width, height) = self.field.dimensions();

        self.advance_true_pose(fwd, turn);
        self.particles.propagate(fwd, turn, width, height);

        let mut report = CycleReport {
            moved: fwd != 0.0,
            corrected: false,
            recovery: None,
            estimate: (0.0, 0.0),
        };

        // The filter only looks when it moves linearly
        if fwd != 0.0 {
            match self
                .sensor
                .sense(&self.field, &self.true_pose, true, &mut self.rng)
            {
                Ok(reading) => {
                    let weights =
                        self.particles
                            .weigh(reading, &self.field, self.config.weight_exponent)?;
                    match self.particles.resample(&weights, &mut self.rng) {
                        Ok(()) => {
                            self.particles.diffuse(
                                self.config.sigma_pos,
                                self.config.sigma_turn,
                                &mut self.rng,
                            );
                            report.corrected = true;
                            self.corrections += 1;
                        }
                        Err(FilterError::DegenerateWeights) => {
                            log::warn!(
                                "degenerate weights at cycle {}: keeping propagated population",
                                self.cycles
                            );
                            report.recovery = Some(CycleRecovery::DegenerateWeights);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(FilterError::OutOfRangeLookup { x, y }) => {
                    log::warn!(
                        "true pose left the field at ({x}, {y}); skipping correction for cycle {}",
                        self.cycles
                    );
                    report.recovery = Some(CycleRecovery::SensorOutOfRange);
                }
                Err(e) => return Err(e),
            }
        }

        self.cycles += 1;
        report.estimate = self.particles.estimate();
        sink.emit(&self.true_pose, self.particles.particles(), report.estimate);
        Ok(StepOutcome::Cycle(report))
    }

    /// Advance the ground-truth pose: commanded motion plus Gaussian process
    /// noise, no clamping. The true pose may legally leave the field.
    fn advance_true_pose(&mut self, fwd: f64, turn: f64) {
        let fwd_noisy = Normal::new(fwd, self.config.sigma_step)
            .unwrap()
            .sample(&mut self.rng);
        self.true_pose.x += fwd_noisy * self.true_pose.theta.cos();
        self.true_pose.y += fwd_noisy * self.true_pose.theta.sin();
        let turn_noisy = Normal::new(turn, self.config.sigma_turn)
            .unwrap()
            .sample(&mut self.rng);
        self.true_pose.theta += turn_noisy;
    }

    pub fn true_pose(&self) -> &Pose {
        &self.true_pose
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Best-guess position from the current population.
    pub fn estimate(&self) -> (f64, f64) {
        self.particles.estimate()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of completed cycles (halt excluded).
    pub fn cycle_count(&self) -> usize {
        self.cycles
    }

    /// Number of cycles in which the full correction chain ran.
    pub fn correction_count(&self) -> usize {
        self.corrections
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn field(&self) -> &ScalarField {
        &self.field
    }
}
