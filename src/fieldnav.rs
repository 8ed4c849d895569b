//! Monte Carlo Localization toolbox for scalar-field navigation
//!
//! This crate implements a recursive Bayesian state estimator (Monte Carlo
//! Localization) that tracks the 2-D pose (position + heading) of an agent
//! moving over a known scalar field. The agent receives discrete motion
//! commands and noisy scalar sensor readings only; position is never observed
//! directly. A population of pose hypotheses (particles) is propagated with
//! each command, scored against the sensor reading, resampled in proportion
//! to plausibility, and roughened to keep the population from collapsing.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Backs the scalar field grid storage.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provide seedable random number generation for the motion, sensor, and diffusion noise models.
//! - [`serde`](https://crates.io/crates/serde) and [`csv`](https://crates.io/crates/csv): Provide configuration and record I/O for simulations.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [field]: The known scalar field (the map): an immutable grid of scalar intensities with bounded lookups.
//! - [sensor]: The sensor model that reads the field at a pose, optionally with Gaussian noise.
//! - [particle]: The particle population and its per-cycle operations (propagate, weigh, resample, diffuse, estimate).
//! - [filter]: The localization orchestrator that owns the true pose, the particle set, and the cycle state machine.
//! - [sim]: Command scripts and per-cycle result records for driving non-interactive runs.
//!
//! ## Filter cycle
//!
//! One control command drives one full cycle:
//!
//! 1. The true pose is advanced with the commanded motion plus Gaussian
//!    process noise. The particle set is advanced with the *exact* commanded
//!    motion, no noise, and clamped to the field bounds. This asymmetry is
//!    deliberate: process noise is injected only on the real system, never on
//!    the hypotheses.
//! 2. If the command carried non-zero translation, a noisy scalar reading is
//!    taken at the true pose and every particle is scored by
//!    `max(error) - error` of its own noiseless predicted reading, boundary
//!    particles are zeroed, and the scores are sharpened by an exponent.
//! 3. The population is resampled multinomially in proportion to the scores,
//!    then diffused with small independent Gaussian noise.
//! 4. The arithmetic mean of the particle positions is the best-guess
//!    estimate, emitted together with the true pose and the population.
//!
//! Pure rotation commands move poses but never trigger the correction step:
//! the filter only looks when it moves linearly.

use std::fmt::{self, Display};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub mod field;
pub mod filter;
pub mod particle;
pub mod sensor;
pub mod sim;

/// Default translation distance per forward/backward command, in grid units.
pub const DEFAULT_STEP: f64 = 5.0;
/// Default rotation per turn command, in radians (25 degrees).
pub const DEFAULT_TURN: f64 = 25.0 * std::f64::consts::PI / 180.0;
/// Default standard deviation of the true-pose translation noise.
pub const DEFAULT_SIGMA_STEP: f64 = 0.5;
/// Default standard deviation of the true-pose rotation noise and of the
/// post-resample heading diffusion, in radians (5 degrees).
pub const DEFAULT_SIGMA_TURN: f64 = 5.0 * std::f64::consts::PI / 180.0;
/// Default particle population size.
pub const DEFAULT_NUM_PARTICLES: usize = 3000;
/// Default standard deviation of the scalar sensor noise.
pub const DEFAULT_SIGMA_SENSOR: f64 = 2.0;
/// Default standard deviation of the post-resample positional diffusion.
pub const DEFAULT_SIGMA_POS: f64 = 2.0;
/// Default sharpening exponent applied to particle weights.
pub const DEFAULT_WEIGHT_EXPONENT: i32 = 3;

/// Error taxonomy for the localization filter.
///
/// The first three variants are the per-cycle failure modes of the filter
/// core; the remainder wrap I/O and parsing failures from field and record
/// loading. Only [`FilterError::InvalidField`] prevents the filter from
/// starting; the others are local to a single cycle and the orchestrator
/// decides per-cycle whether to continue.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The field has zero width or height; the filter cannot start.
    #[error("invalid scalar field: {width}x{height} grid has no cells")]
    InvalidField { width: usize, height: usize },
    /// A field lookup was attempted outside `[0,W) x [0,H)`.
    #[error("field lookup out of range at ({x}, {y})")]
    OutOfRangeLookup { x: i64, y: i64 },
    /// Every particle weight is zero; the resampling distribution is undefined.
    #[error("degenerate particle weights: weight sum is zero")]
    DegenerateWeights,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

/// A 2-D pose: position in grid units plus heading in radians.
///
/// `theta` is unwrapped: it accumulates turn commands without ever being
/// reduced modulo 2π. All trigonometry applied to it is periodic, so the
/// growth is harmless over any realistic session length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }
}

impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {:.3}, {:.3} rad)",
            self.x, self.y, self.theta
        )
    }
}

/// A discrete control command, issued at most once per filter cycle.
///
/// Turn sign convention follows the original keyboard mapping: left turns
/// are negative rotation, right turns positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Translate forward along the current heading by the given distance.
    Forward(f64),
    /// Translate backward along the current heading by the given distance.
    Backward(f64),
    /// Rotate counter-clockwise (negative heading change) by the given angle.
    TurnLeft(f64),
    /// Rotate clockwise (positive heading change) by the given angle.
    TurnRight(f64),
    /// Terminate the filter.
    Halt,
}

impl Command {
    /// Exhaustive mapping from raw input keys to commands.
    ///
    /// `w` maps forward, `s` backward, `a` left, `d` right; any other key
    /// halts the filter. `step` and `turn` supply the command magnitudes.
    pub fn from_key(key: char, step: f64, turn: f64) -> Command {
        match key {
            'w' => Command::Forward(step),
            's' => Command::Backward(step),
            'a' => Command::TurnLeft(turn),
            'd' => Command::TurnRight(turn),
            _ => Command::Halt,
        }
    }

    /// Signed translation distance carried by this command.
    pub fn translation(&self) -> f64 {
        match *self {
            Command::Forward(d) => d,
            Command::Backward(d) => -d,
            _ => 0.0,
        }
    }

    /// Signed rotation carried by this command, in radians.
    pub fn rotation(&self) -> f64 {
        match *self {
            Command::TurnLeft(a) => -a,
            Command::TurnRight(a) => a,
            _ => 0.0,
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::Forward(d) => write!(f, "forward({d})"),
            Command::Backward(d) => write!(f, "backward({d})"),
            Command::TurnLeft(a) => write!(f, "left({a:.4} rad)"),
            Command::TurnRight(a) => write!(f, "right({a:.4} rad)"),
            Command::Halt => write!(f, "halt"),
        }
    }
}

/// Tunable parameters of the localization filter.
///
/// Every constant of the filter is adjustable here rather than hardcoded so
/// that tests and simulations can scale scenarios down. The defaults match
/// the reference configuration: 5-unit steps, 25 degree turns, 3000
/// particles, and a cubic weight-sharpening exponent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Translation distance per forward/backward command.
    pub step: f64,
    /// Rotation per turn command, radians.
    pub turn: f64,
    /// Standard deviation of true-pose translation noise.
    pub sigma_step: f64,
    /// Standard deviation of true-pose rotation noise and heading diffusion, radians.
    pub sigma_turn: f64,
    /// Particle population size.
    pub num_particles: usize,
    /// Standard deviation of the scalar sensor noise.
    pub sigma_sensor: f64,
    /// Standard deviation of post-resample positional diffusion.
    pub sigma_pos: f64,
    /// Sharpening exponent applied to particle weights. The reference value
    /// of 3 is an empirical heuristic, not a calibrated likelihood.
    pub weight_exponent: i32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            step: DEFAULT_STEP,
            turn: DEFAULT_TURN,
            sigma_step: DEFAULT_SIGMA_STEP,
            sigma_turn: DEFAULT_SIGMA_TURN,
            num_particles: DEFAULT_NUM_PARTICLES,
            sigma_sensor: DEFAULT_SIGMA_SENSOR,
            sigma_pos: DEFAULT_SIGMA_POS,
            weight_exponent: DEFAULT_WEIGHT_EXPONENT,
        }
    }
}

impl FilterConfig {
    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).map_err(io::Error::other)
    }

    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }

    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self).map_err(io::Error::other)?;
        file.write_all(s.as_bytes())
    }

    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        toml::from_str(&s).map_err(io::Error::other)
    }

    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }

    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        let ext = p
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unsupported file extension",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_key_mapping() {
        let step = 5.0;
        let turn = DEFAULT_TURN;
        assert_eq!(Command::from_key('w', step, turn), Command::Forward(5.0));
        assert_eq!(Command::from_key('s', step, turn), Command::Backward(5.0));
        assert_eq!(Command::from_key('a', step, turn), Command::TurnLeft(turn));
        assert_eq!(Command::from_key('d', step, turn), Command::TurnRight(turn));
        assert_eq!(Command::from_key('q', step, turn), Command::Halt);
        assert_eq!(Command::from_key(' ', step, turn), Command::Halt);
    }

    #[test]
    fn test_command_components() {
        assert_approx_eq!(Command::Forward(5.0).translation(), 5.0, 1e-12);
        assert_approx_eq!(Command::Backward(5.0).translation(), -5.0, 1e-12);
        assert_approx_eq!(Command::Forward(5.0).rotation(), 0.0, 1e-12);
        assert_approx_eq!(Command::TurnLeft(0.4).rotation(), -0.4, 1e-12);
        assert_approx_eq!(Command::TurnRight(0.4).rotation(), 0.4, 1e-12);
        assert_approx_eq!(Command::TurnLeft(0.4).translation(), 0.0, 1e-12);
        assert_approx_eq!(Command::Halt.translation(), 0.0, 1e-12);
        assert_approx_eq!(Command::Halt.rotation(), 0.0, 1e-12);
    }

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert_approx_eq!(config.step, 5.0, 1e-12);
        assert_approx_eq!(config.turn, 25.0_f64.to_radians(), 1e-12);
        assert_approx_eq!(config.sigma_step, 0.5, 1e-12);
        assert_approx_eq!(config.sigma_turn, 5.0_f64.to_radians(), 1e-12);
        assert_eq!(config.num_particles, 3000);
        assert_approx_eq!(config.sigma_sensor, 2.0, 1e-12);
        assert_approx_eq!(config.sigma_pos, 2.0, 1e-12);
        assert_eq!(config.weight_exponent, 3);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = FilterConfig {
            num_particles: 500,
            weight_exponent: 5,
            ..FilterConfig::default()
        };
        let dir = std::env::temp_dir();
        let path = dir.join("fieldnav_config_roundtrip.json");
        config.to_file(&path).expect("Failed to write config");
        let loaded = FilterConfig::from_file(&path).expect("Failed to read config");
        assert_eq!(loaded.num_particles, 500);
        assert_eq!(loaded.weight_exponent, 5);
        assert_approx_eq!(loaded.step, config.step, 1e-12);
        std::fs::remove_file(&path).ok();
    }
}
