//! Scalar sensor model.
//!
//! The agent's only observation of the world is the scalar field value under
//! its own position. The sensor truncates the pose coordinates toward zero
//! (not rounding), looks the cell up, and optionally corrupts the value with
//! Gaussian read noise. True-pose readings are always requested noisy;
//! particle-predicted readings are always noiseless.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::field::ScalarField;
use crate::{FilterError, Pose};

/// Scalar field sensor with Gaussian read noise.
#[derive(Clone, Debug)]
pub struct SensorModel {
    /// Standard deviation of the read noise applied to noisy readings.
    pub sigma_sensor: f64,
}

impl SensorModel {
    pub fn new(sigma_sensor: f64) -> Self {
        assert!(
            sigma_sensor >= 0.0,
            "Sensor noise standard deviation must be non-negative"
        );
        SensorModel { sigma_sensor }
    }

    /// Read the field at a pose.
    ///
    /// Coordinates are truncated toward zero before indexing. A pose outside
    /// the grid yields [`FilterError::OutOfRangeLookup`]; the caller decides
    /// whether that aborts or skips the current cycle.
    pub fn sense(
        &self,
        field: &ScalarField,
        pose: &Pose,
        noisy: bool,
        rng: &mut StdRng,
    ) -> Result<f64, FilterError> {
        let value = field.value_at(pose.x as i64, pose.y as i64)?;
        if noisy {
            // sigma_sensor is validated non-negative at construction
            Ok(Normal::new(value, self.sigma_sensor).unwrap().sample(rng))
        } else {
            Ok(value)
        }
    }
}
