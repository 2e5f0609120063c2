//! Bridge and simulator settings.

use std::time::Duration;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::HilError;
use crate::dynamics::VehicleParams;
use crate::encoder::DilutionModel;
use crate::magnetic::UniformMagneticField;
use crate::protocol::Endpoint;

/// Default interval between two `HIL_STATE_QUATERNION` messages (µs).
pub const DEFAULT_QUATERNION_INTERVAL_US: f64 = 20_000.0;
/// Actuator messages to receive before publishing waits for lockstep replies.
pub const DEFAULT_WARMUP_THRESHOLD: u32 = 300;
/// A `SYSTEM_TIME` message goes out on every this-many-th publish.
pub const DEFAULT_SYSTEM_TIME_THROTTLE: u32 = 1_000;

/// Configuration of the simulated vehicle and its link to the autopilot.
///
/// Values are read once when the drone is built. The defaults describe a vehicle
/// resting on flat ground at 49.766809 N, 7.5571598 W that identifies itself as
/// system 1, component 1.
///
/// ```rust
/// use hil_bridge::Configuration;
///
/// let config = Configuration {
///     ground_height: 120.0,
///     wind: [2.0, -1.0, 0.0],
///     ..Configuration::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// MAVLink system id of the simulated vehicle.
    pub system_id: u8,
    /// MAVLink component id of the simulated vehicle.
    pub component_id: u8,

    /// Latitude of the NED origin in degrees.
    pub origin_latitude: f64,
    /// Longitude of the NED origin in degrees.
    pub origin_longitude: f64,

    /// Altitude of the ground plane above the origin (m, positive up).
    pub ground_height: f64,

    /// Number of actuator messages during which every tick publishes regardless of
    /// lockstep. Gives the autopilot sensor data to boot on.
    pub warmup_threshold: u32,

    /// Publish count between two `SYSTEM_TIME` messages.
    pub system_time_throttle: u32,

    /// Initial `HIL_STATE_QUATERNION` interval (µs). The autopilot can change it with
    /// `MAV_CMD_SET_MESSAGE_INTERVAL`.
    pub quaternion_interval_us: f64,

    /// Hold the clock after each publish until the autopilot answers with actuator
    /// controls.
    pub lockstep: bool,

    /// Environment wind (m/s, NED).
    pub wind: [f64; 3],

    /// Earth magnetic field at the origin (gauss, NED).
    pub magnetic_field: [f64; 3],

    pub dilution: DilutionModel,

    pub vehicle: VehicleParams,
}

impl Default for Configuration {
    fn default() -> Self {
        let field = UniformMagneticField::default().field;
        Configuration {
            system_id: 1,
            component_id: 1,
            origin_latitude: 49.766809,
            origin_longitude: -7.5571598,
            ground_height: 0.0,
            warmup_threshold: DEFAULT_WARMUP_THRESHOLD,
            system_time_throttle: DEFAULT_SYSTEM_TIME_THROTTLE,
            quaternion_interval_us: DEFAULT_QUATERNION_INTERVAL_US,
            lockstep: true,
            wind: [0.0; 3],
            magnetic_field: [field.x, field.y, field.z],
            dilution: DilutionModel::default(),
            vehicle: VehicleParams::default(),
        }
    }
}

impl Configuration {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.system_id, self.component_id)
    }

    pub fn wind_vector(&self) -> Vector3<f64> {
        Vector3::from(self.wind)
    }

    pub fn magnetic_field_model(&self) -> UniformMagneticField {
        let [north, east, down] = self.magnetic_field;
        UniformMagneticField::new(north, east, down)
    }

    /// Rejects values the drone cannot run with.
    pub fn validate(&self) -> Result<(), HilError> {
        if !(-90.0..=90.0).contains(&self.origin_latitude) {
            return Err(HilError::Initialization(format!(
                "origin latitude {} is out of range",
                self.origin_latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.origin_longitude) {
            return Err(HilError::Initialization(format!(
                "origin longitude {} is out of range",
                self.origin_longitude
            )));
        }
        if self.system_time_throttle == 0 {
            return Err(HilError::Initialization(
                "system time throttle must be at least 1".to_string(),
            ));
        }
        if self.quaternion_interval_us.is_nan() || self.quaternion_interval_us < 0.0 {
            return Err(HilError::Initialization(format!(
                "quaternion interval {} is invalid",
                self.quaternion_interval_us
            )));
        }
        if self.vehicle.mass.is_nan() || self.vehicle.mass <= 0.0 {
            return Err(HilError::Initialization(format!(
                "vehicle mass {} must be positive",
                self.vehicle.mass
            )));
        }
        if self.vehicle.inertia.iter().any(|i| i.is_nan() || *i <= 0.0) {
            return Err(HilError::Initialization(
                "vehicle inertia must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pacing of the simulation loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Physics steps per simulated second.
    pub rate_hz: f64,
    /// Simulated seconds per wall-clock second. 2.0 runs twice as fast as real time.
    pub speed_factor: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            rate_hz: 100.0,
            speed_factor: 1.0,
        }
    }
}

impl SimulatorConfig {
    /// Simulated time covered by one step.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    /// Wall-clock time between two steps.
    pub fn wall_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / (self.rate_hz * self.speed_factor))
    }

    pub fn validate(&self) -> Result<(), HilError> {
        if !(self.rate_hz.is_finite() && self.rate_hz > 0.0) {
            return Err(HilError::Initialization(format!(
                "simulation rate {} Hz is invalid",
                self.rate_hz
            )));
        }
        if !(self.speed_factor.is_finite() && self.speed_factor > 0.0) {
            return Err(HilError::Initialization(format!(
                "speed factor {} is invalid",
                self.speed_factor
            )));
        }
        Ok(())
    }
}
