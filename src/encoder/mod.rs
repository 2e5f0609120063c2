//! Translation of the vehicle state into the sensor messages an autopilot expects.
//!
//! [SensorEncoder] holds no mutable state. It reads everything it needs through a
//! [SensorSource], so anything that owns a state vector (the drone, a replay, a test
//! fixture) can be encoded.

use std::time::{SystemTime as WallClock, UNIX_EPOCH};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::magnetic::{MagneticFieldModel, UniformMagneticField};
use crate::protocol::{
    GPS_FIX_TYPE_3D, HIL_SENSOR_ALL_FIELDS, HilGps, HilSensor, HilStateQuaternion, SystemTime,
};
use crate::state::{StateDerivative, StateVector};

pub mod baro;
pub mod fields;


pub use baro::altitude_to_pressure;
pub use fields::G_FORCE;

/// Number of satellites reported in every GPS fix.
const SATELLITES_VISIBLE: u8 = u8::MAX;

/// Capabilities the encoder needs from whatever owns the vehicle state.
pub trait SensorSource {
    fn state(&self) -> &StateVector;
    fn derivative(&self) -> &StateDerivative;
    /// Simulated time in microseconds.
    fn sim_time_us(&self) -> u64;
    /// Environment wind in m/s, NED.
    fn environment_wind(&self) -> Vector3<f64>;
    /// Ambient temperature in degrees Celsius.
    fn temperature(&self) -> f32;
}

/// GPS position accuracy as a function of simulated time.
///
/// Dilution starts at `initial_*` and decays exponentially towards `min_*` with the
/// given time constant, mimicking a receiver that improves its fix after power-on. A
/// non-positive time constant reports the minimum from the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilutionModel {
    pub initial_eph: u16,
    pub initial_epv: u16,
    pub min_eph: u16,
    pub min_epv: u16,
    pub time_constant_s: f64,
}

impl Default for DilutionModel {
    fn default() -> Self {
        DilutionModel {
            initial_eph: 2_000,
            initial_epv: 3_000,
            min_eph: 30,
            min_epv: 40,
            time_constant_s: 0.0,
        }
    }
}

impl DilutionModel {
    /// Returns `(eph, epv)` in cm at the given simulated time.
    pub fn at(&self, time_us: u64) -> (u16, u16) {
        if self.time_constant_s <= 0.0 {
            return (self.min_eph, self.min_epv);
        }
        let decay = (-(time_us as f64 / 1e6) / self.time_constant_s).exp();
        let smooth = |initial: u16, min: u16| {
            let initial = f64::from(initial.max(min));
            let min = f64::from(min);
            (min + (initial - min) * decay).round() as u16
        };
        (
            smooth(self.initial_eph, self.min_eph),
            smooth(self.initial_epv, self.min_epv),
        )
    }
}

/// Builds the outbound sensor messages from a [SensorSource].
pub struct SensorEncoder {
    origin_lat_deg: f64,
    origin_lon_deg: f64,
    magnetic_field: Box<dyn MagneticFieldModel>,
    dilution: DilutionModel,
}

impl SensorEncoder {
    pub fn new(origin_lat_deg: f64, origin_lon_deg: f64) -> Self {
        SensorEncoder {
            origin_lat_deg,
            origin_lon_deg,
            magnetic_field: Box::new(UniformMagneticField::default()),
            dilution: DilutionModel::default(),
        }
    }

    pub fn with_magnetic_field(mut self, model: Box<dyn MagneticFieldModel>) -> Self {
        self.magnetic_field = model;
        self
    }

    pub fn with_dilution(mut self, dilution: DilutionModel) -> Self {
        self.dilution = dilution;
        self
    }

    /// Latitude/longitude (degE7) and altitude (mm) of the vehicle.
    pub fn lat_lon_alt<S: SensorSource + ?Sized>(&self, source: &S) -> [i32; 3] {
        fields::lat_lon_alt(source.state(), self.origin_lat_deg, self.origin_lon_deg)
    }

    /// Absolute pressure in hPa for the vehicle's altitude.
    pub fn absolute_pressure<S: SensorSource + ?Sized>(&self, source: &S) -> f32 {
        let alt_mm = self.lat_lon_alt(source)[2];
        (altitude_to_pressure(f64::from(alt_mm) / 1000.0) / 100.0) as f32
    }

    pub fn system_time<S: SensorSource + ?Sized>(&self, source: &S, wall: WallClock) -> SystemTime {
        let time_unix_usec = wall
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        SystemTime {
            time_unix_usec,
            time_boot_ms: u32::try_from(source.sim_time_us() / 1000).unwrap_or(u32::MAX),
        }
    }

    pub fn hil_gps<S: SensorSource + ?Sized>(&self, source: &S) -> HilGps {
        let time_usec = source.sim_time_us();
        let [lat, lon, alt] = self.lat_lon_alt(source);
        let [vn, ve, vd] = fields::earth_fixed_velocity(source.state());
        let ground_speed = fields::ground_speed(source.derivative());
        let (eph, epv) = self.dilution.at(time_usec);

        HilGps {
            time_usec,
            fix_type: GPS_FIX_TYPE_3D,
            lat,
            lon,
            alt,
            eph,
            epv,
            vel: fields::horizontal_speed(&ground_speed),
            vn,
            ve,
            vd,
            cog: fields::course_over_ground(source.state()),
            satellites_visible: SATELLITES_VISIBLE,
            id: 0,
            yaw: fields::yaw_wrt_north(source.state()),
        }
    }

    pub fn hil_sensor<S: SensorSource + ?Sized>(&self, source: &S) -> HilSensor {
        let [xacc, yacc, zacc] = fields::body_acceleration(source.derivative());
        let [xgyro, ygyro, zgyro] = fields::body_rates(source.state());
        let [lat, lon, alt] = self.lat_lon_alt(source);
        let mag = self.magnetic_field.field_at(lat, lon, alt);

        HilSensor {
            time_usec: source.sim_time_us(),
            xacc,
            yacc,
            zacc,
            xgyro,
            ygyro,
            zgyro,
            xmag: mag.x as f32,
            ymag: mag.y as f32,
            zmag: mag.z as f32,
            abs_pressure: self.absolute_pressure(source),
            diff_pressure: 0.0,
            pressure_alt: alt as f32,
            temperature: source.temperature(),
            fields_updated: HIL_SENSOR_ALL_FIELDS,
            id: 0,
        }
    }

    pub fn hil_state_quaternion<S: SensorSource + ?Sized>(&self, source: &S) -> HilStateQuaternion {
        let [rollspeed, pitchspeed, yawspeed] = fields::body_rates(source.state());
        let [lat, lon, alt] = self.lat_lon_alt(source);
        let [vx, vy, vz] = fields::ground_speed(source.derivative());
        let acc = fields::body_acceleration(source.derivative());
        let airspeed = fields::true_wind_speed(source.derivative(), &source.environment_wind());

        HilStateQuaternion {
            time_usec: source.sim_time_us(),
            attitude_quaternion: fields::attitude_quaternion(source.state()),
            rollspeed,
            pitchspeed,
            yawspeed,
            lat,
            lon,
            alt,
            vx,
            vy,
            vz,
            ind_airspeed: airspeed,
            true_airspeed: airspeed,
            xacc: fields::acceleration_mg(acc[0]),
            yacc: fields::acceleration_mg(acc[1]),
            zacc: fields::acceleration_mg(acc[2]),
        }
    }
}
