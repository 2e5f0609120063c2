//! Sensor field derivations.
//!
//! Every function here is a pure mapping from the state (and its derivative) to one
//! sensor reading in the units the autopilot expects. Non-finite inputs are passed
//! through; the only substitutions are the resting-acceleration and zero-yaw rules.

use nalgebra::Vector3;

use crate::frames::{ned_to_geodetic, state_body_to_earth};
use crate::state::{
    ATTITUDE, BODY_ACCELERATION, BODY_RATES, BODY_VELOCITY, EARTH_VELOCITY, StateDerivative,
    StateVector, YAW, block,
};

/// Gravitational acceleration used for the resting accelerometer value and mG scaling.
pub const G_FORCE: f64 = 9.81;

/// Vertical accelerations this close to zero are treated as the resting artifact.
const RESTING_ACCELERATION_BAND: f32 = 1e-4;

/// Centidegrees in a full turn.
const FULL_TURN_CDEG: f64 = 36_000.0;

/// Converts roll, pitch and yaw to a quaternion in `[w, x, y, z]` order.
///
/// Half-angle aerospace (ZYX) convention. The result is not renormalized.
pub fn euler_to_quaternion(roll: f32, pitch: f32, yaw: f32) -> [f32; 4] {
    let (sr, cr) = (roll / 2.0).sin_cos();
    let (sp, cp) = (pitch / 2.0).sin_cos();
    let (sy, cy) = (yaw / 2.0).sin_cos();

    [
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    ]
}

/// Attitude quaternion `[w, x, y, z]` of the vehicle.
pub fn attitude_quaternion(state: &StateVector) -> [f32; 4] {
    euler_to_quaternion(
        state[ATTITUDE] as f32,
        state[ATTITUDE + 1] as f32,
        state[ATTITUDE + 2] as f32,
    )
}

/// Body angular rates (rad/s).
pub fn body_rates(state: &StateVector) -> [f32; 3] {
    [
        state[BODY_RATES] as f32,
        state[BODY_RATES + 1] as f32,
        state[BODY_RATES + 2] as f32,
    ]
}

/// Earth-frame velocity from the derivative, NED, in cm/s.
pub fn ground_speed(derivative: &StateDerivative) -> [i16; 3] {
    let v = block(derivative, EARTH_VELOCITY) * 100.0;
    [v.x as i16, v.y as i16, v.z as i16]
}

/// Horizontal magnitude of a NED velocity in cm/s.
pub fn horizontal_speed(ned_cm_s: &[i16; 3]) -> u16 {
    let north = f64::from(ned_cm_s[0]);
    let east = f64::from(ned_cm_s[1]);
    (north * north + east * east).sqrt() as u16
}

/// Body-frame acceleration (m/s²).
///
/// A vertical component within ±0.0001 is replaced by exactly `-G_FORCE`: while the
/// vehicle rests on the ground the flight model reports near-zero vertical
/// acceleration, whereas a real accelerometer reads one g.
pub fn body_acceleration(derivative: &StateDerivative) -> [f32; 3] {
    let mut acc = [
        derivative[BODY_ACCELERATION] as f32,
        derivative[BODY_ACCELERATION + 1] as f32,
        derivative[BODY_ACCELERATION + 2] as f32,
    ];
    if acc[2] < RESTING_ACCELERATION_BAND && acc[2] > -RESTING_ACCELERATION_BAND {
        acc[2] = -G_FORCE as f32;
    }
    acc
}

/// Converts an acceleration in m/s² to milli-g.
pub fn acceleration_mg(acceleration: f32) -> i16 {
    ((acceleration / G_FORCE as f32) * 1000.0).round() as i16
}

/// Latitude and longitude in degE7, altitude in mm.
pub fn lat_lon_alt(state: &StateVector, origin_lat_deg: f64, origin_lon_deg: f64) -> [i32; 3] {
    let geo = ned_to_geodetic(origin_lat_deg, origin_lon_deg, state);
    [
        (geo.latitude_deg * 1e7) as i32,
        (geo.longitude_deg * 1e7) as i32,
        (geo.altitude_m * 1000.0) as i32,
    ]
}

/// Body velocity rotated into the earth frame, NED, truncated to cm/s.
pub fn earth_fixed_velocity(state: &StateVector) -> [i16; 3] {
    let earth = state_body_to_earth(state) * block(state, BODY_VELOCITY) * 100.0;
    [earth.x as i16, earth.y as i16, earth.z as i16]
}

/// Magnitude of the apparent wind in cm/s.
///
/// `wind` is the environment wind in m/s. The apparent wind is the negated sum of the
/// ground speed and the environment wind.
pub fn true_wind_speed(derivative: &StateDerivative, wind: &Vector3<f64>) -> u16 {
    let speed = ground_speed(derivative);
    let ground = Vector3::new(
        f64::from(speed[0]),
        f64::from(speed[1]),
        f64::from(speed[2]),
    );
    let apparent = -(ground + wind * 100.0);
    apparent.norm() as u16
}

/// Course over ground in cdeg, `0..36000`.
///
/// Computed from the body-frame velocity without rotating it into the earth frame.
pub fn course_over_ground(state: &StateVector) -> u16 {
    let v = block(state, BODY_VELOCITY);
    let cdeg = (v.x.atan2(v.y).to_degrees() * 100.0).rem_euclid(FULL_TURN_CDEG);
    // rem_euclid rounds tiny negative angles up to a full turn
    if cdeg >= FULL_TURN_CDEG { 0 } else { cdeg as u16 }
}

/// Yaw relative to true north in cdeg.
///
/// Zero means "yaw unavailable" on the wire, so a rounded zero is reported as 1.
pub fn yaw_wrt_north(state: &StateVector) -> u16 {
    let cdeg = (state[YAW].to_degrees() * 100.0).round().rem_euclid(FULL_TURN_CDEG) as u16;
    if cdeg == 0 { 1 } else { cdeg }
}
