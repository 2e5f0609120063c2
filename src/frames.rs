//! Coordinate frame helpers: body/earth rotation and flat-earth geodetic conversion.

use nalgebra::{Matrix3, Vector3};

use crate::state::{ATTITUDE, POSITION, StateVector, block};

/// WGS-84 semi-major axis (m).
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 first eccentricity squared.
const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Body-to-earth rotation for a ZYX (yaw, pitch, roll) Euler sequence.
pub fn body_to_earth(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    let (sr, cr) = roll.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sy, cy) = yaw.sin_cos();

    Matrix3::new(
        cp * cy,
        sr * sp * cy - cr * sy,
        cr * sp * cy + sr * sy,
        cp * sy,
        sr * sp * sy + cr * cy,
        cr * sp * sy - sr * cy,
        -sp,
        sr * cp,
        cr * cp,
    )
}

/// Body-to-earth rotation for the attitude held in `state`.
pub fn state_body_to_earth(state: &StateVector) -> Matrix3<f64> {
    let attitude = block(state, ATTITUDE);
    body_to_earth(attitude.x, attitude.y, attitude.z)
}

/// Maps body angular velocity to Euler angle rates.
///
/// Singular at pitch ±90°; the caller gets non-finite rates there.
pub fn euler_rate_matrix(roll: f64, pitch: f64) -> Matrix3<f64> {
    let (sr, cr) = roll.sin_cos();
    let tp = pitch.tan();
    let cp = pitch.cos();

    Matrix3::new(
        1.0,
        sr * tp,
        cr * tp,
        0.0,
        cr,
        -sr,
        0.0,
        sr / cp,
        cr / cp,
    )
}

/// A geodetic position in degrees and metres above the reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

/// Converts the NED position in `state` to geodetic coordinates.
///
/// Uses a flat-earth approximation around the origin: north and east offsets are
/// scaled by the meridian and prime-vertical radii of curvature at the origin
/// latitude. Altitude is the negated down component.
pub fn ned_to_geodetic(origin_lat_deg: f64, origin_lon_deg: f64, state: &StateVector) -> Geodetic {
    let ned: Vector3<f64> = block(state, POSITION);
    let lat0 = origin_lat_deg.to_radians();

    let sin_lat = lat0.sin();
    let denom = 1.0 - WGS84_E2 * sin_lat * sin_lat;
    let prime_vertical = WGS84_A / denom.sqrt();
    let meridian = WGS84_A * (1.0 - WGS84_E2) / (denom * denom.sqrt());

    let d_lat = ned.x / meridian;
    let d_lon = ned.y / (prime_vertical * lat0.cos());

    Geodetic {
        latitude_deg: origin_lat_deg + d_lat.to_degrees(),
        longitude_deg: origin_lon_deg + d_lon.to_degrees(),
        altitude_m: -ned.z,
    }
}
