//! Flat ground plane contact.

use log::trace;
use nalgebra::Vector3;

use crate::encoder::G_FORCE;
use crate::frames::state_body_to_earth;
use crate::state::{
    BODY_ACCELERATION, BODY_RATES, BODY_VELOCITY, EULER_RATES, StateDerivative, StateVector,
    block, clear_block, set_block,
};

/// Altitude margin within which the vehicle counts as touching the ground (m).
const CONTACT_TOLERANCE: f64 = 0.001;

/// Keeps the vehicle from sinking through a flat ground plane.
///
/// `ground_height` is the altitude of the plane in metres, positive up, so the plane
/// sits at NED `z = -ground_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContactModel {
    pub ground_height: f64,
}

impl GroundContactModel {
    pub fn new(ground_height: f64) -> Self {
        GroundContactModel { ground_height }
    }

    /// Returns true when the vehicle at `state` is on or below the plane and the
    /// velocity projected one step ahead does not point up.
    pub fn in_contact(&self, state: &StateVector, derivative: &StateDerivative, dt: f64) -> bool {
        let altitude = -state[2];
        if altitude > self.ground_height + CONTACT_TOLERANCE {
            return false;
        }

        let rotation = state_body_to_earth(state);
        let velocity: Vector3<f64> = rotation * block(state, BODY_VELOCITY);
        let acceleration: Vector3<f64> = rotation * block(derivative, BODY_ACCELERATION);

        velocity.z + acceleration.z * dt >= 0.0
    }

    /// Clamps the vehicle to the plane when in contact.
    ///
    /// Pins the altitude, zeroes body velocity and angular velocity, replaces the body
    /// acceleration with a resting one-g reading and zeroes the Euler rates. Attitude
    /// is left alone. Returns whether the clamp was applied.
    pub fn apply(&self, state: &mut StateVector, derivative: &mut StateDerivative, dt: f64) -> bool {
        if !self.in_contact(state, derivative, dt) {
            return false;
        }

        trace!(target: "hil_bridge::ground", "ground contact at z = {:.4}", state[2]);

        state[2] = -self.ground_height;
        clear_block(state, BODY_VELOCITY);
        clear_block(state, BODY_RATES);

        set_block(derivative, BODY_ACCELERATION, &Vector3::new(0.0, 0.0, -G_FORCE));
        clear_block(derivative, EULER_RATES);

        true
    }
}

impl Default for GroundContactModel {
    fn default() -> Self {
        GroundContactModel::new(0.0)
    }
}
