//! Equations of motion.
//!
//! The bridge only depends on the [DynamicsIntegrator] contract. [RigidBodyIntegrator]
//! is a compact 6-DOF model of a VTOL airframe (four lift rotors in an X layout, one
//! pusher propeller, two elevons) so the bridge can fly without an external flight
//! dynamics package.

use std::f64::consts::FRAC_1_SQRT_2;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::actuators::ControlSource;
use crate::encoder::G_FORCE;
use crate::frames::{euler_rate_matrix, state_body_to_earth};
use crate::state::{
    ANGULAR_ACCELERATION, ATTITUDE, BODY_ACCELERATION, BODY_RATES, BODY_VELOCITY,
    EARTH_VELOCITY, EULER_RATES, StateDerivative, StateVector, block, set_block,
};

/// Everything the integrator gets for one step.
pub struct StepInput<'a> {
    pub state: &'a StateVector,
    /// Simulated time at the start of the step (s).
    pub time_s: f64,
    pub dt_s: f64,
    /// Airborne flag returned by the previous step.
    pub airborne: bool,
    pub controls: &'a dyn ControlSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub state: StateVector,
    pub derivative: StateDerivative,
    pub airborne: bool,
}

/// Advances the vehicle state by one time step.
pub trait DynamicsIntegrator: Send {
    fn step(&mut self, input: StepInput<'_>) -> StepOutput;
}

/// Physical parameters of the simulated airframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    /// kg
    pub mass: f64,
    /// Principal moments of inertia (kg·m²).
    pub inertia: [f64; 3],
    /// Distance from the centre of mass to each lift rotor (m).
    pub arm_length: f64,
    /// Thrust of one lift rotor at full command (N).
    pub vtol_max_thrust: f64,
    /// Reaction torque per newton of lift rotor thrust (m).
    pub vtol_torque_coefficient: f64,
    /// Thrust of the pusher propeller at full command (N).
    pub forward_max_thrust: f64,
    /// Reference wing area (m²).
    pub wing_area: f64,
    /// Moment per unit dynamic pressure, area and deflection (m).
    pub elevon_moment_coefficient: f64,
    /// Linear drag (N per m/s).
    pub drag_coefficient: f64,
    /// Rotational damping (N·m per rad/s).
    pub angular_damping: f64,
    /// kg/m³
    pub air_density: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        VehicleParams {
            mass: 1.5,
            inertia: [0.03, 0.03, 0.05],
            arm_length: 0.25,
            vtol_max_thrust: 8.0,
            vtol_torque_coefficient: 0.016,
            forward_max_thrust: 10.0,
            wing_area: 0.3,
            elevon_moment_coefficient: 0.05,
            drag_coefficient: 0.2,
            angular_damping: 0.02,
            air_density: 1.225,
        }
    }
}

impl VehicleParams {
    pub fn weight(&self) -> f64 {
        self.mass * G_FORCE
    }
}

/// Lift rotor positions as (x, y) multiples of the arm length, and spin direction.
///
/// Quad X numbering: front right, rear left, front left, rear right. `1.0` marks a
/// counter-clockwise rotor, whose reaction torque yaws the body clockwise (positive).
const VTOL_ROTORS: [(f64, f64, f64); 4] = [
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2, 1.0),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 1.0),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2, -1.0),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2, -1.0),
];

/// Altitude above the ground plane that counts as flying (m).
const AIRBORNE_CLEARANCE: f64 = 0.001;

/// Explicit Euler integration of a rigid body.
///
/// While grounded the landing gear takes up any net downward force and the pusher
/// propeller is ignored, so the vehicle only leaves the ground once the lift rotors
/// carry its weight.
#[derive(Debug, Clone)]
pub struct RigidBodyIntegrator {
    params: VehicleParams,
    ground_height: f64,
}

impl RigidBodyIntegrator {
    pub fn new(params: VehicleParams, ground_height: f64) -> Self {
        RigidBodyIntegrator {
            params,
            ground_height,
        }
    }

    /// Total lift rotor thrust (N) and the moment it produces about the body axes.
    fn vtol_forces(&self, commands: &[f64]) -> (f64, Vector3<f64>) {
        let p = &self.params;
        let mut total = 0.0;
        let mut moment = Vector3::zeros();

        for (command, &(x, y, spin)) in commands.iter().zip(VTOL_ROTORS.iter()) {
            let thrust = command.clamp(0.0, 1.0) * p.vtol_max_thrust;
            let (x, y) = (x * p.arm_length, y * p.arm_length);
            // r × (0, 0, -T)
            moment += Vector3::new(-y * thrust, x * thrust, spin * p.vtol_torque_coefficient * thrust);
            total += thrust;
        }
        (total, moment)
    }

    fn elevon_moment(&self, commands: &[f64], airspeed: f64) -> Vector3<f64> {
        let p = &self.params;
        let left = commands.first().copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let right = commands.get(1).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let scale = 0.5 * p.air_density * airspeed * airspeed * p.wing_area * p.elevon_moment_coefficient;

        Vector3::new(scale * (left - right) / 2.0, scale * (left + right) / 2.0, 0.0)
    }

    /// Evaluates the state derivative. Returns it with the lift rotor thrust.
    fn derivative(&self, input: &StepInput<'_>) -> (StateDerivative, f64) {
        let p = &self.params;
        let state = input.state;
        let rotation: Matrix3<f64> = state_body_to_earth(state);
        let velocity = block(state, BODY_VELOCITY);
        let rates = block(state, BODY_RATES);
        let attitude = block(state, ATTITUDE);

        let (lift, vtol_moment) = self.vtol_forces(input.controls.vtol(input.dt_s));
        let aero_moment = self.elevon_moment(input.controls.aero(input.dt_s), velocity.norm());

        let gravity = rotation.transpose() * Vector3::new(0.0, 0.0, p.weight());
        let mut force = Vector3::new(0.0, 0.0, -lift) - velocity * p.drag_coefficient + gravity;
        if input.airborne {
            let pusher = input.controls.thrust(input.dt_s).first().copied().unwrap_or(0.0);
            force.x += pusher.clamp(0.0, 1.0) * p.forward_max_thrust;
        } else {
            // the ground carries whatever weight the rotors do not
            let mut earth = rotation * force;
            earth.z = earth.z.min(0.0);
            force = rotation.transpose() * earth;
        }

        let inertia = Vector3::from(p.inertia);
        let moment = vtol_moment + aero_moment - rates * p.angular_damping;
        let gyroscopic = rates.cross(&inertia.component_mul(&rates));

        let mut derivative = StateDerivative::zeros();
        set_block(&mut derivative, EARTH_VELOCITY, &(rotation * velocity));
        set_block(
            &mut derivative,
            BODY_ACCELERATION,
            &(force / p.mass - rates.cross(&velocity)),
        );
        set_block(
            &mut derivative,
            EULER_RATES,
            &(euler_rate_matrix(attitude.x, attitude.y) * rates),
        );
        set_block(
            &mut derivative,
            ANGULAR_ACCELERATION,
            &(moment - gyroscopic).component_div(&inertia),
        );
        (derivative, lift)
    }
}

impl Default for RigidBodyIntegrator {
    fn default() -> Self {
        RigidBodyIntegrator::new(VehicleParams::default(), 0.0)
    }
}

impl DynamicsIntegrator for RigidBodyIntegrator {
    fn step(&mut self, input: StepInput<'_>) -> StepOutput {
        let (derivative, lift) = self.derivative(&input);
        let state = input.state + derivative * input.dt_s;

        let altitude = -state[2];
        let airborne =
            lift >= self.params.weight() || altitude > self.ground_height + AIRBORNE_CLEARANCE;

        StepOutput {
            state,
            derivative,
            airborne,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;
    use crate::actuators::ActuatorRouter;
    use crate::state::initial_state;

    fn step(
        integrator: &mut RigidBodyIntegrator,
        state: &StateVector,
        airborne: bool,
        controls: &ActuatorRouter,
        dt_s: f64,
    ) -> StepOutput {
        integrator.step(StepInput {
            state,
            time_s: 0.0,
            dt_s,
            airborne,
            controls,
        })
    }

    #[test]
    fn idle_vehicle_on_ground_stays_grounded() {
        let mut integrator = RigidBodyIntegrator::default();
        let state = initial_state();

        let out = step(&mut integrator, &state, false, &ActuatorRouter::new(), 0.004);

        assert!(!out.airborne);
        assert_eq!(out.state[2], 0.0);
        assert_eq!(out.derivative[BODY_ACCELERATION + 2], 0.0);
        // the forward seed carries through
        assert_relative_eq!(out.derivative[EARTH_VELOCITY], 0.01);
    }

    #[test]
    fn full_lift_takes_off() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([1.0; 4]);

        let out = step(&mut integrator, &StateVector::zeros(), false, &controls, 0.004);

        assert!(out.airborne);
        assert!(out.derivative[BODY_ACCELERATION + 2] < 0.0);
        assert!(out.state[BODY_VELOCITY + 2] < 0.0);
    }

    #[test]
    fn sub_weight_lift_does_not_lift_off() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([0.3; 4]);

        let mut state = StateVector::zeros();
        let mut airborne = false;
        for _ in 0..200 {
            let out = step(&mut integrator, &state, airborne, &controls, 0.004);
            state = out.state;
            airborne = out.airborne;
            assert!(!airborne);
            assert!(state[2] >= 0.0, "rose to z = {}", state[2]);
        }
    }

    #[test]
    fn unpowered_airborne_vehicle_falls_at_one_g() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut state = StateVector::zeros();
        state[2] = -50.0;

        let out = step(&mut integrator, &state, true, &ActuatorRouter::new(), 0.01);

        assert!(out.airborne);
        assert_abs_diff_eq!(out.derivative[BODY_ACCELERATION + 2], G_FORCE, epsilon = 1e-12);
    }

    #[test]
    fn hover_thrust_balances_gravity() {
        let params = VehicleParams::default();
        let command = params.weight() / (4.0 * params.vtol_max_thrust);
        let mut integrator = RigidBodyIntegrator::new(params, 0.0);
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([command; 4]);
        let mut state = StateVector::zeros();
        state[2] = -10.0;

        let out = step(&mut integrator, &state, true, &controls, 0.01);

        assert_abs_diff_eq!(out.derivative[BODY_ACCELERATION + 2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(block(&out.derivative, ANGULAR_ACCELERATION).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn left_rotors_roll_right() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([0.5, 0.7, 0.7, 0.5]);

        let out = step(&mut integrator, &StateVector::zeros(), true, &controls, 0.004);

        assert!(out.derivative[ANGULAR_ACCELERATION] > 0.0);
        assert_abs_diff_eq!(out.derivative[ANGULAR_ACCELERATION + 1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.derivative[ANGULAR_ACCELERATION + 2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn counter_clockwise_rotors_yaw_clockwise() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([0.6, 0.6, 0.4, 0.4]);

        let out = step(&mut integrator, &StateVector::zeros(), true, &controls, 0.004);

        assert!(out.derivative[ANGULAR_ACCELERATION + 2] > 0.0);
        assert_abs_diff_eq!(out.derivative[ANGULAR_ACCELERATION], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.derivative[ANGULAR_ACCELERATION + 1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn elevons_need_airspeed() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_aero([1.0, 1.0]);

        let still = step(&mut integrator, &StateVector::zeros(), true, &controls, 0.004);
        assert_eq!(still.derivative[ANGULAR_ACCELERATION + 1], 0.0);

        let mut state = StateVector::zeros();
        state[BODY_VELOCITY] = 15.0;
        let moving = step(&mut integrator, &state, true, &controls, 0.004);
        assert!(moving.derivative[ANGULAR_ACCELERATION + 1] > 0.0);
    }

    #[test]
    fn pusher_only_acts_when_airborne() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_thrust([1.0]);

        let grounded = step(&mut integrator, &StateVector::zeros(), false, &controls, 0.004);
        let flying = step(&mut integrator, &StateVector::zeros(), true, &controls, 0.004);

        assert_eq!(grounded.derivative[BODY_ACCELERATION], 0.0);
        assert!(flying.derivative[BODY_ACCELERATION] > 0.0);
    }

    #[test]
    fn step_is_explicit_euler() {
        let mut integrator = RigidBodyIntegrator::default();
        let mut controls = ActuatorRouter::new();
        controls.set_vtol([0.9, 0.8, 0.7, 0.6]);
        let mut state = initial_state();
        state[2] = -3.0;
        state[BODY_RATES + 2] = 0.2;

        let out = step(&mut integrator, &state, true, &controls, 0.01);

        assert_relative_eq!(out.state, state + out.derivative * 0.01);
    }

    #[test]
    fn zero_step_keeps_state() {
        let mut integrator = RigidBodyIntegrator::default();
        let state = initial_state();

        let out = step(&mut integrator, &state, false, &ActuatorRouter::new(), 0.0);

        assert_eq!(out.state, state);
    }
}
