//! Routing of autopilot actuator outputs to the vehicle's control surfaces.

use log::debug;

/// Number of VTOL (lift) propellers.
pub const VTOL_CHANNELS: usize = 4;
/// Number of aerodynamic control surfaces.
pub const AERO_CHANNELS: usize = 2;
/// Number of forward thrust propellers.
pub const THRUST_CHANNELS: usize = 1;
/// Length of the actuator vector accepted by [ActuatorRouter::apply].
pub const ACTUATOR_VECTOR_LEN: usize = VTOL_CHANNELS + AERO_CHANNELS + THRUST_CHANNELS;

/// Read access to the current control vectors.
///
/// This is the only view of the actuators the dynamics integrator gets. The `dt`
/// argument is the step being integrated; implementations may ignore it.
pub trait ControlSource {
    fn thrust(&self, dt: f64) -> &[f64];
    fn aero(&self, dt: f64) -> &[f64];
    fn vtol(&self, dt: f64) -> &[f64];
}

/// Holds the three control vectors of the vehicle.
///
/// Vectors are replaced wholesale and persist until overwritten. There is no hold
/// expiry: a stale command stays in effect for as long as nobody replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorRouter {
    thrust: [f64; THRUST_CHANNELS],
    aero: [f64; AERO_CHANNELS],
    vtol: [f64; VTOL_CHANNELS],
}

impl Default for ActuatorRouter {
    fn default() -> Self {
        ActuatorRouter {
            thrust: [0.0; THRUST_CHANNELS],
            aero: [0.0; AERO_CHANNELS],
            vtol: [0.0; VTOL_CHANNELS],
        }
    }
}

impl ActuatorRouter {
    pub fn new() -> Self {
        ActuatorRouter::default()
    }

    pub fn set_thrust(&mut self, controls: [f64; THRUST_CHANNELS]) {
        self.thrust = controls;
    }

    pub fn set_aero(&mut self, controls: [f64; AERO_CHANNELS]) {
        self.aero = controls;
    }

    pub fn set_vtol(&mut self, controls: [f64; VTOL_CHANNELS]) {
        self.vtol = controls;
    }

    /// Splits an actuator vector into VTOL (4), aero (2) and thrust (1) controls.
    pub fn apply(&mut self, actuators: &[f64; ACTUATOR_VECTOR_LEN]) {
        let mut vtol = [0.0; VTOL_CHANNELS];
        let mut aero = [0.0; AERO_CHANNELS];
        let mut thrust = [0.0; THRUST_CHANNELS];

        vtol.copy_from_slice(&actuators[..VTOL_CHANNELS]);
        aero.copy_from_slice(&actuators[VTOL_CHANNELS..VTOL_CHANNELS + AERO_CHANNELS]);
        thrust.copy_from_slice(&actuators[VTOL_CHANNELS + AERO_CHANNELS..]);

        debug!(
            target: "hil_bridge::actuators",
            "vtol {:?} aero {:?} thrust {:?}", vtol, aero, thrust
        );

        self.set_vtol(vtol);
        self.set_aero(aero);
        self.set_thrust(thrust);
    }
}

impl ControlSource for ActuatorRouter {
    fn thrust(&self, _dt: f64) -> &[f64] {
        &self.thrust
    }

    fn aero(&self, _dt: f64) -> &[f64] {
        &self.aero
    }

    fn vtol(&self, _dt: f64) -> &[f64] {
        &self.vtol
    }
}
