//! [![license]](https://opensource.org/licenses/MIT)
//!
//! [license]: https://img.shields.io/badge/License-MIT-blue.svg?style=for-the-badge&labelColor=555555
//!
//! Hardware-in-the-loop testing runs a real autopilot against a simulated vehicle: the
//! autopilot receives synthetic sensor readings and answers with actuator commands, and
//! the simulation only moves forward once the autopilot has replied.
//!
//! HilBridge is a Rust library that plays the vehicle side of that exchange over the
//! MAVLink HIL message set. It allows developers to:
//!
//! * Integrate a 6-DOF rigid-body model, or plug in their own equations of motion.
//! * Publish `HIL_SENSOR`, `HIL_GPS`, `HIL_STATE_QUATERNION` and `SYSTEM_TIME` in
//!   lockstep with the autopilot's `HIL_ACTUATOR_CONTROLS`.
//! * Record the outbound telemetry for later analysis.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hil_bridge::{ChannelTransport, Configuration, Drone, HilError, SimClock};
//!
//! fn main() -> Result<(), HilError> {
//!     let (transport, autopilot) = ChannelTransport::pair();
//!     let clock = Arc::new(SimClock::new());
//!     let mut drone = Drone::new(Configuration::default(), clock.clone(), Box::new(transport))?;
//!
//!     for _ in 0..10 {
//!         clock.advance(Duration::from_millis(4));
//!         drone.tick(Duration::from_millis(4));
//!     }
//!
//!     for envelope in autopilot.drain() {
//!         println!("{}", envelope.message.name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! With the `mavlink` feature enabled, [MavlinkTransport] connects the same drone to PX4
//! or ArduPilot, and the `hil_bridge` binary runs the whole loop from the command line.

use thiserror::Error;

pub mod actuators;
pub mod clock;
pub mod config;
pub mod drone;
pub mod dynamics;
pub mod encoder;
pub mod frames;
pub mod ground;
pub mod magnetic;
pub mod protocol;
pub mod recorder;
pub mod simulator;
pub mod state;
pub mod statistics;
pub mod transport;

pub use actuators::{ActuatorRouter, ControlSource};
pub use clock::SimClock;
pub use config::{Configuration, SimulatorConfig};
pub use drone::Drone;
pub use dynamics::{DynamicsIntegrator, RigidBodyIntegrator, StepInput, StepOutput, VehicleParams};
pub use encoder::{DilutionModel, SensorEncoder, SensorSource};
pub use recorder::{RecordedFrame, RecordingReader, RecordingTransport, TelemetryRecorder};
pub use simulator::{Simulator, SimulatorHandle};
pub use state::{StateDerivative, StateVector};
pub use statistics::Statistics;
pub use transport::{AutopilotEndpoint, ChannelTransport, InboundSender, MessageTransport};

#[cfg(feature = "mavlink")]
pub use transport::mavlink::MavlinkTransport;

/// Errors raised while setting up or recording a simulation.
///
/// The per-tick path never fails; problems there are logged and counted in
/// [Statistics].
#[derive(Error, Debug)]
pub enum HilError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Recording error: {0}")]
    Recording(#[from] postcard::Error),

    #[error("Decode error: {0}")]
    Decode(String),
}

#[cfg(feature = "mavlink")]
impl From<mavlink::error::MessageWriteError> for HilError {
    fn from(e: mavlink::error::MessageWriteError) -> Self {
        HilError::Connection(format!("MAVLink send failed: {:?}", e))
    }
}
