//! The simulated vehicle and its lockstep exchange with the autopilot.
//!
//! Every [Drone::tick] runs the same cycle: drain the inbound queue, integrate the
//! equations of motion, clamp to the ground, and publish whatever sensor messages are
//! due. Inbound messages can be queued from any thread at any time through
//! [Drone::handle_inbound] or an [InboundSender]; they only take effect at the start of
//! the next tick.

use std::sync::Arc;
use std::time::{Duration, SystemTime as WallClock};

use crossbeam_channel::{Receiver, unbounded};
use log::{debug, info, trace, warn};
use nalgebra::Vector3;

use crate::HilError;
use crate::actuators::{ACTUATOR_VECTOR_LEN, ActuatorRouter};
use crate::clock::SimClock;
use crate::config::Configuration;
use crate::dynamics::{DynamicsIntegrator, RigidBodyIntegrator, StepInput};
use crate::encoder::baro::standard_temperature;
use crate::encoder::{SensorEncoder, SensorSource};
use crate::ground::GroundContactModel;
use crate::protocol::{
    CommandAck, CommandLong, Endpoint, HilActuatorControls, InboundEnvelope, InboundMessage,
    MAV_CMD_SET_MESSAGE_INTERVAL, MAV_RESULT_ACCEPTED, OutboundEnvelope, OutboundMessage,
};
use crate::state::{StateDerivative, StateVector, initial_state};
use crate::statistics::{Statistics, StatisticsEngine};
use crate::transport::{InboundSender, MessageTransport};

/// Autopilot channels feeding the actuator vector: four lift rotors, two elevons and
/// the pusher on channel 8. Channels 6 and 7 are unused outputs of the mixer.
const ACTUATOR_CHANNELS: [usize; ACTUATOR_VECTOR_LEN] = [0, 1, 2, 3, 4, 5, 8];

/// A simulated VTOL vehicle speaking the HIL protocol.
pub struct Drone {
    endpoint: Endpoint,
    clock: Arc<SimClock>,
    transport: Box<dyn MessageTransport>,
    integrator: Box<dyn DynamicsIntegrator>,
    ground: GroundContactModel,
    encoder: SensorEncoder,
    actuators: ActuatorRouter,

    inbound_sender: InboundSender,
    inbound: Receiver<InboundEnvelope>,

    state: StateVector,
    derivative: StateDerivative,
    airborne: bool,
    armed: bool,
    wind: Vector3<f64>,

    lockstep: bool,
    reply_lockstep_due: bool,
    actuator_messages: u32,
    warmup_threshold: u32,
    publish_count: u64,
    system_time_throttle: u64,
    quaternion_interval_us: f64,
    last_quaternion_us: u64,

    statistics: Arc<StatisticsEngine>,
}

impl Drone {
    /// Builds a drone flying the built-in rigid-body model.
    pub fn new(
        config: Configuration,
        clock: Arc<SimClock>,
        transport: Box<dyn MessageTransport>,
    ) -> Result<Self, HilError> {
        let integrator = RigidBodyIntegrator::new(config.vehicle.clone(), config.ground_height);
        Drone::with_integrator(config, clock, transport, Box::new(integrator))
    }

    /// Builds a drone around an external equations-of-motion integrator.
    ///
    /// Attaches the transport to the drone's inbound queue. Fails if the configuration
    /// is invalid or the transport cannot be attached.
    pub fn with_integrator(
        config: Configuration,
        clock: Arc<SimClock>,
        mut transport: Box<dyn MessageTransport>,
        integrator: Box<dyn DynamicsIntegrator>,
    ) -> Result<Self, HilError> {
        config.validate()?;

        let (sender, receiver) = unbounded();
        let inbound_sender = InboundSender::new(sender);
        transport.attach(inbound_sender.clone())?;

        let encoder = SensorEncoder::new(config.origin_latitude, config.origin_longitude)
            .with_magnetic_field(Box::new(config.magnetic_field_model()))
            .with_dilution(config.dilution);

        info!(
            target: "hil_bridge::drone",
            "drone {}/{} at {:.6}, {:.6}",
            config.system_id, config.component_id, config.origin_latitude, config.origin_longitude
        );

        Ok(Drone {
            endpoint: config.endpoint(),
            clock,
            transport,
            integrator,
            ground: GroundContactModel::new(config.ground_height),
            encoder,
            actuators: ActuatorRouter::new(),
            inbound_sender,
            inbound: receiver,
            state: initial_state(),
            derivative: StateDerivative::zeros(),
            airborne: false,
            armed: false,
            wind: config.wind_vector(),
            lockstep: config.lockstep,
            reply_lockstep_due: false,
            actuator_messages: 0,
            warmup_threshold: config.warmup_threshold,
            publish_count: 0,
            system_time_throttle: u64::from(config.system_time_throttle),
            quaternion_interval_us: config.quaternion_interval_us,
            last_quaternion_us: 0,
            statistics: Arc::new(StatisticsEngine::new()),
        })
    }

    /// Queues an inbound message for the next tick. Never blocks.
    pub fn handle_inbound(&self, envelope: InboundEnvelope) {
        if !self.inbound_sender.send(envelope) {
            warn!(target: "hil_bridge::drone", "inbound queue closed, message dropped");
        }
    }

    /// A handle producers on other threads can queue inbound messages with.
    pub fn inbound_sender(&self) -> InboundSender {
        self.inbound_sender.clone()
    }

    /// Runs one simulation cycle covering `dt` of simulated time.
    ///
    /// A zero `dt` still processes messages and publishes, but leaves the dynamics
    /// untouched.
    pub fn tick(&mut self, dt: Duration) {
        self.statistics.increment_tick_count();

        self.process_inbound();

        if !dt.is_zero() {
            self.integrate(dt);
        }
        self.ground
            .apply(&mut self.state, &mut self.derivative, dt.as_secs_f64());

        self.publish_state();
    }

    /// The clock already reads the end of the step; the integrator starts from `now - dt`.
    fn integrate(&mut self, dt: Duration) {
        let output = self.integrator.step(StepInput {
            state: &self.state,
            time_s: self.clock.now().saturating_sub(dt).as_secs_f64(),
            dt_s: dt.as_secs_f64(),
            airborne: self.airborne,
            controls: &self.actuators,
        });

        if output.airborne != self.airborne {
            info!(
                target: "hil_bridge::drone",
                "{} at {:.3} s",
                if output.airborne { "took off" } else { "landed" },
                self.clock.now().as_secs_f64()
            );
        }

        self.state = output.state;
        self.derivative = output.derivative;
        self.airborne = output.airborne;
    }

    fn process_inbound(&mut self) {
        let inbound = self.inbound.clone();
        for envelope in inbound.try_iter() {
            self.statistics.increment_inbound_count();
            trace!(
                target: "hil_bridge::drone",
                "received {} from {}/{}",
                envelope.message.name(), envelope.sender.system_id, envelope.sender.component_id
            );
            self.dispatch(envelope);
        }
    }

    fn dispatch(&mut self, envelope: InboundEnvelope) {
        match envelope.message {
            InboundMessage::Heartbeat => {}
            InboundMessage::HilActuatorControls(controls) => {
                self.process_actuator_controls(&controls);
            }
            InboundMessage::CommandLong(command) => {
                self.process_command(envelope.sender, &command);
            }
            InboundMessage::Unsupported(id) => {
                self.statistics.increment_unknown_count();
                debug!(target: "hil_bridge::drone", "ignoring message id {}", id);
            }
        }
    }

    fn process_actuator_controls(&mut self, controls: &HilActuatorControls) {
        let actuators = ACTUATOR_CHANNELS.map(|channel| f64::from(controls.controls[channel]));
        self.actuators.apply(&actuators);

        self.armed = controls.is_armed();
        self.reply_lockstep_due = true;
        self.actuator_messages = self.actuator_messages.saturating_add(1);
        self.statistics.increment_actuator_count();
    }

    fn process_command(&mut self, sender: Endpoint, command: &CommandLong) {
        match command.command {
            MAV_CMD_SET_MESSAGE_INTERVAL => {
                let interval = command.param(2);
                info!(
                    target: "hil_bridge::drone",
                    "state quaternion interval set to {} us", interval
                );
                self.quaternion_interval_us = f64::from(interval);
            }
            other => {
                warn!(target: "hil_bridge::drone", "unknown command id {}", other);
            }
        }

        self.publish(OutboundMessage::CommandAck(CommandAck {
            command: command.command,
            result: MAV_RESULT_ACCEPTED,
            target_system: sender.system_id,
            target_component: sender.component_id,
        }));
    }

    fn publish_state(&mut self) {
        if !self.transport.is_connected() {
            return;
        }
        if !(self.reply_lockstep_due || self.actuator_messages < self.warmup_threshold) {
            return;
        }

        self.clock.unlock_time();

        if self.publish_count % self.system_time_throttle == 0 {
            self.publish(OutboundMessage::SystemTime(
                self.encoder.system_time(self, WallClock::now()),
            ));
        }
        self.publish_count = self.publish_count.wrapping_add(1);

        self.publish(OutboundMessage::HilGps(self.encoder.hil_gps(self)));
        self.publish(OutboundMessage::HilSensor(self.encoder.hil_sensor(self)));
        self.reply_lockstep_due = false;

        let now = self.clock.now_us();
        let elapsed = now.saturating_sub(self.last_quaternion_us) as f64;
        if elapsed > self.quaternion_interval_us {
            self.last_quaternion_us = now;
            self.publish(OutboundMessage::HilStateQuaternion(
                self.encoder.hil_state_quaternion(self),
            ));
        }
    }

    fn publish(&self, message: OutboundMessage) {
        let name = message.name();
        let envelope = OutboundEnvelope {
            source: self.endpoint,
            message,
        };
        match self.transport.send(envelope) {
            Ok(()) => {
                self.statistics.increment_published_count();
                trace!(target: "hil_bridge::drone", "sent {}", name);
            }
            Err(e) => {
                self.statistics.increment_error_count();
                warn!(target: "hil_bridge::drone", "failed to send {}: {}", name, e);
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn clock(&self) -> &Arc<SimClock> {
        &self.clock
    }

    /// Whether the clock should wait for the autopilot between steps.
    pub fn is_lockstep(&self) -> bool {
        self.lockstep
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    /// Safety-armed bit of the most recent actuator controls.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn actuators(&self) -> &ActuatorRouter {
        &self.actuators
    }

    /// Current `HIL_STATE_QUATERNION` interval (µs).
    pub fn quaternion_interval_us(&self) -> f64 {
        self.quaternion_interval_us
    }

    /// Number of actuator control messages processed so far.
    pub fn actuator_message_count(&self) -> u32 {
        self.actuator_messages
    }

    pub fn set_environment_wind(&mut self, wind: Vector3<f64>) {
        self.wind = wind;
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics.snapshot()
    }

    pub(crate) fn statistics_engine(&self) -> Arc<StatisticsEngine> {
        Arc::clone(&self.statistics)
    }
}

impl SensorSource for Drone {
    fn state(&self) -> &StateVector {
        &self.state
    }

    fn derivative(&self) -> &StateDerivative {
        &self.derivative
    }

    fn sim_time_us(&self) -> u64 {
        self.clock.now_us()
    }

    fn environment_wind(&self) -> Vector3<f64> {
        self.wind
    }

    fn temperature(&self) -> f32 {
        standard_temperature(-self.state[2]) as f32
    }
}
