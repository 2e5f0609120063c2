//! MAVLink v2 transport over TCP, UDP or serial, built on the `mavlink` crate.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, Ordering},
};
use std::thread;

use log::{debug, error, info, warn};
use mavlink::common::{
    COMMAND_ACK_DATA, HIL_GPS_DATA, HIL_SENSOR_DATA, HIL_STATE_QUATERNION_DATA,
    HilSensorUpdatedFlags, MavCmd, MavMessage, MavResult, SYSTEM_TIME_DATA,
};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader, MavlinkVersion, Message};
use num_traits::FromPrimitive;

use super::{InboundSender, MessageTransport};
use crate::HilError;
use crate::protocol::{
    CommandLong, Endpoint, HilActuatorControls, InboundEnvelope, InboundMessage, OutboundEnvelope,
    OutboundMessage,
};

type Connection = Box<dyn MavConnection<MavMessage> + Sync + Send>;

/// Talks MAVLink to an autopilot.
///
/// `address` uses the `mavlink` crate's connection strings, e.g. `tcpin:0.0.0.0:4560`
/// to wait for PX4's simulator link or `udpout:127.0.0.1:14560`. A background reader
/// thread decodes inbound traffic and queues it on the drone.
pub struct MavlinkTransport {
    address: String,
    connection: Arc<Connection>,
    sequence: AtomicU8,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    reader_thread: Option<thread::JoinHandle<()>>,
}

impl MavlinkTransport {
    /// Opens the connection. For listening addresses this blocks until the autopilot
    /// connects.
    pub fn connect(address: &str) -> Result<Self, HilError> {
        info!(target: "hil_bridge::transport", "opening MAVLink connection on {}", address);

        let mut connection = mavlink::connect::<MavMessage>(address)?;
        connection.set_protocol_version(MavlinkVersion::V2);

        Ok(MavlinkTransport {
            address: address.to_string(),
            connection: Arc::new(connection),
            sequence: AtomicU8::new(0),
            connected: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(true)),
            reader_thread: None,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn start_reader(&mut self, inbound: InboundSender) -> Result<(), HilError> {
        let connection = Arc::clone(&self.connection);
        let connected = Arc::clone(&self.connected);
        let running = Arc::clone(&self.running);

        let worker = thread::Builder::new().name("mavlink-reader".to_string());
        let handle = worker.spawn(move || {
            while running.load(Ordering::Relaxed) {
                match connection.recv() {
                    Ok((header, message)) => {
                        if !inbound.send(to_inbound(&header, message)) {
                            debug!(target: "hil_bridge::transport", "drone gone, stopping reader");
                            break;
                        }
                    }
                    Err(MessageReadError::Io(e)) => {
                        error!(target: "hil_bridge::transport", "MAVLink connection lost: {}", e);
                        connected.store(false, Ordering::Relaxed);
                        break;
                    }
                    Err(e) => {
                        warn!(target: "hil_bridge::transport", "dropping unreadable frame: {:?}", e);
                    }
                }
            }
        });

        self.reader_thread = Some(handle.map_err(|e| {
            HilError::Initialization(format!("Failed to spawn MAVLink reader thread: {}", e))
        })?);
        Ok(())
    }
}

impl MessageTransport for MavlinkTransport {
    fn attach(&mut self, inbound: InboundSender) -> Result<(), HilError> {
        if self.reader_thread.is_some() {
            return Err(HilError::Connection("transport is already attached".to_string()));
        }
        self.start_reader(inbound)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn send(&self, envelope: OutboundEnvelope) -> Result<(), HilError> {
        let header = MavHeader {
            system_id: envelope.source.system_id,
            component_id: envelope.source.component_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        let Some(message) = to_mavlink(envelope.message) else {
            return Ok(());
        };
        self.connection.send(&header, &message)?;
        Ok(())
    }
}

impl Drop for MavlinkTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);

        // the reader may be parked in a blocking read; only join a finished thread
        if let Some(handle) = self.reader_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

/// Converts a received MAVLink message into the drone's inbound form.
pub fn to_inbound(header: &MavHeader, message: MavMessage) -> InboundEnvelope {
    let sender = Endpoint::new(header.system_id, header.component_id);
    let message = match message {
        MavMessage::HEARTBEAT(_) => InboundMessage::Heartbeat,
        MavMessage::HIL_ACTUATOR_CONTROLS(data) => {
            InboundMessage::HilActuatorControls(HilActuatorControls {
                time_usec: data.time_usec,
                controls: data.controls,
                mode: data.mode.bits(),
                flags: data.flags.bits(),
            })
        }
        MavMessage::COMMAND_LONG(data) => InboundMessage::CommandLong(CommandLong {
            command: data.command as u16,
            target_system: data.target_system,
            target_component: data.target_component,
            confirmation: data.confirmation,
            params: [
                data.param1,
                data.param2,
                data.param3,
                data.param4,
                data.param5,
                data.param6,
                data.param7,
            ],
        }),
        other => InboundMessage::Unsupported(other.message_id()),
    };
    InboundEnvelope { sender, message }
}

/// Converts an outbound message into its MAVLink form.
///
/// Returns `None` for a command acknowledgement whose command id MAVLink does not
/// know; such a command could not have been received in the first place.
pub fn to_mavlink(message: OutboundMessage) -> Option<MavMessage> {
    let message = match message {
        OutboundMessage::SystemTime(m) => MavMessage::SYSTEM_TIME(SYSTEM_TIME_DATA {
            time_unix_usec: m.time_unix_usec,
            time_boot_ms: m.time_boot_ms,
        }),
        OutboundMessage::HilGps(m) => MavMessage::HIL_GPS(HIL_GPS_DATA {
            time_usec: m.time_usec,
            lat: m.lat,
            lon: m.lon,
            alt: m.alt,
            eph: m.eph,
            epv: m.epv,
            vel: m.vel,
            vn: m.vn,
            ve: m.ve,
            vd: m.vd,
            cog: m.cog,
            fix_type: m.fix_type,
            satellites_visible: m.satellites_visible,
            id: m.id,
            yaw: m.yaw,
        }),
        OutboundMessage::HilSensor(m) => MavMessage::HIL_SENSOR(HIL_SENSOR_DATA {
            time_usec: m.time_usec,
            xacc: m.xacc,
            yacc: m.yacc,
            zacc: m.zacc,
            xgyro: m.xgyro,
            ygyro: m.ygyro,
            zgyro: m.zgyro,
            xmag: m.xmag,
            ymag: m.ymag,
            zmag: m.zmag,
            abs_pressure: m.abs_pressure,
            diff_pressure: m.diff_pressure,
            pressure_alt: m.pressure_alt,
            temperature: m.temperature,
            fields_updated: HilSensorUpdatedFlags::from_bits_truncate(m.fields_updated),
            id: m.id,
        }),
        OutboundMessage::HilStateQuaternion(m) => {
            MavMessage::HIL_STATE_QUATERNION(HIL_STATE_QUATERNION_DATA {
                time_usec: m.time_usec,
                attitude_quaternion: m.attitude_quaternion,
                rollspeed: m.rollspeed,
                pitchspeed: m.pitchspeed,
                yawspeed: m.yawspeed,
                lat: m.lat,
                lon: m.lon,
                alt: m.alt,
                vx: m.vx,
                vy: m.vy,
                vz: m.vz,
                ind_airspeed: m.ind_airspeed,
                true_airspeed: m.true_airspeed,
                xacc: m.xacc,
                yacc: m.yacc,
                zacc: m.zacc,
            })
        }
        OutboundMessage::CommandAck(m) => {
            let Some(command) = MavCmd::from_u16(m.command) else {
                warn!(target: "hil_bridge::transport", "cannot encode ack for command {}", m.command);
                return None;
            };
            let result = MavResult::from_u8(m.result).unwrap_or(MavResult::MAV_RESULT_FAILED);
            MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                command,
                result,
                target_system: m.target_system,
                target_component: m.target_component,
                ..Default::default()
            })
        }
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use mavlink::common::{
        COMMAND_LONG_DATA, HIL_ACTUATOR_CONTROLS_DATA, HilActuatorControlsFlags, MavModeFlag,
    };

    use super::*;
    use crate::protocol::{CommandAck, HilGps, HilSensor, MAV_CMD_SET_MESSAGE_INTERVAL, SystemTime};

    fn header(system_id: u8, component_id: u8) -> MavHeader {
        MavHeader {
            system_id,
            component_id,
            sequence: 0,
        }
    }

    #[test]
    fn actuator_controls_keep_channels_and_armed_bit() {
        let mut controls = [0.0; 16];
        controls[8] = 0.75;
        let message = MavMessage::HIL_ACTUATOR_CONTROLS(HIL_ACTUATOR_CONTROLS_DATA {
            time_usec: 42,
            controls,
            mode: MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED,
            flags: HilActuatorControlsFlags::from_bits_truncate(1),
        });

        let envelope = to_inbound(&header(1, 1), message);

        let InboundMessage::HilActuatorControls(decoded) = envelope.message else {
            panic!("expected actuator controls");
        };
        assert_eq!(decoded.controls[8], 0.75);
        assert!(decoded.is_armed());
        assert_eq!(decoded.time_usec, 42);
        assert_eq!(decoded.flags, 1);
    }

    #[test]
    fn command_long_records_sender_and_params() {
        let message = MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: 115.0,
            param2: 4_000.0,
            command: MavCmd::MAV_CMD_SET_MESSAGE_INTERVAL,
            target_system: 1,
            target_component: 1,
            ..Default::default()
        });

        let envelope = to_inbound(&header(255, 190), message);

        assert_eq!(envelope.sender, Endpoint::new(255, 190));
        let InboundMessage::CommandLong(command) = envelope.message else {
            panic!("expected command long");
        };
        assert_eq!(command.command, MAV_CMD_SET_MESSAGE_INTERVAL);
        assert_eq!(command.param(2), 4_000.0);
    }

    #[test]
    fn other_messages_are_unsupported_by_id() {
        let message = MavMessage::SYSTEM_TIME(SYSTEM_TIME_DATA::default());
        let envelope = to_inbound(&header(1, 1), message);

        assert_eq!(envelope.message, InboundMessage::Unsupported(2));
    }

    #[test]
    fn ack_encodes_command_and_target() {
        let message = to_mavlink(OutboundMessage::CommandAck(CommandAck {
            command: MAV_CMD_SET_MESSAGE_INTERVAL,
            result: 0,
            target_system: 255,
            target_component: 190,
        }));

        let Some(MavMessage::COMMAND_ACK(data)) = message else {
            panic!("expected command ack");
        };
        assert_eq!(data.command, MavCmd::MAV_CMD_SET_MESSAGE_INTERVAL);
        assert_eq!(data.result, MavResult::MAV_RESULT_ACCEPTED);
        assert_eq!((data.target_system, data.target_component), (255, 190));
    }

    #[test]
    fn system_time_is_copied() {
        let message = to_mavlink(OutboundMessage::SystemTime(SystemTime {
            time_unix_usec: 7,
            time_boot_ms: 3,
        }));

        let Some(MavMessage::SYSTEM_TIME(data)) = message else {
            panic!("expected system time");
        };
        assert_eq!((data.time_unix_usec, data.time_boot_ms), (7, 3));
    }

    #[test]
    fn gps_keeps_yaw_and_receiver_id() {
        let message = to_mavlink(OutboundMessage::HilGps(HilGps {
            time_usec: 4_000,
            lat: 497_668_090,
            lon: -75_571_598,
            alt: 12_500,
            eph: 30,
            epv: 40,
            vel: 0,
            vn: 0,
            ve: 0,
            vd: 0,
            cog: 0,
            fix_type: 3,
            satellites_visible: 255,
            id: 0,
            yaw: 1,
        }));

        let Some(MavMessage::HIL_GPS(data)) = message else {
            panic!("expected hil gps");
        };
        assert_eq!(data.yaw, 1);
        assert_eq!(data.id, 0);
        assert_eq!((data.lat, data.lon, data.alt), (497_668_090, -75_571_598, 12_500));
    }

    #[test]
    fn sensor_keeps_update_flags() {
        let message = to_mavlink(OutboundMessage::HilSensor(HilSensor {
            time_usec: 4_000,
            xacc: 0.0,
            yacc: 0.0,
            zacc: -9.81,
            xgyro: 0.0,
            ygyro: 0.0,
            zgyro: 0.0,
            xmag: 0.2,
            ymag: 0.0,
            zmag: 0.4,
            abs_pressure: 1013.25,
            diff_pressure: 0.0,
            pressure_alt: 0.0,
            temperature: 15.0,
            fields_updated: 0x1FFF,
            id: 0,
        }));

        let Some(MavMessage::HIL_SENSOR(data)) = message else {
            panic!("expected hil sensor");
        };
        assert_eq!(data.fields_updated.bits(), 0x1FFF);
        assert_eq!(data.zacc, -9.81);
    }
}
