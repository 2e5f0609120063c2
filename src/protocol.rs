//! Messages exchanged with the autopilot.
//!
//! These types carry the field semantics of the MAVLink HIL message set. Byte-level
//! packing is the job of a transport (see the `mavlink` feature); the core only builds
//! and consumes these values.

use serde::{Deserialize, Serialize};

/// `MAV_CMD_SET_MESSAGE_INTERVAL`.
pub const MAV_CMD_SET_MESSAGE_INTERVAL: u16 = 511;
/// `MAV_MODE_FLAG_SAFETY_ARMED` bit of the mode field.
pub const MAV_MODE_FLAG_SAFETY_ARMED: u8 = 0x80;
/// `MAV_RESULT_ACCEPTED`.
pub const MAV_RESULT_ACCEPTED: u8 = 0;
/// `GPS_FIX_TYPE_3D_FIX`.
pub const GPS_FIX_TYPE_3D: u8 = 3;
/// Number of channels in a HIL actuator controls message.
pub const ACTUATOR_CONTROL_CHANNELS: usize = 16;

/// Bitmask marking every HIL sensor field (accel, gyro, mag, pressures, altitude,
/// temperature) as updated.
pub const HIL_SENSOR_ALL_FIELDS: u32 = 0b111 | 0b111_000 | 0b111_000_000 | 0b1111_000_000_000;

/// Identity of a MAVLink system/component pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub system_id: u8,
    pub component_id: u8,
}

impl Endpoint {
    pub const fn new(system_id: u8, component_id: u8) -> Self {
        Endpoint {
            system_id,
            component_id,
        }
    }
}

/// A message received from the autopilot together with its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub sender: Endpoint,
    pub message: InboundMessage,
}

/// Messages the drone consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Heartbeat,
    HilActuatorControls(HilActuatorControls),
    CommandLong(CommandLong),
    /// Any message kind the drone has no handler for, by MAVLink message id.
    Unsupported(u32),
}

impl InboundMessage {
    pub fn name(&self) -> &'static str {
        match self {
            InboundMessage::Heartbeat => "HEARTBEAT",
            InboundMessage::HilActuatorControls(_) => "HIL_ACTUATOR_CONTROLS",
            InboundMessage::CommandLong(_) => "COMMAND_LONG",
            InboundMessage::Unsupported(_) => "UNSUPPORTED",
        }
    }
}

/// Normalized actuator outputs of the autopilot.
#[derive(Debug, Clone, PartialEq)]
pub struct HilActuatorControls {
    pub time_usec: u64,
    pub controls: [f32; ACTUATOR_CONTROL_CHANNELS],
    /// `MAV_MODE_FLAG` bits.
    pub mode: u8,
    pub flags: u64,
}

impl HilActuatorControls {
    pub fn is_armed(&self) -> bool {
        self.mode & MAV_MODE_FLAG_SAFETY_ARMED != 0
    }
}

/// A long-form command with seven float parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandLong {
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub confirmation: u8,
    pub params: [f32; 7],
}

impl CommandLong {
    /// One-based parameter access, matching the protocol's `param1`..`param7`.
    pub fn param(&self, index: usize) -> f32 {
        self.params.get(index.wrapping_sub(1)).copied().unwrap_or(0.0)
    }
}

/// A message the drone publishes, with the endpoint that sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub source: Endpoint,
    pub message: OutboundMessage,
}

/// Messages the drone publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutboundMessage {
    SystemTime(SystemTime),
    HilGps(HilGps),
    HilSensor(HilSensor),
    HilStateQuaternion(HilStateQuaternion),
    CommandAck(CommandAck),
}

impl OutboundMessage {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::SystemTime(_) => "SYSTEM_TIME",
            OutboundMessage::HilGps(_) => "HIL_GPS",
            OutboundMessage::HilSensor(_) => "HIL_SENSOR",
            OutboundMessage::HilStateQuaternion(_) => "HIL_STATE_QUATERNION",
            OutboundMessage::CommandAck(_) => "COMMAND_ACK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTime {
    /// Wall clock, microseconds since the Unix epoch.
    pub time_unix_usec: u64,
    /// Simulated time since boot, milliseconds.
    pub time_boot_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HilGps {
    pub time_usec: u64,
    pub fix_type: u8,
    /// Latitude, degE7.
    pub lat: i32,
    /// Longitude, degE7.
    pub lon: i32,
    /// Altitude, mm.
    pub alt: i32,
    /// Horizontal dilution, cm.
    pub eph: u16,
    /// Vertical dilution, cm.
    pub epv: u16,
    /// Horizontal ground speed, cm/s.
    pub vel: u16,
    pub vn: i16,
    pub ve: i16,
    pub vd: i16,
    /// Course over ground, cdeg.
    pub cog: u16,
    pub satellites_visible: u8,
    pub id: u8,
    /// Yaw relative to true north, cdeg. Zero means unavailable.
    pub yaw: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HilSensor {
    pub time_usec: u64,
    pub xacc: f32,
    pub yacc: f32,
    pub zacc: f32,
    pub xgyro: f32,
    pub ygyro: f32,
    pub zgyro: f32,
    /// Gauss.
    pub xmag: f32,
    pub ymag: f32,
    pub zmag: f32,
    /// hPa.
    pub abs_pressure: f32,
    pub diff_pressure: f32,
    /// Altitude from pressure, mm, as the GPS altitude.
    pub pressure_alt: f32,
    /// Degrees Celsius.
    pub temperature: f32,
    pub fields_updated: u32,
    pub id: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HilStateQuaternion {
    pub time_usec: u64,
    /// w, x, y, z.
    pub attitude_quaternion: [f32; 4],
    pub rollspeed: f32,
    pub pitchspeed: f32,
    pub yawspeed: f32,
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
    pub ind_airspeed: u16,
    pub true_airspeed: u16,
    /// mG.
    pub xacc: i16,
    pub yacc: i16,
    pub zacc: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: u16,
    pub result: u8,
    pub target_system: u8,
    pub target_component: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_bitmask_covers_thirteen_fields() {
        assert_eq!(HIL_SENSOR_ALL_FIELDS, 0x1FFF);
        assert_eq!(HIL_SENSOR_ALL_FIELDS.count_ones(), 13);
    }

    #[test]
    fn armed_bit_is_read_from_mode() {
        let mut controls = HilActuatorControls {
            time_usec: 0,
            controls: [0.0; ACTUATOR_CONTROL_CHANNELS],
            mode: 0x40,
            flags: 0,
        };
        assert!(!controls.is_armed());

        controls.mode |= MAV_MODE_FLAG_SAFETY_ARMED;
        assert!(controls.is_armed());
    }

    #[test]
    fn command_params_are_one_based() {
        let command = CommandLong {
            command: MAV_CMD_SET_MESSAGE_INTERVAL,
            target_system: 1,
            target_component: 1,
            confirmation: 0,
            params: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        };

        assert_eq!(command.param(1), 1.0);
        assert_eq!(command.param(2), 2.0);
        assert_eq!(command.param(7), 7.0);
        assert_eq!(command.param(0), 0.0);
        assert_eq!(command.param(8), 0.0);
    }
}
