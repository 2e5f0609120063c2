use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use hil_bridge::{
    Configuration, Drone, HilError, MavlinkTransport, MessageTransport, RecordingTransport,
    SimClock, Simulator, SimulatorConfig, TelemetryRecorder,
};

/// Runs a simulated VTOL against an autopilot over MAVLink HIL.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// MAVLink connection string
    #[arg(long, default_value = "tcpin:0.0.0.0:4560")]
    address: String,

    /// Simulation steps per simulated second
    #[arg(long, default_value_t = 100.0)]
    rate: f64,

    /// Simulated seconds per wall-clock second
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Origin latitude (degrees)
    #[arg(long, default_value_t = 49.766809, allow_negative_numbers = true)]
    lat: f64,

    /// Origin longitude (degrees)
    #[arg(long, default_value_t = -7.5571598, allow_negative_numbers = true)]
    lon: f64,

    /// Ground height above the origin (m)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    ground_height: f64,

    /// Let simulated time run without waiting for actuator replies
    #[arg(long)]
    no_lockstep: bool,

    /// Record outbound telemetry to this file
    #[arg(long)]
    record: Option<PathBuf>,
}

fn main() -> Result<(), HilError> {
    env_logger::init();

    let args = Args::parse();

    let config = Configuration {
        origin_latitude: args.lat,
        origin_longitude: args.lon,
        ground_height: args.ground_height,
        lockstep: !args.no_lockstep,
        ..Configuration::default()
    };
    let sim_config = SimulatorConfig {
        rate_hz: args.rate,
        speed_factor: args.speed,
    };

    let clock = Arc::new(SimClock::new());
    let mavlink = MavlinkTransport::connect(&args.address)?;
    info!("autopilot connected on {}", mavlink.address());

    let transport: Box<dyn MessageTransport> = match &args.record {
        Some(path) => Box::new(RecordingTransport::new(
            mavlink,
            TelemetryRecorder::create(path)?,
            Arc::clone(&clock),
        )),
        None => Box::new(mavlink),
    };

    let drone = Drone::new(config, clock, transport)?;
    let mut simulator = Simulator::new(sim_config, drone)?;
    simulator.run();

    Ok(())
}
