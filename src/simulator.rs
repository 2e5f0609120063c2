//! Real-time pacing of the drone.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::HilError;
use crate::clock::SimClock;
use crate::config::SimulatorConfig;
use crate::drone::Drone;
use crate::statistics::{Statistics, StatisticsEngine};

/// Sleep while paused before checking the flags again.
const PAUSE_POLL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct RunFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

/// Steps a [Drone] at a fixed simulated rate.
///
/// With lockstep enabled the clock only moves forward once the drone has published
/// the previous instant; until then steps tick the drone with a zero time step so it
/// keeps draining its inbound queue.
pub struct Simulator {
    config: SimulatorConfig,
    lockstep: bool,
    clock: Arc<SimClock>,
    drone: Drone,
    flags: Arc<RunFlags>,
}

/// Controls a running [Simulator] from another thread.
#[derive(Clone)]
pub struct SimulatorHandle {
    flags: Arc<RunFlags>,
    statistics: Arc<StatisticsEngine>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig, drone: Drone) -> Result<Self, HilError> {
        config.validate()?;
        Ok(Simulator {
            clock: Arc::clone(drone.clock()),
            config,
            lockstep: drone.is_lockstep(),
            drone,
            flags: Arc::new(RunFlags {
                running: AtomicBool::new(true),
                paused: AtomicBool::new(false),
            }),
        })
    }

    pub fn handle(&self) -> SimulatorHandle {
        SimulatorHandle {
            flags: Arc::clone(&self.flags),
            statistics: self.drone.statistics_engine(),
        }
    }

    pub fn drone(&self) -> &Drone {
        &self.drone
    }

    pub fn drone_mut(&mut self) -> &mut Drone {
        &mut self.drone
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Runs one step. Returns whether simulated time advanced.
    pub fn step(&mut self) -> bool {
        let period = self.config.period();
        let advanced = if self.lockstep {
            self.clock.try_advance_locked(period)
        } else {
            self.clock.advance(period);
            true
        };

        self.drone
            .tick(if advanced { period } else { Duration::ZERO });
        advanced
    }

    /// Steps until [SimulatorHandle::stop] is called, sleeping between steps to hold the
    /// configured rate and speed factor.
    pub fn run(&mut self) {
        let wall_period = self.config.wall_period();
        info!(
            target: "hil_bridge::simulator",
            "running at {} Hz, speed x{}, lockstep {}",
            self.config.rate_hz, self.config.speed_factor, self.lockstep
        );

        let mut deadline = Instant::now();
        while self.flags.running.load(Ordering::Relaxed) {
            if self.flags.paused.load(Ordering::Relaxed) {
                thread::sleep(PAUSE_POLL);
                deadline = Instant::now();
                continue;
            }

            self.step();

            deadline += wall_period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else if now - deadline > wall_period * 10 {
                debug!(target: "hil_bridge::simulator", "falling behind by {:?}", now - deadline);
                deadline = now;
            }
        }

        info!(
            target: "hil_bridge::simulator",
            "stopped at {:.3} s simulated time",
            self.clock.now().as_secs_f64()
        );
    }

    pub fn pause(&self) {
        self.handle().pause();
    }

    pub fn resume(&self) {
        self.handle().resume();
    }

    pub fn stop(&self) {
        self.handle().stop();
    }
}

impl SimulatorHandle {
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.flags.running.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::Relaxed)
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::protocol::{
        ACTUATOR_CONTROL_CHANNELS, Endpoint, HilActuatorControls, InboundMessage,
    };
    use crate::transport::{AutopilotEndpoint, ChannelTransport};

    fn simulator(lockstep: bool, warmup_threshold: u32) -> (Simulator, AutopilotEndpoint) {
        let (transport, autopilot) = ChannelTransport::pair();
        let config = Configuration {
            warmup_threshold,
            lockstep,
            ..Configuration::default()
        };
        let drone = Drone::new(config, Arc::new(SimClock::new()), Box::new(transport)).unwrap();
        let sim_config = SimulatorConfig {
            rate_hz: 250.0,
            speed_factor: 1.0,
        };
        (Simulator::new(sim_config, drone).unwrap(), autopilot)
    }

    fn reply(autopilot: &AutopilotEndpoint) {
        autopilot
            .send(
                Endpoint::new(1, 1),
                InboundMessage::HilActuatorControls(HilActuatorControls {
                    time_usec: 0,
                    controls: [0.0; ACTUATOR_CONTROL_CHANNELS],
                    mode: 0,
                    flags: 0,
                }),
            )
            .unwrap();
    }

    #[test]
    fn warmup_steps_advance_every_time() {
        let (mut sim, _autopilot) = simulator(true, 300);

        for _ in 0..5 {
            assert!(sim.step());
        }

        assert_eq!(sim.drone().clock().now_us(), 20_000);
    }

    #[test]
    fn lockstep_waits_for_autopilot_reply() {
        let (mut sim, autopilot) = simulator(true, 0);

        assert!(sim.step());
        assert!(sim.drone().clock().is_locked());
        assert!(!sim.step());
        assert!(!sim.step());
        assert_eq!(sim.drone().clock().now_us(), 4_000);

        // the reply is drained on the next step, which publishes and unlocks
        reply(&autopilot);
        assert!(!sim.step());
        assert!(!sim.drone().clock().is_locked());
        assert!(sim.step());
        assert_eq!(sim.drone().clock().now_us(), 8_000);
    }

    #[test]
    fn free_running_ignores_lock() {
        let (mut sim, _autopilot) = simulator(false, 0);

        for _ in 0..3 {
            assert!(sim.step());
        }

        assert_eq!(sim.drone().clock().now_us(), 12_000);
        assert_eq!(sim.handle().statistics().tick_count, 3);
    }

    #[test]
    fn invalid_rate_is_rejected() {
        let (transport, _autopilot) = ChannelTransport::pair();
        let drone = Drone::new(
            Configuration::default(),
            Arc::new(SimClock::new()),
            Box::new(transport),
        )
        .unwrap();
        let config = SimulatorConfig {
            rate_hz: -1.0,
            speed_factor: 1.0,
        };

        assert!(Simulator::new(config, drone).is_err());
    }

    #[test]
    fn handle_controls_run_loop() {
        let (mut sim, _autopilot) = simulator(false, 300);
        let handle = sim.handle();

        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());

        let stopper = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                handle.stop();
            })
        };
        sim.run();
        stopper.join().unwrap();

        assert!(!handle.is_running());
        let ticks = handle.statistics().tick_count;
        assert!(ticks > 0, "no ticks ran");
        assert!(ticks < 250, "ran {} ticks in about 50 ms", ticks);
    }

    #[test]
    fn paused_simulator_does_not_tick() {
        let (mut sim, _autopilot) = simulator(false, 300);
        let handle = sim.handle();
        sim.pause();

        let stopper = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                handle.stop();
            })
        };
        sim.run();
        stopper.join().unwrap();

        assert_eq!(handle.statistics().tick_count, 0);
        assert_eq!(sim.drone().clock().now_us(), 0);
    }
}
