//! Statistics tracking for the simulation loop and the autopilot link.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Represents a snapshot of the counters of a running drone.
///
/// Returned by [`Drone::statistics`](crate::Drone::statistics) and
/// [`SimulatorHandle::statistics`](crate::SimulatorHandle::statistics). Counters wrap
/// around after `u32::MAX`.
///
/// # Fields
///
/// - `runtime`: Wall-clock time since the drone was created.
/// - `tick_count`: Simulation ticks executed, including ticks that did not advance time.
/// - `frequency`: Approximate tick rate, `tick_count / runtime`.
/// - `inbound_count`: Messages drained from the inbound queue.
/// - `unknown_count`: Inbound messages of a kind the drone does not handle.
/// - `actuator_count`: `HIL_ACTUATOR_CONTROLS` messages applied.
/// - `published_count`: Messages handed to the transport successfully.
/// - `error_count`: Transport sends that failed.
///
/// ```no_run
/// use std::sync::Arc;
/// use hil_bridge::{ChannelTransport, Configuration, Drone, HilError, SimClock};
///
/// fn main() -> Result<(), HilError> {
///     let (transport, _autopilot) = ChannelTransport::pair();
///     let mut drone = Drone::new(Configuration::default(), Arc::new(SimClock::new()), Box::new(transport))?;
///
///     drone.tick(std::time::Duration::from_millis(4));
///
///     let stats = drone.statistics();
///     println!("Runtime: {:?}", stats.runtime);
///     println!("Tick rate: {:.2} Hz", stats.frequency);
///     println!("Published: {}", stats.published_count);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Statistics {
    pub runtime: Duration,
    pub tick_count: u32,
    pub frequency: f32,
    pub inbound_count: u32,
    pub unknown_count: u32,
    pub actuator_count: u32,
    pub published_count: u32,
    pub error_count: u32,
}

/// Statistics engine for tracking drone operations.
#[derive(Debug)]
pub struct StatisticsEngine {
    start_time: Instant,
    tick_count: AtomicU32,
    inbound_count: AtomicU32,
    unknown_count: AtomicU32,
    actuator_count: AtomicU32,
    published_count: AtomicU32,
    error_count: AtomicU32,
}

impl StatisticsEngine {
    pub fn new() -> Self {
        StatisticsEngine {
            start_time: Instant::now(),
            tick_count: AtomicU32::new(0),
            inbound_count: AtomicU32::new(0),
            unknown_count: AtomicU32::new(0),
            actuator_count: AtomicU32::new(0),
            published_count: AtomicU32::new(0),
            error_count: AtomicU32::new(0),
        }
    }

    pub fn snapshot(&self) -> Statistics {
        Statistics {
            runtime: self.start_time.elapsed(),
            tick_count: load(&self.tick_count),
            frequency: self.tick_rate(),
            inbound_count: load(&self.inbound_count),
            unknown_count: load(&self.unknown_count),
            actuator_count: load(&self.actuator_count),
            published_count: load(&self.published_count),
            error_count: load(&self.error_count),
        }
    }

    pub(crate) fn increment_tick_count(&self) {
        self.tick_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_inbound_count(&self) {
        self.inbound_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_unknown_count(&self) {
        self.unknown_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_actuator_count(&self) {
        self.actuator_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_published_count(&self) {
        self.published_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_error_count(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    fn tick_rate(&self) -> f32 {
        load(&self.tick_count) as f32 / self.start_time.elapsed().as_secs_f32()
    }
}

fn load(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::Relaxed)
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn new_starts_with_zero_counts() {
        let engine = StatisticsEngine::new();
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.tick_count, 0);
        assert_eq!(snapshot.inbound_count, 0);
        assert_eq!(snapshot.unknown_count, 0);
        assert_eq!(snapshot.actuator_count, 0);
        assert_eq!(snapshot.published_count, 0);
        assert_eq!(snapshot.error_count, 0);
    }

    #[test]
    fn counters_are_independent() {
        let engine = StatisticsEngine::new();

        engine.increment_tick_count();
        engine.increment_tick_count();
        engine.increment_inbound_count();
        engine.increment_inbound_count();
        engine.increment_inbound_count();
        engine.increment_unknown_count();
        engine.increment_actuator_count();
        engine.increment_published_count();
        engine.increment_published_count();
        engine.increment_error_count();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.tick_count, 2);
        assert_eq!(snapshot.inbound_count, 3);
        assert_eq!(snapshot.unknown_count, 1);
        assert_eq!(snapshot.actuator_count, 1);
        assert_eq!(snapshot.published_count, 2);
        assert_eq!(snapshot.error_count, 1);
    }

    #[test]
    fn counters_are_shared_across_threads() {
        let engine = std::sync::Arc::new(StatisticsEngine::new());

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        engine.increment_inbound_count();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(engine.snapshot().inbound_count, 400);
    }

    #[test]
    fn runtime_increases_over_time() {
        let engine = StatisticsEngine::new();

        thread::sleep(Duration::from_millis(10));

        let snapshot = engine.snapshot();
        assert!(snapshot.runtime >= Duration::from_millis(10));
    }

    #[test]
    fn frequency_calculated_correctly() {
        let engine = StatisticsEngine::new();

        // Wait a bit then add ticks
        thread::sleep(Duration::from_millis(50));
        engine.increment_tick_count();
        engine.increment_tick_count();

        let snapshot = engine.snapshot();
        // Frequency should be roughly 2 / 0.05 = 40, but allow wide margin
        assert!(snapshot.frequency > 0.0);
        assert!(snapshot.frequency < 100.0);
    }

    #[test]
    fn default_creates_new_engine() {
        let engine = StatisticsEngine::default();
        assert_eq!(engine.snapshot().tick_count, 0);
    }
}
