use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use nalgebra::Vector3;

use hil_bridge::encoder::fields::attitude_quaternion;
use hil_bridge::{
    ChannelTransport, Configuration, Drone, SensorEncoder, SensorSource, SimClock,
    StateDerivative, StateVector,
};

struct Snapshot {
    state: StateVector,
    derivative: StateDerivative,
}

impl SensorSource for Snapshot {
    fn state(&self) -> &StateVector {
        &self.state
    }

    fn derivative(&self) -> &StateDerivative {
        &self.derivative
    }

    fn sim_time_us(&self) -> u64 {
        12_345_678
    }

    fn environment_wind(&self) -> Vector3<f64> {
        Vector3::new(2.0, -1.0, 0.0)
    }

    fn temperature(&self) -> f32 {
        14.2
    }
}

fn cruising() -> Snapshot {
    let state = StateVector::from_column_slice(&[
        120.0, -40.0, -85.0, 18.0, 0.4, -0.2, 0.05, 0.08, 1.2, 0.01, -0.02, 0.1,
    ]);
    let derivative = StateDerivative::from_column_slice(&[
        17.5, 6.0, 0.3, 0.2, -0.1, -9.7, 0.01, -0.02, 0.1, 0.0, 0.0, 0.0,
    ]);
    Snapshot { state, derivative }
}

fn bench_attitude_quaternion(c: &mut Criterion) {
    let snapshot = cruising();
    c.bench_function("bench_attitude_quaternion", |b| {
        b.iter(|| black_box(attitude_quaternion(black_box(&snapshot.state))))
    });
}

fn bench_encode_sensor_messages(c: &mut Criterion) {
    let snapshot = cruising();
    let encoder = SensorEncoder::new(49.766809, -7.5571598);
    c.bench_function("bench_encode_sensor_messages", |b| {
        b.iter(|| {
            let gps = encoder.hil_gps(black_box(&snapshot));
            let sensor = encoder.hil_sensor(black_box(&snapshot));
            let quaternion = encoder.hil_state_quaternion(black_box(&snapshot));
            black_box((gps, sensor, quaternion))
        })
    });
}

fn bench_drone_tick(c: &mut Criterion) {
    let (transport, autopilot) = ChannelTransport::pair();
    let clock = Arc::new(SimClock::new());
    let config = Configuration {
        lockstep: false,
        warmup_threshold: u32::MAX,
        ..Configuration::default()
    };
    let Ok(mut drone) = Drone::new(config, Arc::clone(&clock), Box::new(transport)) else {
        panic!("default configuration is valid");
    };
    let dt = Duration::from_millis(4);

    c.bench_function("bench_drone_tick", |b| {
        b.iter(|| {
            clock.advance(dt);
            drone.tick(black_box(dt));
            black_box(autopilot.drain())
        })
    });
}

criterion_group!(
    benches,
    bench_attitude_quaternion,
    bench_encode_sensor_messages,
    bench_drone_tick
);
criterion_main!(benches);
