//! Dynamic state of the simulated vehicle.
//!
//! The flight model works on two fixed-size vectors of twelve components each. The
//! component order is part of the contract with the integrator and never changes.
//!
//! | index | [StateVector]                         | [StateDerivative]                     |
//! |-------|---------------------------------------|---------------------------------------|
//! | 0..3  | NED position of body origin (m)       | earth-frame linear velocity (m/s)     |
//! | 3..6  | body-frame linear velocity (m/s)      | body-frame linear acceleration (m/s²) |
//! | 6..9  | roll, pitch, yaw wrt earth (rad)      | Euler angle rates (rad/s)             |
//! | 9..12 | body-frame angular velocity (rad/s)   | body-frame angular acceleration       |

use nalgebra::{SVector, Vector3};

/// Number of components in the state and its derivative.
pub const STATE_LEN: usize = 12;

/// Start of the NED position block in [StateVector].
pub const POSITION: usize = 0;
/// Start of the body-frame velocity block in [StateVector].
pub const BODY_VELOCITY: usize = 3;
/// Start of the roll/pitch/yaw block in [StateVector].
pub const ATTITUDE: usize = 6;
/// Start of the body-frame angular velocity block in [StateVector].
pub const BODY_RATES: usize = 9;

/// Start of the earth-frame velocity block in [StateDerivative].
pub const EARTH_VELOCITY: usize = 0;
/// Start of the body-frame acceleration block in [StateDerivative].
pub const BODY_ACCELERATION: usize = 3;
/// Start of the Euler angle rate block in [StateDerivative].
pub const EULER_RATES: usize = 6;
/// Start of the body-frame angular acceleration block in [StateDerivative].
pub const ANGULAR_ACCELERATION: usize = 9;

/// Index of the yaw angle inside [StateVector].
pub const YAW: usize = ATTITUDE + 2;

/// Body forward velocity the state is seeded with at construction.
///
/// The aerodynamic terms of the flight model divide by airspeed, so an all-zero start
/// produces a degenerate first step. This is a numerical workaround, not physics.
pub const INITIAL_FORWARD_VELOCITY_SEED: f64 = 0.01;

/// The twelve-component dynamic state.
pub type StateVector = SVector<f64, STATE_LEN>;

/// Time derivative of [StateVector]. Same shape, different meaning per block.
pub type StateDerivative = SVector<f64, STATE_LEN>;

/// Returns the seeded initial state.
pub fn initial_state() -> StateVector {
    let mut state = StateVector::zeros();
    state[BODY_VELOCITY] = INITIAL_FORWARD_VELOCITY_SEED;
    state
}

/// Copies the three-component block starting at `start`.
pub fn block(vector: &SVector<f64, STATE_LEN>, start: usize) -> Vector3<f64> {
    vector.fixed_rows::<3>(start).into_owned()
}

/// Overwrites the three-component block starting at `start`.
pub fn set_block(vector: &mut SVector<f64, STATE_LEN>, start: usize, value: &Vector3<f64>) {
    vector.fixed_rows_mut::<3>(start).copy_from(value);
}

/// Zeroes the three-component block starting at `start`.
pub fn clear_block(vector: &mut SVector<f64, STATE_LEN>, start: usize) {
    vector.fixed_rows_mut::<3>(start).fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_zero_except_seed() {
        let state = initial_state();

        for (i, value) in state.iter().enumerate() {
            if i == BODY_VELOCITY {
                assert_eq!(*value, INITIAL_FORWARD_VELOCITY_SEED);
            } else {
                assert_eq!(*value, 0.0);
            }
        }
    }

    #[test]
    fn block_reads_three_components() {
        let state = StateVector::from_fn(|i, _| i as f64);

        assert_eq!(block(&state, ATTITUDE), Vector3::new(6.0, 7.0, 8.0));
        assert_eq!(block(&state, BODY_RATES), Vector3::new(9.0, 10.0, 11.0));
    }

    #[test]
    fn set_and_clear_block_touch_only_their_slice() {
        let mut state = StateVector::repeat(1.0);

        set_block(&mut state, BODY_VELOCITY, &Vector3::new(4.0, 5.0, 6.0));
        clear_block(&mut state, BODY_RATES);

        assert_eq!(state[2], 1.0);
        assert_eq!(block(&state, BODY_VELOCITY), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(block(&state, BODY_RATES), Vector3::zeros());
        assert_eq!(state[ATTITUDE], 1.0);
    }
}
