//! International Standard Atmosphere pressure model.

/// Static pressure at sea level (Pa).
pub const SEA_LEVEL_PRESSURE: f64 = 101_325.0;
/// Standard temperature at sea level (K).
pub const SEA_LEVEL_TEMPERATURE: f64 = 288.15;
/// Temperature lapse rate in the troposphere (K/m).
pub const LAPSE_RATE: f64 = -0.0065;
/// Molar mass of Earth's air (kg/mol).
const MOLAR_MASS: f64 = 0.028_964_4;
/// Standard gravity (m/s²).
const STANDARD_GRAVITY: f64 = 9.806_65;
/// Universal gas constant (J/(mol·K)).
const GAS_CONSTANT: f64 = 8.314_32;

/// Top of the troposphere (m).
const TROPOPAUSE: f64 = 11_000.0;
/// Top of the isothermal layer the model covers (m).
const STRATOSPHERE_LIMIT: f64 = 20_000.0;

/// Converts an altitude in metres to barometric pressure in pascal.
///
/// Below 11 km the lapse-rate formula applies; between 11 and 20 km the pressure
/// decays exponentially at the tropopause temperature. Above 20 km it returns 0.
pub fn altitude_to_pressure(altitude: f64) -> f64 {
    if altitude <= TROPOPAUSE {
        let base = SEA_LEVEL_TEMPERATURE / (SEA_LEVEL_TEMPERATURE + LAPSE_RATE * altitude);
        let exponent = (STANDARD_GRAVITY * MOLAR_MASS) / (GAS_CONSTANT * LAPSE_RATE);
        SEA_LEVEL_PRESSURE * base.powf(exponent)
    } else if altitude <= STRATOSPHERE_LIMIT {
        let tropopause_pressure = altitude_to_pressure(TROPOPAUSE);
        let tropopause_temperature = SEA_LEVEL_TEMPERATURE + TROPOPAUSE * LAPSE_RATE;
        tropopause_pressure
            * ((-STANDARD_GRAVITY * MOLAR_MASS * (altitude - TROPOPAUSE))
                / (GAS_CONSTANT * tropopause_temperature))
                .exp()
    } else {
        0.0
    }
}

/// Standard atmosphere temperature at `altitude` metres, in degrees Celsius.
pub fn standard_temperature(altitude: f64) -> f64 {
    let clamped = altitude.min(TROPOPAUSE);
    SEA_LEVEL_TEMPERATURE + LAPSE_RATE * clamped - 273.15
}
