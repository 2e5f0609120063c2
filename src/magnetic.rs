//! Earth magnetic field lookup.

use nalgebra::Vector3;

/// Magnetic field by location.
///
/// Coordinates use the same fixed-point units as the GPS fields: degE7 for latitude
/// and longitude, millimetres for altitude. The field is returned in gauss, NED.
pub trait MagneticFieldModel: Send {
    fn field_at(&self, lat_e7: i32, lon_e7: i32, alt_mm: i32) -> Vector3<f64>;
}

/// A field that is the same everywhere.
///
/// Good enough for the few kilometres a simulated vehicle covers around its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformMagneticField {
    pub field: Vector3<f64>,
}

impl UniformMagneticField {
    pub fn new(north: f64, east: f64, down: f64) -> Self {
        UniformMagneticField {
            field: Vector3::new(north, east, down),
        }
    }
}

impl Default for UniformMagneticField {
    /// Field near 49.77 N, 7.56 W (WMM, 2020 epoch).
    fn default() -> Self {
        UniformMagneticField::new(0.1923, -0.0049, 0.4452)
    }
}

impl MagneticFieldModel for UniformMagneticField {
    fn field_at(&self, _lat_e7: i32, _lon_e7: i32, _alt_mm: i32) -> Vector3<f64> {
        self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_field_ignores_location() {
        let model = UniformMagneticField::new(0.2, 0.0, 0.4);

        assert_eq!(model.field_at(0, 0, 0), Vector3::new(0.2, 0.0, 0.4));
        assert_eq!(
            model.field_at(497_668_090, -75_571_598, 120_000),
            Vector3::new(0.2, 0.0, 0.4)
        );
    }

    #[test]
    fn default_field_points_down_and_north() {
        let field = UniformMagneticField::default().field;

        assert!(field.x > 0.0);
        assert!(field.z > field.x);
        assert!(field.norm() < 0.7);
    }
}
