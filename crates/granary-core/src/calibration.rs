//! ADC transfer and gas calibration curves
//!
//! Two conversion stages sit between a raw channel read and a physical
//! concentration: [`AdcTransfer`] maps ADC counts to volts, and
//! [`CalibrationCurve`] maps volts to parts-per-million through the
//! power-law model fitted to each sensor's datasheet curve.

/// Conversion from raw ADC counts to volts.
///
/// `volts = raw / max_counts * full_scale_volts`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdcTransfer {
    /// Highest count the converter can return.
    pub max_counts: u16,
    /// Input voltage that saturates the converter.
    pub full_scale_volts: f32,
}

impl AdcTransfer {
    /// 12-bit converter with 11 dB attenuation, full scale 3.3 V.
    pub const ESP32_12BIT: Self = Self {
        max_counts: 4095,
        full_scale_volts: 3.3,
    };

    pub const fn new(max_counts: u16, full_scale_volts: f32) -> Self {
        Self {
            max_counts,
            full_scale_volts,
        }
    }

    /// Convert a raw count to volts.
    #[inline]
    pub fn to_volts(&self, raw: u16) -> f32 {
        raw as f32 / self.max_counts as f32 * self.full_scale_volts
    }
}

impl Default for AdcTransfer {
    fn default() -> Self {
        Self::ESP32_12BIT
    }
}

/// Power-law voltage-to-ppm calibration, `ppm = a * v^b`.
///
/// The `(a, b)` coefficients are fixed per channel at configuration time;
/// the defaults below are the fitted constants for the station's MQ-series
/// sensors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationCurve {
    pub a: f32,
    pub b: f32,
}

impl CalibrationCurve {
    /// MQ-3 alcohol sensor.
    pub const MQ3_ALCOHOL: Self = Self { a: 21.0, b: 1.59 };

    /// MQ-4 methane sensor.
    pub const MQ4_METHANE: Self = Self { a: 35.89, b: 2.83 };

    /// MQ-135 air-quality sensor, used as an ammonia proxy.
    pub const MQ135_AMMONIA: Self = Self { a: 5.0, b: 2.5 };

    /// MQ-8 hydrogen sensor.
    pub const MQ8_HYDROGEN: Self = Self { a: 0.3, b: 2.25 };

    pub const fn new(a: f32, b: f32) -> Self {
        Self { a, b }
    }

    /// Convert a voltage to parts-per-million.
    ///
    /// Zero volts maps to zero ppm; the power law is undefined or negative
    /// there for some exponents. Callers keep the domain non-negative
    /// (channel reads are hardware-bounded to a positive range).
    #[inline]
    pub fn convert(&self, voltage: f32) -> f32 {
        if voltage == 0.0 {
            return 0.0;
        }
        self.a * libm::powf(voltage, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_voltage_is_zero_ppm() {
        // Holds for every coefficient pair, including negative exponents
        assert_eq!(CalibrationCurve::new(21.0, 1.59).convert(0.0), 0.0);
        assert_eq!(CalibrationCurve::new(110.47, -2.862).convert(0.0), 0.0);
        assert_eq!(CalibrationCurve::new(0.0, 0.0).convert(0.0), 0.0);
    }

    #[test]
    fn test_power_law_conversion() {
        let curve = CalibrationCurve::new(35.89, 2.83);
        let v = 1.7f32;
        let expected = 35.89 * libm::powf(v, 2.83);
        assert_eq!(curve.convert(v), expected);

        // b = 1 degenerates to a linear scale
        let linear = CalibrationCurve::new(4.0, 1.0);
        assert!((linear.convert(0.5) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_adc_transfer_to_volts() {
        let adc = AdcTransfer::ESP32_12BIT;
        assert_eq!(adc.to_volts(0), 0.0);
        assert!((adc.to_volts(4095) - 3.3).abs() < 1e-6);
        // Mid-scale is half the reference
        assert!((adc.to_volts(2048) - 1.6504).abs() < 1e-3);
    }
}
