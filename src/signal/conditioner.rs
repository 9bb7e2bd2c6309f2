/// Converts a raw ADC code into millivolts at the electrode.
///
/// `raw_code` is trusted to lie in `[0, 2^bit_depth)`; the device never
/// produces anything else.
pub fn voltage(raw_code: u16, bit_depth: u32, vcc: f64, gain: f64) -> f64 {
    let full_scale = (1u32 << bit_depth) as f64;
    ((raw_code as f64 / full_scale) - 0.5) * vcc * 1000.0 / gain
}

/// Calibration constants of one sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditioner {
    pub bit_depth: u32,
    pub vcc: f64,
    pub gain: f64,
}

impl Conditioner {
    pub fn millivolts(&self, raw_code: u16) -> f64 {
        voltage(raw_code, self.bit_depth, self.vcc, self.gain)
    }

    /// The code that maps to 0 mV.
    pub fn mid_scale(&self) -> u16 {
        (1u32 << (self.bit_depth - 1)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_scale_is_zero_volts() {
        for &(bits, vcc, gain) in &[(10, 3.3, 1009.0), (12, 5.0, 1000.0), (8, 1.8, 41.0)] {
            let mid = 1u16 << (bits - 1);
            assert_eq!(voltage(mid, bits, vcc, gain), 0.0);
        }
    }

    #[test]
    fn zero_code_is_negative_half_range() {
        let v = voltage(0, 10, 3.3, 1009.0);
        let expected = -3.3 * 1000.0 / (2.0 * 1009.0);
        assert!((v - expected).abs() < 1e-12);
    }

    #[test]
    fn conditioner_matches_free_function() {
        let c = Conditioner { bit_depth: 10, vcc: 3.3, gain: 1009.0 };
        assert_eq!(c.mid_scale(), 512);
        assert_eq!(c.millivolts(700), voltage(700, 10, 3.3, 1009.0));
        assert!(c.millivolts(700) > 0.0);
    }
}
