/// Battery voltage through a resistor divider on an ADC pin.
///
/// There is no way to tell a disconnected divider from a flat battery: both
/// read near zero.

use crate::hal::AnalogInput;

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryMonitor {
    pub divider_ratio: f32,
    pub reference_volts: f32,
    pub max_adc_value: u16,
}

impl Default for BatteryMonitor {
    fn default() -> Self {
        Self {
            divider_ratio: 4.2,
            reference_volts: 3.3,
            max_adc_value: 4095,
        }
    }
}

impl BatteryMonitor {
    /// Voltage at the battery for a raw ADC count.
    pub fn scale(&self, raw: u16) -> f32 {
        let pin_volts = (raw as f32 / self.max_adc_value as f32) * self.reference_volts;
        pin_volts * self.divider_ratio
    }

    pub fn read<A: AnalogInput>(&self, adc: &mut A) -> f32 {
        self.scale(adc.read_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FixedAdc;

    #[test]
    fn test_full_scale() {
        let monitor = BatteryMonitor::default();
        assert!((monitor.scale(4095) - 13.86).abs() < 1e-3);
    }

    #[test]
    fn test_disconnected_reads_zero() {
        let monitor = BatteryMonitor::default();
        assert_eq!(monitor.read(&mut FixedAdc(0)), 0.0);
    }

    #[test]
    fn test_mid_scale() {
        let monitor = BatteryMonitor {
            divider_ratio: 2.0,
            reference_volts: 3.3,
            max_adc_value: 4095,
        };
        let volts = monitor.read(&mut FixedAdc(2048));
        assert!((volts - 3.3008).abs() < 1e-3);
    }
}
