/// Probe averaging for the ultrasonic sensor.
///
/// A sample is a burst of probes with a settling delay after each. Probes
/// that saw no echo (0) or reached the sensing limit are discarded; the rest
/// are averaged.

use tracing::debug;

use crate::hal::{Clock, RangeSensor};
use crate::model::MonitorError;

#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub probes: usize,
    pub settle_ms: u32,
    pub max_distance_cm: f32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            probes: 5,
            settle_ms: 100,
            max_distance_cm: 600.0,
        }
    }
}

impl Sampler {
    /// A probe counts when `0 < distance < max_distance_cm`.
    pub fn is_valid(&self, distance_cm: f32) -> bool {
        distance_cm > 0.0 && distance_cm < self.max_distance_cm
    }

    /// Mean of the valid probes, or `NoValidReading` if there are none.
    pub fn average(&self, probes: &[f32]) -> Result<f32, MonitorError> {
        let (total, count) = probes
            .iter()
            .filter(|&&d| self.is_valid(d))
            .fold((0.0f32, 0usize), |(total, count), &d| (total + d, count + 1));

        if count == 0 {
            return Err(MonitorError::NoValidReading { probes: probes.len() });
        }
        Ok(total / count as f32)
    }

    /// Take one burst from the sensor and average it.
    pub fn sample<S, C>(&self, sensor: &mut S, clock: &mut C) -> Result<f32, MonitorError>
    where
        S: RangeSensor,
        C: Clock,
    {
        let mut probes = Vec::with_capacity(self.probes);
        for _ in 0..self.probes {
            probes.push(sensor.ping_cm());
            clock.delay_ms(self.settle_ms);
        }
        debug!(?probes, "probe burst");
        self.average(&probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, ScriptedSensor};

    #[test]
    fn test_out_of_range_probe_discarded() {
        let sampler = Sampler::default();
        let avg = sampler.average(&[50.0, 50.0, 50.0, 700.0, 50.0]).unwrap();
        assert_eq!(avg, 50.0);
    }

    #[test]
    fn test_zero_and_limit_are_invalid() {
        let sampler = Sampler::default();
        assert!(!sampler.is_valid(0.0));
        assert!(!sampler.is_valid(-3.0));
        assert!(!sampler.is_valid(600.0));
        assert!(sampler.is_valid(599.9));
        assert!(sampler.is_valid(0.1));
    }

    #[test]
    fn test_mean_of_valid_probes() {
        let sampler = Sampler::default();
        let avg = sampler.average(&[100.0, 0.0, 110.0, 120.0, 0.0]).unwrap();
        assert!((avg - 110.0).abs() < 1e-4);
    }

    #[test]
    fn test_all_invalid_is_no_valid_reading() {
        let sampler = Sampler::default();
        let result = sampler.average(&[600.0, 650.0, 0.0, 601.0, 900.0]);
        assert_eq!(result, Err(MonitorError::NoValidReading { probes: 5 }));
    }

    #[test]
    fn test_sample_pings_and_settles() {
        let sampler = Sampler::default();
        let mut sensor = ScriptedSensor::new(&[50.0, 50.0, 50.0, 700.0, 50.0]);
        let mut clock = ManualClock::default();

        let avg = sampler.sample(&mut sensor, &mut clock).unwrap();

        assert_eq!(avg, 50.0);
        assert_eq!(sensor.pings, 5);
        assert_eq!(clock.slept_ms, 500);
    }
}
