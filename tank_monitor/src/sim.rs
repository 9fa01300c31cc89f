/// Stand-in hardware for running off-device and for tests.
///
/// `SimulatedTank` and `FixedAdc` back the host binary. The scripted types
/// let tests dictate every probe, clock tick and link state.

use std::collections::VecDeque;
use std::net::IpAddr;

use crate::config::SimulationConfig;
use crate::hal::{AnalogInput, Clock, NetworkLink, RangeSensor};

// ---------------------------------------------------------------------------
// Host binary stand-ins
// ---------------------------------------------------------------------------

/// A tank whose surface sits at a fixed distance, with a small ripple on
/// each ping and an occasional lost echo.
pub struct SimulatedTank {
    distance_cm: f32,
    drop_every: usize,
    pings: usize,
}

impl SimulatedTank {
    pub fn new(distance_cm: f32, drop_every: usize) -> Self {
        Self {
            distance_cm,
            drop_every,
            pings: 0,
        }
    }
}

impl From<&SimulationConfig> for SimulatedTank {
    fn from(config: &SimulationConfig) -> Self {
        SimulatedTank::new(config.distance_cm, config.drop_every)
    }
}

impl RangeSensor for SimulatedTank {
    fn ping_cm(&mut self) -> f32 {
        self.pings += 1;
        if self.drop_every > 0 && self.pings % self.drop_every == 0 {
            return 0.0;
        }
        // ripple: -0.5, 0.0, +0.5 cm
        let ripple = ((self.pings % 3) as f32 - 1.0) * 0.5;
        (self.distance_cm + ripple).max(0.0)
    }
}

/// An ADC pinned to one value.
pub struct FixedAdc(pub u16);

impl AnalogInput for FixedAdc {
    fn read_raw(&mut self) -> u16 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Scripted doubles
// ---------------------------------------------------------------------------

/// Returns queued probe values in order, then repeats the last one.
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    queue: VecDeque<f32>,
    last: f32,
    pub pings: usize,
}

impl ScriptedSensor {
    pub fn new(probes: &[f32]) -> Self {
        let mut sensor = Self::default();
        sensor.push(probes);
        sensor
    }

    pub fn push(&mut self, probes: &[f32]) {
        self.queue.extend(probes.iter().copied());
    }
}

impl RangeSensor for ScriptedSensor {
    fn ping_cm(&mut self) -> f32 {
        self.pings += 1;
        if let Some(value) = self.queue.pop_front() {
            self.last = value;
        }
        self.last
    }
}

/// Clock that only moves when told to, or by the amount of each delay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: u32,
    /// Sum of all requested delays
    pub slept_ms: u64,
}

impl ManualClock {
    pub fn starting_at(now: u32) -> Self {
        Self { now, slept_ms: 0 }
    }

    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.slept_ms += ms as u64;
        self.advance(ms);
    }
}

/// Link that comes up after a set number of `begin` calls (never, if `None`).
#[derive(Debug)]
pub struct ScriptedLink {
    connect_after: Option<u32>,
    connected: bool,
    pub begin_calls: u32,
    pub rssi_dbm: i32,
    pub ip: Option<IpAddr>,
}

impl ScriptedLink {
    pub fn connected(rssi_dbm: i32) -> Self {
        Self::connecting_after(Some(1), rssi_dbm)
    }

    pub fn unreachable() -> Self {
        Self::connecting_after(None, 0)
    }

    pub fn connecting_after(attempts: Option<u32>, rssi_dbm: i32) -> Self {
        Self {
            connect_after: attempts,
            connected: false,
            begin_calls: 0,
            rssi_dbm,
            ip: Some(IpAddr::from([192, 168, 86, 40])),
        }
    }

    /// Drop or restore the link after boot.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl NetworkLink for ScriptedLink {
    fn begin(&mut self) {
        self.begin_calls += 1;
        if let Some(after) = self.connect_after {
            if self.begin_calls >= after {
                self.connected = true;
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn rssi(&self) -> i32 {
        if self.connected { self.rssi_dbm } else { 0 }
    }

    fn local_ip(&self) -> Option<IpAddr> {
        if self.connected { self.ip } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_tank_drops_echoes() {
        let mut tank = SimulatedTank::new(100.0, 3);
        let pings: Vec<f32> = (0..6).map(|_| tank.ping_cm()).collect();
        assert_eq!(pings[2], 0.0);
        assert_eq!(pings[5], 0.0);
        assert!(pings[0] > 99.0 && pings[0] < 101.0);
    }

    #[test]
    fn test_scripted_sensor_repeats_last_probe() {
        let mut sensor = ScriptedSensor::new(&[1.0, 2.0]);
        assert_eq!(sensor.ping_cm(), 1.0);
        assert_eq!(sensor.ping_cm(), 2.0);
        assert_eq!(sensor.ping_cm(), 2.0);
        assert_eq!(sensor.pings, 3);
    }

    #[test]
    fn test_manual_clock_wraps() {
        let mut clock = ManualClock::starting_at(u32::MAX - 10);
        clock.delay_ms(20);
        assert_eq!(clock.now_ms(), 9);
        assert_eq!(clock.slept_ms, 20);
    }

    #[test]
    fn test_scripted_link_connects_after_attempts() {
        let mut link = ScriptedLink::connecting_after(Some(3), -55);
        link.begin();
        link.begin();
        assert!(!link.is_connected());
        link.begin();
        assert!(link.is_connected());
        assert_eq!(link.rssi(), -55);
    }
}
