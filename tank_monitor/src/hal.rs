/// Hardware seams: ranging sensor, ADC, network link and clock.
///
/// The monitor is generic over these traits so the same loop runs against
/// real peripherals, the host stand-ins in `sim`, or scripted test doubles.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::{Duration, Instant};

/// One ultrasonic ping.
pub trait RangeSensor {
    /// Distance to the nearest echo in centimetres; 0 when nothing echoed.
    fn ping_cm(&mut self) -> f32;
}

/// Raw analog input.
pub trait AnalogInput {
    fn read_raw(&mut self) -> u16;
}

/// The network interface the device reports through.
pub trait NetworkLink {
    /// Start (or restart) association; returns immediately.
    fn begin(&mut self);
    fn is_connected(&self) -> bool;
    /// Signal strength in dBm, 0 when unknown
    fn rssi(&self) -> i32;
    fn local_ip(&self) -> Option<IpAddr>;
}

/// Monotonic millisecond clock that wraps at `u32::MAX`, plus a blocking delay.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn delay_ms(&mut self, ms: u32);
}

// ---------------------------------------------------------------------------
// Host implementations
// ---------------------------------------------------------------------------

/// Wall-clock backed `Clock`; counts from construction.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // truncation is the wrap
        self.start.elapsed().as_millis() as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// `NetworkLink` for a workstation: connected when the OS has a route out.
///
/// No packets are sent; connecting a UDP socket only asks the kernel to pick
/// a source address.
pub struct HostLink {
    probe_target: String,
    rssi_dbm: i32,
    local_ip: Option<IpAddr>,
}

impl HostLink {
    pub fn new(probe_target: &str, rssi_dbm: i32) -> Self {
        Self {
            probe_target: probe_target.to_string(),
            rssi_dbm,
            local_ip: None,
        }
    }

    fn resolve_local_ip(target: &str) -> Option<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect(target).ok()?;
        socket.local_addr().ok().map(|addr| addr.ip())
    }
}

impl NetworkLink for HostLink {
    fn begin(&mut self) {
        self.local_ip = Self::resolve_local_ip(&self.probe_target);
    }

    fn is_connected(&self) -> bool {
        self.local_ip.is_some()
    }

    fn rssi(&self) -> i32 {
        if self.is_connected() { self.rssi_dbm } else { 0 }
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances_across_delay() {
        let mut clock = SystemClock::new();
        let before = clock.now_ms();
        clock.delay_ms(5);
        assert!(clock.now_ms().wrapping_sub(before) >= 5);
    }

    #[test]
    fn test_host_link_starts_disconnected() {
        let link = HostLink::new("127.0.0.1:9", -60);
        assert!(!link.is_connected());
        assert_eq!(link.rssi(), 0);
        assert!(link.local_ip().is_none());
    }

    #[test]
    fn test_host_link_loopback_route() {
        let mut link = HostLink::new("127.0.0.1:9", -60);
        link.begin();
        assert!(link.is_connected());
        assert_eq!(link.rssi(), -60);
        assert!(link.local_ip().unwrap().is_loopback());
    }
}
