/// Core loop of the tank monitor
///
/// The `Monitor` owns everything the device has: hardware, configuration,
/// the latest snapshot and the two interval timers. A single thread drives
/// it:
/// 1. Bring the network up (bounded retry) and take a first reading
/// 2. Each iteration, answer at most one pending HTTP request
/// 3. Take a reading when the sampling interval has elapsed
/// 4. Push to the collector when the reporting interval has elapsed
/// 5. Yield briefly

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use tracing::{info, warn};

use crate::battery::BatteryMonitor;
use crate::config::MonitorConfig;
use crate::endpoint::{self, StatusContext};
use crate::hal::{AnalogInput, Clock, NetworkLink, RangeSensor};
use crate::level::TankGeometry;
use crate::model::{MonitorError, TankSnapshot};
use crate::network::{self, RetryPolicy};
use crate::reporter::{Delivered, Reporter, ReporterStats, Transport};
use crate::sampler::Sampler;
use crate::state::StateStore;

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Fixed-interval trigger against a wrapping millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalTimer {
    interval_ms: u32,
    last_ms: u32,
}

impl IntervalTimer {
    pub fn new(interval_ms: u32, start_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: start_ms,
        }
    }

    /// Wrapping subtraction keeps this correct across the u32 rollover.
    pub fn is_due(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_ms) >= self.interval_ms
    }

    pub fn mark(&mut self, now_ms: u32) {
        self.last_ms = now_ms;
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

// ---------------------------------------------------------------------------
// Monitor State
// ---------------------------------------------------------------------------

/// The peripherals a monitor runs on.
pub struct Hardware<S, A, L, C> {
    pub sensor: S,
    pub adc: A,
    pub link: L,
    pub clock: C,
}

/// What one loop iteration did; mostly for tests and debug logs.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub served_request: bool,
    pub sampled: bool,
    pub reported: bool,
}

pub struct Monitor<S, A, L, C, T: Transport> {
    config: MonitorConfig,
    geometry: TankGeometry,
    sampler: Sampler,
    battery: Option<BatteryMonitor>,
    store: StateStore,
    reporter: Reporter<T>,
    sensor: S,
    adc: A,
    link: L,
    clock: C,
    sample_timer: IntervalTimer,
    report_timer: IntervalTimer,
    booted_at: DateTime<Utc>,
}

impl<S, A, L, C, T> Monitor<S, A, L, C, T>
where
    S: RangeSensor,
    A: AnalogInput,
    L: NetworkLink,
    C: Clock,
    T: Transport,
{
    pub fn new(config: MonitorConfig, hardware: Hardware<S, A, L, C>, transport: T) -> Self {
        let now = hardware.clock.now_ms();
        let reporter = Reporter::new(transport, &config.collector.url(), &config.device.id);
        let battery = config.battery.enabled.then(|| BatteryMonitor::from(&config.battery));

        Self {
            geometry: TankGeometry::from(&config.tank),
            sampler: Sampler::from(&config.sensor),
            battery,
            store: StateStore::new(),
            reporter,
            sensor: hardware.sensor,
            adc: hardware.adc,
            link: hardware.link,
            clock: hardware.clock,
            sample_timer: IntervalTimer::new(config.timing.reading_interval_ms, now),
            report_timer: IntervalTimer::new(config.timing.report_interval_ms, now),
            booted_at: Utc::now(),
            config,
        }
    }

    /// Connect, take the first reading and restart both timers.
    ///
    /// Failing to connect is not fatal: the monitor runs offline, serving
    /// the local API and skipping reports until the link comes up.
    pub fn boot(&mut self) {
        let policy = RetryPolicy::from(&self.config.network);
        if let Err(e) = network::connect_with_retry(&mut self.link, &mut self.clock, &policy, &self.config.network.ssid) {
            warn!("continuing without network: {}", e);
        }

        let _ = self.take_reading();

        let now = self.clock.now_ms();
        self.sample_timer.mark(now);
        self.report_timer.mark(now);
        info!(
            reading_interval_ms = self.sample_timer.interval_ms(),
            report_interval_ms = self.report_timer.interval_ms(),
            collector = self.reporter.url(),
            "tank monitor ready"
        );
    }

    /// Sample, convert and store. On failure the previous snapshot stays.
    pub fn take_reading(&mut self) -> Result<TankSnapshot, MonitorError> {
        let distance = match self.sampler.sample(&mut self.sensor, &mut self.clock) {
            Ok(distance) => distance,
            Err(e) => {
                warn!("sensor reading failed, keeping previous snapshot: {}", e);
                return Err(e);
            }
        };

        let battery = self.battery.as_ref().map(|b| b.read(&mut self.adc));
        let snapshot = self
            .geometry
            .snapshot(distance, battery, self.link.rssi(), self.clock.now_ms());
        self.store.update(snapshot);

        info!(
            distance_cm = snapshot.raw_distance_cm,
            water_level_cm = snapshot.water_level_cm,
            gallons = snapshot.volume_units,
            battery_v = ?snapshot.battery_voltage_volts,
            "sensor reading"
        );
        Ok(snapshot)
    }

    /// Push the current snapshot once.
    ///
    /// A down link gets one non-blocking re-association attempt first; if it
    /// is still down the report is skipped.
    pub fn report(&mut self) -> Result<Delivered, MonitorError> {
        if !self.link.is_connected() {
            self.link.begin();
            if self.link.is_connected() {
                info!(ssid = %self.config.network.ssid, "network link restored");
            }
        }

        let snapshot = self.store.read();
        self.reporter.report(&self.link, &snapshot, self.config.tank.capacity)
    }

    /// One pass of the main loop.
    pub fn tick(&mut self, server: Option<&tiny_http::Server>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let Some(server) = server {
            outcome.served_request = endpoint::serve_pending(server, self);
        }

        if self.sample_timer.is_due(self.clock.now_ms()) {
            // failures are logged inside
            let _ = self.take_reading();
            self.sample_timer.mark(self.clock.now_ms());
            outcome.sampled = true;
        }

        if self.report_timer.is_due(self.clock.now_ms()) {
            let _ = self.report();
            self.report_timer.mark(self.clock.now_ms());
            outcome.reported = true;
        }

        self.clock.delay_ms(self.config.timing.loop_yield_ms);
        outcome
    }

    /// Main loop (runs indefinitely)
    pub fn run(&mut self, server: Option<&tiny_http::Server>) -> ! {
        loop {
            self.tick(server);
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn reporter(&self) -> &Reporter<T> {
        &self.reporter
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

impl<S, A, L, C, T> StatusContext for Monitor<S, A, L, C, T>
where
    S: RangeSensor,
    A: AnalogInput,
    L: NetworkLink,
    C: Clock,
    T: Transport,
{
    fn snapshot(&self) -> TankSnapshot {
        self.store.read()
    }

    fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn rssi(&self) -> i32 {
        self.link.rssi()
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.link.local_ip()
    }

    fn booted_at(&self) -> DateTime<Utc> {
        self.booted_at
    }

    fn reporter_stats(&self) -> ReporterStats {
        self.reporter.stats()
    }

    fn take_reading(&mut self) -> Result<TankSnapshot, MonitorError> {
        Monitor::take_reading(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
