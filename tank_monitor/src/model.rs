/// Shared data types for the tank monitor.
///
/// `TankSnapshot` is the single record every component agrees on: the
/// sampler produces it, the state store holds it, and the status endpoint
/// and remote reporter read it.

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Latest computed set of sensor-derived values.
///
/// Only ever built through `level::TankGeometry::snapshot`, so the volume is
/// always consistent with the clamped level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankSnapshot {
    /// Averaged distance from the transducer to the liquid surface
    pub raw_distance_cm: f32,
    /// Height of the liquid column, clamped to [0, tank_height_cm]
    pub water_level_cm: f32,
    /// Volume derived from the level (gallons for the default tank)
    pub volume_units: f32,
    /// Battery voltage, present only when battery monitoring is enabled
    pub battery_voltage_volts: Option<f32>,
    /// Link signal strength in dBm at the time of the sample
    pub signal_strength: i32,
    /// Device clock (milliseconds since boot, wrapping) at the time of the sample
    pub timestamp_ms: u32,
}

impl TankSnapshot {
    /// The all-zero snapshot served before the first successful sample.
    pub const fn empty() -> Self {
        Self {
            raw_distance_cm: 0.0,
            water_level_cm: 0.0,
            volume_units: 0.0,
            battery_voltage_volts: None,
            signal_strength: 0,
            timestamp_ms: 0,
        }
    }

    /// Volume as a percentage of the tank capacity.
    pub fn fill_percentage(&self, tank_capacity: f32) -> f32 {
        if tank_capacity <= 0.0 {
            return 0.0;
        }
        (self.volume_units / tank_capacity) * 100.0
    }
}

impl Default for TankSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Runtime failures of a sample or report cycle.
///
/// None of these is fatal: the scheduler logs them and carries on with the
/// last good snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// Every probe in the cycle was zero or beyond the sensing range
    #[error("no valid sensor readings ({probes} probes, all out of range)")]
    NoValidReading { probes: usize },

    /// The network link is down, so there is nothing to report through
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The POST never produced an HTTP status
    #[error("report delivery failed ({code}): {description}")]
    ReportDeliveryFailed { code: i32, description: String },
}
