/// Monitor configuration loader - parses tank_monitor.toml
///
/// Keeps tank geometry, timing and collector settings out of the code so a
/// different tank or collector only needs a new file. Every value has a
/// default matching the field-deployed unit, so a partial file overrides
/// only what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::battery::BatteryMonitor;
use crate::level::TankGeometry;
use crate::network::RetryPolicy;
use crate::sampler::Sampler;

pub const DEFAULT_CONFIG_PATH: &str = "tank_monitor.toml";

/// Environment variable overriding `network.password`
pub const ENV_WIFI_PASSWORD: &str = "TANK_WIFI_PASSWORD";
/// Environment variable overriding `collector.server_url`
pub const ENV_APP_SERVER: &str = "TANK_APP_SERVER";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identifier sent with every report
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: "tank_monitor_01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ssid: String,
    /// Never echoed back by the HTTP service
    #[serde(skip_serializing)]
    pub password: String,
    /// 0 retries forever
    pub connect_max_attempts: u32,
    pub connect_retry_delay_ms: u32,
    pub connect_max_delay_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: "Ranch".to_string(),
            password: String::new(),
            connect_max_attempts: 20,
            connect_retry_delay_ms: 500,
            connect_max_delay_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub trigger_pin: u8,
    pub echo_pin: u8,
    /// Probes at or beyond this distance are discarded
    pub max_distance_cm: f32,
    pub probes_per_sample: usize,
    pub probe_settle_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_pin: 5,
            echo_pin: 18,
            max_distance_cm: 600.0,
            probes_per_sample: 5,
            probe_settle_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    pub height_cm: f32,
    /// Full-tank volume (gallons for the default 1550 gal tank)
    pub capacity: f32,
    /// Height of the transducer above the tank bottom
    pub sensor_height_cm: f32,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            height_cm: 183.0,
            capacity: 1550.0,
            sensor_height_cm: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub reading_interval_ms: u32,
    pub report_interval_ms: u32,
    /// Pause at the end of every loop iteration
    pub loop_yield_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reading_interval_ms: 30_000,
            report_interval_ms: 300_000,
            loop_yield_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub server_url: String,
    pub api_endpoint: String,
    pub timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://192.168.86.21:8090".to_string(),
            api_endpoint: "/tank-data".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl CollectorConfig {
    /// Full collector URL: base + endpoint path
    pub fn url(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), self.api_endpoint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub enabled: bool,
    pub pin: u8,
    pub divider_ratio: f32,
    pub reference_volts: f32,
    pub max_adc_value: u16,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pin: 36,
            divider_ratio: 4.2,
            reference_volts: 3.3,
            max_adc_value: 4095,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    /// Adds `device_id` to /status and serves /config
    pub extended: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            extended: true,
        }
    }
}

/// Stand-in hardware used when running on a workstation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub distance_cm: f32,
    /// Make every Nth probe return no echo (0 disables)
    pub drop_every: usize,
    pub battery_raw: u16,
    pub rssi_dbm: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            distance_cm: 108.5,
            drop_every: 7,
            battery_raw: 3_000,
            rssi_dbm: -61,
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub sensor: SensorConfig,
    pub tank: TankConfig,
    pub timing: TimingConfig,
    pub collector: CollectorConfig,
    pub battery: BatteryConfig,
    pub http: HttpConfig,
    pub simulation: SimulationConfig,
}

impl MonitorConfig {
    /// Parse a TOML document; missing sections and fields keep their defaults.
    pub fn from_toml_str(contents: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply secrets and deployment overrides from the environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(ENV_WIFI_PASSWORD) {
            self.network.password = password;
        }
        if let Some(server) = lookup(ENV_APP_SERVER) {
            self.collector.server_url = server;
        }
    }

    /// Reject settings that would break the conversion or scheduling math.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("tank.height_cm", self.tank.height_cm)?;
        positive("tank.capacity", self.tank.capacity)?;
        positive("tank.sensor_height_cm", self.tank.sensor_height_cm)?;
        positive("sensor.max_distance_cm", self.sensor.max_distance_cm)?;
        if self.sensor.probes_per_sample == 0 {
            return Err(ConfigError::Invalid("sensor.probes_per_sample must be at least 1".into()));
        }
        if self.timing.reading_interval_ms == 0 || self.timing.report_interval_ms == 0 {
            return Err(ConfigError::Invalid("timing intervals must be non-zero".into()));
        }
        if !self.collector.api_endpoint.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "collector.api_endpoint must start with '/': {}",
                self.collector.api_endpoint
            )));
        }
        if self.battery.enabled {
            positive("battery.divider_ratio", self.battery.divider_ratio)?;
            positive("battery.reference_volts", self.battery.reference_volts)?;
            if self.battery.max_adc_value == 0 {
                return Err(ConfigError::Invalid("battery.max_adc_value must be non-zero".into()));
            }
        }
        Ok(())
    }
}

/// NaN and infinity are valid TOML floats; neither is a usable measurement.
fn positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be a positive number, got {}", name, value)))
    }
}

/// Loads the monitor configuration from `path`, then applies environment
/// overrides (a `.env` file is honoured) and validates the result.
///
/// A missing file is not an error: the defaults describe the deployed unit.
pub fn load_config(path: &str) -> Result<MonitorConfig, ConfigError> {
    dotenv::dotenv().ok();

    let mut config = if Path::new(path).exists() {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        info!(path, "loaded configuration");
        MonitorConfig::from_toml_str(&contents, path)?
    } else {
        warn!(path, "configuration file not found, using built-in defaults");
        MonitorConfig::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Adapters into the domain types
// ---------------------------------------------------------------------------

impl From<&TankConfig> for TankGeometry {
    fn from(config: &TankConfig) -> Self {
        TankGeometry {
            sensor_height_cm: config.sensor_height_cm,
            tank_height_cm: config.height_cm,
            tank_capacity: config.capacity,
        }
    }
}

impl From<&SensorConfig> for Sampler {
    fn from(config: &SensorConfig) -> Self {
        Sampler {
            probes: config.probes_per_sample,
            settle_ms: config.probe_settle_ms,
            max_distance_cm: config.max_distance_cm,
        }
    }
}

impl From<&BatteryConfig> for BatteryMonitor {
    fn from(config: &BatteryConfig) -> Self {
        BatteryMonitor {
            divider_ratio: config.divider_ratio,
            reference_volts: config.reference_volts,
            max_adc_value: config.max_adc_value,
        }
    }
}

impl From<&NetworkConfig> for RetryPolicy {
    fn from(config: &NetworkConfig) -> Self {
        RetryPolicy {
            max_attempts: config.connect_max_attempts,
            initial_delay_ms: config.connect_retry_delay_ms,
            max_delay_ms: config.connect_max_delay_ms,
        }
    }
}
