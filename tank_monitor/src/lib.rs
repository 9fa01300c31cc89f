/// tank_monitor: ultrasonic water tank level monitor.
///
/// # Module structure
///
/// ```text
/// tank_monitor
/// ├── model     — shared data types (TankSnapshot, MonitorError)
/// ├── config    — monitor configuration loader (tank_monitor.toml + env)
/// ├── hal       — hardware traits (RangeSensor, AnalogInput, NetworkLink, Clock)
/// ├── sim       — host stand-ins and scripted doubles for the hardware traits
/// ├── sampler   — probe bursts, validity filter, averaging
/// ├── level     — distance → clamped level → volume
/// ├── battery   — divider-scaled battery voltage
/// ├── state     — latest snapshot holder
/// ├── network   — link bring-up with bounded retry
/// ├── reporter  — JSON push to the remote collector
/// ├── endpoint  — local HTTP API (/, /status, /config, /reading)
/// └── daemon    — monitor context and the cooperative main loop
/// ```

/// Public modules
pub mod battery;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod hal;
pub mod level;
pub mod model;
pub mod network;
pub mod reporter;
pub mod sampler;
pub mod sim;
pub mod state;
