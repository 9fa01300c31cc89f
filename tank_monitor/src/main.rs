//! Tank Level Monitor - Main Loop
//!
//! Polls an ultrasonic sensor mounted above a storage tank and:
//! 1. Converts the averaged distance into water level and volume
//! 2. Serves the latest reading on a small local HTTP API
//! 3. Pushes the reading to a remote collector every few minutes
//!
//! Off-device the sensor, ADC and radio are simulated (see `[simulation]`
//! in the config file); the HTTP server and collector client are real.
//!
//! Usage:
//!   cargo run --release                              # tank_monitor.toml, port from config
//!   cargo run --release -- --config site.toml --port 8080
//!
//! Environment:
//!   TANK_WIFI_PASSWORD - network password
//!   TANK_APP_SERVER    - collector base URL (overrides the config file)
//!   RUST_LOG           - log filter (default: tank_monitor=info)

use std::env;
use std::time::Duration;

use tank_monitor::config::{self, MonitorConfig};
use tank_monitor::daemon::{Hardware, Monitor};
use tank_monitor::endpoint;
use tank_monitor::hal::{HostLink, SystemClock};
use tank_monitor::reporter::HttpTransport;
use tank_monitor::sim::{FixedAdc, SimulatedTank};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tank_monitor=info")),
        )
        .init();

    println!("💧 Tank Level Monitor");
    println!("=====================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path = config::DEFAULT_CONFIG_PATH.to_string();
    let mut port_override: Option<u16> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
            }
            "--port" => {
                port_override = args.get(i + 1).and_then(|p| p.parse().ok());
                if port_override.is_none() {
                    eprintln!("Error: --port requires a port number");
                    std::process::exit(1);
                }
                i += 2;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--config PATH] [--port PORT]", args[0]);
                std::process::exit(1);
            }
        }
    }

    let mut config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("\n❌ Configuration error: {}\n", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = port_override {
        config.http.port = port;
    }

    let transport = match HttpTransport::new(Duration::from_millis(config.collector.timeout_ms)) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("\n❌ Failed to build HTTP client: {}\n", e);
            std::process::exit(1);
        }
    };

    let server = match endpoint::bind(config.http.port) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("\n❌ {}\n", e);
            std::process::exit(1);
        }
    };

    println!("📡 HTTP endpoint listening on http://0.0.0.0:{}", config.http.port);
    println!("   GET /         - Status page");
    println!("   GET /status   - Current reading (JSON)");
    if config.http.extended {
        println!("   GET /config   - Configuration echo");
    }
    println!("   GET /reading  - Take a reading now\n");

    let hardware = Hardware {
        sensor: SimulatedTank::from(&config.simulation),
        adc: FixedAdc(config.simulation.battery_raw),
        link: HostLink::new(&route_probe_target(&config), config.simulation.rssi_dbm),
        clock: SystemClock::new(),
    };

    let mut monitor = Monitor::new(config, hardware, transport);
    monitor.boot();

    println!("🔄 Monitoring... press Ctrl+C to stop\n");
    monitor.run(Some(&server));
}

/// host:port used to decide whether the host has a route to the collector.
fn route_probe_target(config: &MonitorConfig) -> String {
    reqwest::Url::parse(&config.collector.server_url)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            let port = url.port_or_known_default()?;
            Some(format!("{}:{}", host, port))
        })
        .unwrap_or_else(|| "8.8.8.8:80".to_string())
}
