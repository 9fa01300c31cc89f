/// Local HTTP API for the tank monitor
///
/// Serves the latest snapshot to anything on the local network. Requests
/// are polled one at a time from the main loop; there is no server thread.
///
/// Endpoints:
/// - GET /         - Human-readable page with links
/// - GET /status   - Current snapshot as JSON
/// - GET /config   - Configuration and connectivity echo (extended API)
/// - GET /reading  - Take a reading now, then redirect to /status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::net::IpAddr;
use tiny_http::{Header, Method, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::model::{MonitorError, TankSnapshot};
use crate::reporter::ReporterStats;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// What the handlers need from the running monitor.
pub trait StatusContext {
    fn snapshot(&self) -> TankSnapshot;
    fn config(&self) -> &MonitorConfig;
    fn rssi(&self) -> i32;
    fn local_ip(&self) -> Option<IpAddr>;
    fn booted_at(&self) -> DateTime<Utc>;
    fn reporter_stats(&self) -> ReporterStats;
    /// Run a sample cycle immediately.
    fn take_reading(&mut self) -> Result<TankSnapshot, MonitorError>;
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Snapshot as served by /status
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub distance_cm: f32,
    pub water_level_cm: f32,
    pub gallons: f32,
    pub fill_percentage: f32,
    pub timestamp: u32,
    pub tank_capacity: f32,
    pub wifi_rssi: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f32>,
}

/// Configuration echo served by /config
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub device_id: String,
    pub tank_capacity_gallons: f32,
    pub tank_height_cm: f32,
    pub sensor_height_cm: f32,
    pub max_distance_cm: f32,
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub reading_interval_ms: u32,
    pub app_send_interval_ms: u32,
    pub app_server: String,
    pub api_endpoint: String,
    pub battery_monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_pin: Option<u8>,
    pub wifi_ssid: String,
    pub wifi_rssi: i32,
    pub ip_address: String,
    pub booted_at: DateTime<Utc>,
    pub reports: ReporterStats,
}

/// A routed reply, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub location: Option<String>,
}

impl Reply {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
            location: None,
        }
    }

    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html",
            body,
            location: None,
        }
    }

    fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            content_type: "text/plain",
            body: String::new(),
            location: Some(location.to_string()),
        }
    }

    /// Convert into a tiny_http response; every response allows any origin.
    pub fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body.into_bytes())
            .with_status_code(StatusCode::from(self.status));

        let mut headers = vec![
            header("Content-Type", self.content_type),
            header("Access-Control-Allow-Origin", "*"),
        ];
        if let Some(location) = &self.location {
            headers.push(header("Location", location));
        }
        for h in headers.into_iter().flatten() {
            response.add_header(h);
        }
        response
    }
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Dispatch one request to its handler.
pub fn route<C: StatusContext>(ctx: &mut C, method: &Method, url: &str) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    let extended = ctx.config().http.extended;

    let known = matches!(path, "/" | "/status" | "/reading") || (extended && path == "/config");
    if !known {
        return not_found(extended);
    }
    if *method != Method::Get {
        return Reply::json(
            405,
            serde_json::json!({ "error": "Method not allowed", "path": path }).to_string(),
        );
    }

    match path {
        "/" => handle_index(ctx),
        "/status" => handle_status(ctx),
        "/config" => handle_config(ctx),
        _ => handle_reading(ctx),
    }
}

/// Build the /status body from the snapshot and static config.
pub fn status_response(snapshot: &TankSnapshot, config: &MonitorConfig) -> StatusResponse {
    StatusResponse {
        device_id: config.http.extended.then(|| config.device.id.clone()),
        distance_cm: snapshot.raw_distance_cm,
        water_level_cm: snapshot.water_level_cm,
        gallons: snapshot.volume_units,
        fill_percentage: snapshot.fill_percentage(config.tank.capacity),
        timestamp: snapshot.timestamp_ms,
        tank_capacity: config.tank.capacity,
        wifi_rssi: snapshot.signal_strength,
        battery_voltage: snapshot.battery_voltage_volts,
    }
}

fn handle_status<C: StatusContext>(ctx: &C) -> Reply {
    let body = status_response(&ctx.snapshot(), ctx.config());
    to_json_reply(&body)
}

fn handle_config<C: StatusContext>(ctx: &C) -> Reply {
    let config = ctx.config();
    let body = ConfigResponse {
        device_id: config.device.id.clone(),
        tank_capacity_gallons: config.tank.capacity,
        tank_height_cm: config.tank.height_cm,
        sensor_height_cm: config.tank.sensor_height_cm,
        max_distance_cm: config.sensor.max_distance_cm,
        trigger_pin: config.sensor.trigger_pin,
        echo_pin: config.sensor.echo_pin,
        reading_interval_ms: config.timing.reading_interval_ms,
        app_send_interval_ms: config.timing.report_interval_ms,
        app_server: config.collector.server_url.clone(),
        api_endpoint: config.collector.api_endpoint.clone(),
        battery_monitoring: config.battery.enabled,
        battery_pin: config.battery.enabled.then_some(config.battery.pin),
        wifi_ssid: config.network.ssid.clone(),
        wifi_rssi: ctx.rssi(),
        ip_address: ctx
            .local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        booted_at: ctx.booted_at(),
        reports: ctx.reporter_stats(),
    };
    to_json_reply(&body)
}

fn handle_reading<C: StatusContext>(ctx: &mut C) -> Reply {
    // A failed reading keeps the old snapshot; /status still answers.
    if let Err(e) = ctx.take_reading() {
        warn!("on-demand reading failed: {}", e);
    }
    Reply::redirect("/status")
}

fn handle_index<C: StatusContext>(ctx: &C) -> Reply {
    let snapshot = ctx.snapshot();
    let config = ctx.config();

    let mut html = String::from("<html><body>");
    html.push_str("<h1>Tank Water Level Monitor</h1>");
    html.push_str(&format!("<p>Distance: {:.2} cm</p>", snapshot.raw_distance_cm));
    html.push_str(&format!("<p>Water Level: {:.2} cm</p>", snapshot.water_level_cm));
    html.push_str(&format!("<p>Gallons: {:.2}</p>", snapshot.volume_units));
    html.push_str(&format!("<p>Fill: {:.2}%</p>", snapshot.fill_percentage(config.tank.capacity)));
    if let Some(volts) = snapshot.battery_voltage_volts {
        html.push_str(&format!("<p>Battery: {:.2} V</p>", volts));
    }
    html.push_str(&format!("<p>WiFi Signal: {} dBm</p>", ctx.rssi()));
    html.push_str("<p><a href='/reading'>Take New Reading</a></p>");
    html.push_str("<p><a href='/status'>JSON Data</a></p>");
    if config.http.extended {
        html.push_str("<p><a href='/config'>Configuration</a></p>");
    }
    html.push_str("</body></html>");

    Reply::html(html)
}

fn not_found(extended: bool) -> Reply {
    let mut endpoints = vec!["/", "/status", "/reading"];
    if extended {
        endpoints.push("/config");
    }
    Reply::json(
        404,
        serde_json::json!({
            "error": "Not found",
            "available_endpoints": endpoints
        })
        .to_string(),
    )
}

fn to_json_reply<T: Serialize>(body: &T) -> Reply {
    match serde_json::to_string(body) {
        Ok(json) => Reply::json(200, json),
        Err(e) => Reply::json(
            500,
            serde_json::json!({ "error": format!("serialization failed: {}", e) }).to_string(),
        ),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start listening without blocking the caller.
pub fn bind(port: u16) -> Result<tiny_http::Server, String> {
    tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server on port {}: {}", port, e))
}

/// Answer at most one pending request. Returns whether one was handled.
pub fn serve_pending<C: StatusContext>(server: &tiny_http::Server, ctx: &mut C) -> bool {
    let request = match server.try_recv() {
        Ok(Some(request)) => request,
        Ok(None) => return false,
        Err(e) => {
            warn!("HTTP receive error: {}", e);
            return false;
        }
    };

    let reply = route(ctx, request.method(), request.url());
    debug!(method = %request.method(), url = request.url(), status = reply.status, "request served");

    if let Err(e) = request.respond(reply.into_response()) {
        warn!("Failed to send response: {}", e);
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedContext {
        snapshot: TankSnapshot,
        config: MonitorConfig,
        readings_taken: usize,
        next_reading: Result<TankSnapshot, MonitorError>,
    }

    impl FixedContext {
        fn new() -> Self {
            Self {
                snapshot: TankSnapshot {
                    raw_distance_cm: 108.5,
                    water_level_cm: 91.5,
                    volume_units: 775.0,
                    battery_voltage_volts: Some(12.25),
                    signal_strength: -61,
                    timestamp_ms: 30_100,
                },
                config: MonitorConfig::default(),
                readings_taken: 0,
                next_reading: Err(MonitorError::NoValidReading { probes: 5 }),
            }
        }
    }

    impl StatusContext for FixedContext {
        fn snapshot(&self) -> TankSnapshot {
            self.snapshot
        }
        fn config(&self) -> &MonitorConfig {
            &self.config
        }
        fn rssi(&self) -> i32 {
            -64
        }
        fn local_ip(&self) -> Option<IpAddr> {
            Some(IpAddr::from([192, 168, 86, 40]))
        }
        fn booted_at(&self) -> DateTime<Utc> {
            DateTime::parse_from_rfc3339("2026-10-18T06:00:00Z").unwrap().with_timezone(&Utc)
        }
        fn reporter_stats(&self) -> ReporterStats {
            ReporterStats { attempts: 2, delivered: 1, failed: 1, skipped: 0 }
        }
        fn take_reading(&mut self) -> Result<TankSnapshot, MonitorError> {
            self.readings_taken += 1;
            let result = self.next_reading.clone();
            if let Ok(snapshot) = &result {
                self.snapshot = *snapshot;
            }
            result
        }
    }

    #[test]
    fn test_status_fields() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/status");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "application/json");

        let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(json["device_id"], "tank_monitor_01");
        assert_eq!(json["distance_cm"], 108.5);
        assert_eq!(json["water_level_cm"], 91.5);
        assert_eq!(json["gallons"], 775.0);
        assert_eq!(json["fill_percentage"], 50.0);
        assert_eq!(json["timestamp"], 30_100);
        assert_eq!(json["tank_capacity"], 1550.0);
        assert_eq!(json["wifi_rssi"], -61);
        assert_eq!(json["battery_voltage"], 12.25);
    }

    #[test]
    fn test_status_is_idempotent() {
        let mut ctx = FixedContext::new();
        let first = route(&mut ctx, &Method::Get, "/status");
        let second = route(&mut ctx, &Method::Get, "/status");
        assert_eq!(first.body, second.body);
    }

    #[test]
    fn test_basic_api_hides_identity_and_config() {
        let mut ctx = FixedContext::new();
        ctx.config.http.extended = false;
        ctx.snapshot.battery_voltage_volts = None;

        let status = route(&mut ctx, &Method::Get, "/status");
        let json: serde_json::Value = serde_json::from_str(&status.body).unwrap();
        assert!(json.get("device_id").is_none());
        assert!(json.get("battery_voltage").is_none());

        let config = route(&mut ctx, &Method::Get, "/config");
        assert_eq!(config.status, 404);
    }

    #[test]
    fn test_config_echo() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/config");
        assert_eq!(reply.status, 200);

        let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(json["device_id"], "tank_monitor_01");
        assert_eq!(json["tank_capacity_gallons"], 1550.0);
        assert_eq!(json["reading_interval_ms"], 30_000);
        assert_eq!(json["app_send_interval_ms"], 300_000);
        assert_eq!(json["api_endpoint"], "/tank-data");
        assert_eq!(json["wifi_ssid"], "Ranch");
        assert_eq!(json["wifi_rssi"], -64);
        assert_eq!(json["ip_address"], "192.168.86.40");
        assert_eq!(json["reports"]["failed"], 1);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_config_echo_reports_pins() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/config");
        let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(json["trigger_pin"], 5);
        assert_eq!(json["echo_pin"], 18);
        assert_eq!(json["battery_pin"], 36);

        ctx.config.battery.enabled = false;
        let reply = route(&mut ctx, &Method::Get, "/config");
        let json: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(json["battery_monitoring"], false);
        assert!(json.get("battery_pin").is_none());
    }

    #[test]
    fn test_reading_redirects_even_on_failure() {
        let mut ctx = FixedContext::new();
        let before = ctx.snapshot;

        let reply = route(&mut ctx, &Method::Get, "/reading");

        assert_eq!(reply.status, 302);
        assert_eq!(reply.location.as_deref(), Some("/status"));
        assert_eq!(ctx.readings_taken, 1);
        assert_eq!(ctx.snapshot, before);
    }

    #[test]
    fn test_index_page() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/");
        assert_eq!(reply.content_type, "text/html");
        assert!(reply.body.contains("Water Level: 91.50 cm"));
        assert!(reply.body.contains("Fill: 50.00%"));
        assert!(reply.body.contains("Battery: 12.25 V"));
        assert!(reply.body.contains("href='/config'"));
    }

    #[test]
    fn test_query_string_ignored() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/status?cache=0");
        assert_eq!(reply.status, 200);
    }

    #[test]
    fn test_unknown_path_and_method() {
        let mut ctx = FixedContext::new();
        let reply = route(&mut ctx, &Method::Get, "/history");
        assert_eq!(reply.status, 404);
        assert!(reply.body.contains("available_endpoints"));

        let reply = route(&mut ctx, &Method::Post, "/status");
        assert_eq!(reply.status, 405);
    }

    #[test]
    fn test_responses_allow_any_origin() {
        let reply = Reply::redirect("/status");
        let response = reply.into_response();
        let headers = response.headers();
        assert!(headers.iter().any(|h| h.field.equiv("Access-Control-Allow-Origin")
            && h.value.as_str() == "*"));
        assert!(headers.iter().any(|h| h.field.equiv("Location") && h.value.as_str() == "/status"));
    }
}
