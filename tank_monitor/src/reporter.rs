/// Pushes the current snapshot to the remote collector.
///
/// One POST per reporting interval, no retry and no queue: a lost report is
/// superseded by the next one. Any HTTP status counts as delivered; only a
/// transport failure (no status at all) is a delivery failure.

use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::hal::NetworkLink;
use crate::model::{MonitorError, TankSnapshot};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// JSON body sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub device_id: String,
    pub distance_cm: f32,
    pub water_level_cm: f32,
    pub gallons: f32,
    pub fill_percentage: f32,
    pub timestamp: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f32>,
    pub wifi_rssi: i32,
    pub tank_capacity: f32,
}

impl ReportPayload {
    pub fn new(device_id: &str, snapshot: &TankSnapshot, tank_capacity: f32) -> Self {
        Self {
            device_id: device_id.to_string(),
            distance_cm: snapshot.raw_distance_cm,
            water_level_cm: snapshot.water_level_cm,
            gallons: snapshot.volume_units,
            fill_percentage: snapshot.fill_percentage(tank_capacity),
            timestamp: snapshot.timestamp_ms,
            battery_voltage: snapshot.battery_voltage_volts,
            wifi_rssi: snapshot.signal_strength,
            tank_capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A response from the collector, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub status: u16,
    pub body: String,
}

/// Why a POST produced no HTTP status.
///
/// Codes follow the numbering the device's HTTP client reports, so collector
/// logs from old and new firmware line up.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    ConnectionRefused,
    SendHeaderFailed,
    SendPayloadFailed,
    NotConnected,
    ConnectionLost,
    ReadTimeout,
    Other(String),
}

impl TransportFailure {
    pub fn code(&self) -> i32 {
        match self {
            TransportFailure::ConnectionRefused => -1,
            TransportFailure::SendHeaderFailed => -2,
            TransportFailure::SendPayloadFailed => -3,
            TransportFailure::NotConnected => -4,
            TransportFailure::ConnectionLost => -5,
            TransportFailure::ReadTimeout => -11,
            TransportFailure::Other(_) => -1,
        }
    }

    pub fn description(&self) -> String {
        match self {
            TransportFailure::ConnectionRefused => "connection refused".to_string(),
            TransportFailure::SendHeaderFailed => "send header failed".to_string(),
            TransportFailure::SendPayloadFailed => "send payload failed".to_string(),
            TransportFailure::NotConnected => "not connected".to_string(),
            TransportFailure::ConnectionLost => "connection lost".to_string(),
            TransportFailure::ReadTimeout => "read Timeout".to_string(),
            TransportFailure::Other(msg) => msg.clone(),
        }
    }
}

impl From<TransportFailure> for MonitorError {
    fn from(failure: TransportFailure) -> Self {
        MonitorError::ReportDeliveryFailed {
            code: failure.code(),
            description: failure.description(),
        }
    }
}

/// Sends one JSON document to a URL.
pub trait Transport {
    fn post_json(&mut self, url: &str, payload: &serde_json::Value) -> Result<Delivered, TransportFailure>;
}

/// Blocking `reqwest` transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&mut self, url: &str, payload: &serde_json::Value) -> Result<Delivered, TransportFailure> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(classify_error)?;
        Ok(Delivered { status, body })
    }
}

fn classify_error(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::ReadTimeout
    } else if e.is_connect() {
        TransportFailure::ConnectionRefused
    } else if e.is_body() {
        TransportFailure::SendPayloadFailed
    } else if e.is_request() {
        TransportFailure::SendHeaderFailed
    } else if e.is_decode() {
        TransportFailure::ConnectionLost
    } else {
        TransportFailure::Other(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Reporter
// ---------------------------------------------------------------------------

/// Outcome counters since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReporterStats {
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub skipped: u64,
}

pub struct Reporter<T: Transport> {
    transport: T,
    url: String,
    device_id: String,
    stats: ReporterStats,
}

impl<T: Transport> Reporter<T> {
    pub fn new(transport: T, url: &str, device_id: &str) -> Self {
        Self {
            transport,
            url: url.to_string(),
            device_id: device_id.to_string(),
            stats: ReporterStats::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> ReporterStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Push `snapshot` once. Skipped without any HTTP traffic when the link
    /// is down.
    pub fn report<L: NetworkLink>(
        &mut self,
        link: &L,
        snapshot: &TankSnapshot,
        tank_capacity: f32,
    ) -> Result<Delivered, MonitorError> {
        if !link.is_connected() {
            self.stats.skipped += 1;
            warn!(skipped = self.stats.skipped, "network not connected, cannot send to collector");
            return Err(MonitorError::NetworkUnavailable("link down at report time".to_string()));
        }

        let payload = ReportPayload::new(&self.device_id, snapshot, tank_capacity);
        let value = serde_json::to_value(&payload)
            .map_err(|e| TransportFailure::Other(format!("payload serialization failed: {}", e)))?;

        self.stats.attempts += 1;
        match self.transport.post_json(&self.url, &value) {
            Ok(delivered) => {
                self.stats.delivered += 1;
                info!(status = delivered.status, body = %delivered.body, "collector update sent");
                Ok(delivered)
            }
            Err(failure) => {
                self.stats.failed += 1;
                error!(code = failure.code(), error = %failure.description(), "error sending to collector");
                Err(failure.into())
            }
        }
    }
}
