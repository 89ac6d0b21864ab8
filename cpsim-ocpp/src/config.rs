//! Configuration for the charge point simulator
//!
//! Groups connection settings, the identity reported at boot, loop timing
//! and the synthetic meter profile.

use std::path::PathBuf;
use std::time::Duration;

use crate::ocpp::{BootNotificationRequest, DEFAULT_REQUEST_TIMEOUT};

/// Complete simulator configuration
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    pub connection: ConnectionConfig,
    pub identity: ChargePointIdentity,
    pub timing: Timing,
    pub meter: MeterProfile,
}

/// Central system connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Central system WebSocket URL (without charge point ID)
    pub csms_url: String,

    /// Charge point ID (appended to URL)
    pub charge_point_id: String,

    /// Extra PEM root certificate to trust for `wss` URLs
    pub ca_cert: Option<PathBuf>,

    /// Request timeout
    pub request_timeout: Duration,
}

/// Static identity sent in BootNotification
#[derive(Debug, Clone)]
pub struct ChargePointIdentity {
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub meter_serial_number: Option<String>,
    pub meter_type: Option<String>,
}

/// Loop periods
#[derive(Debug, Clone)]
pub struct Timing {
    /// Poll period of the supervisory loop
    pub supervisor_tick: Duration,

    /// Period between metered samples
    pub meter_interval: Duration,
}

/// Synthetic readings reported by the meter
#[derive(Debug, Clone, PartialEq)]
pub struct MeterProfile {
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,

    /// Energy added to the register per sample
    pub energy_step_wh: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            csms_url: "ws://localhost:8180/steve/websocket/CentralSystemService".to_string(),
            charge_point_id: "cp_test".to_string(),
            ca_cert: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Default for ChargePointIdentity {
    fn default() -> Self {
        Self {
            vendor: "CHARGE_POINT_VENDOR".to_string(),
            model: "CHARGE_POINT_MODEL".to_string(),
            serial_number: Some("CP1234567890A01".to_string()),
            firmware_version: Some("1.2.3.4".to_string()),
            iccid: Some("255223422".to_string()),
            imsi: Some("342452322".to_string()),
            meter_serial_number: Some("4231435235".to_string()),
            meter_type: Some("AC".to_string()),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            supervisor_tick: Duration::from_secs(1),
            meter_interval: Duration::from_secs(60),
        }
    }
}

impl Default for MeterProfile {
    fn default() -> Self {
        Self {
            voltage_v: 234.1,
            current_a: 3.0,
            power_w: 10_000.0,
            energy_step_wh: 10,
        }
    }
}

impl ChargePointIdentity {
    /// BootNotification payload for this identity
    pub fn boot_request(&self) -> BootNotificationRequest {
        BootNotificationRequest {
            charge_point_vendor: self.vendor.clone(),
            charge_point_model: self.model.clone(),
            charge_point_serial_number: self.serial_number.clone(),
            firmware_version: self.firmware_version.clone(),
            iccid: self.iccid.clone(),
            imsi: self.imsi.clone(),
            meter_serial_number: self.meter_serial_number.clone(),
            meter_type: self.meter_type.clone(),
        }
    }
}

impl SimulatorConfig {
    /// Create config with basic parameters
    pub fn new(charge_point_id: impl Into<String>, csms_url: impl Into<String>) -> Self {
        Self {
            connection: ConnectionConfig {
                csms_url: csms_url.into(),
                charge_point_id: charge_point_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Charge point ID used in the URL and in log lines
    pub fn charge_point_id(&self) -> &str {
        &self.connection.charge_point_id
    }

    /// Set vendor info
    pub fn with_vendor(mut self, vendor: impl Into<String>, model: impl Into<String>) -> Self {
        self.identity.vendor = vendor.into();
        self.identity.model = model.into();
        self
    }

    /// Set serial number
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.identity.serial_number = Some(serial.into());
        self
    }

    /// Set firmware version
    pub fn with_firmware(mut self, version: impl Into<String>) -> Self {
        self.identity.firmware_version = Some(version.into());
        self
    }

    /// Trust an extra root certificate
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.connection.ca_cert = Some(path.into());
        self
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.connection.request_timeout = timeout;
        self
    }

    /// Set supervisory poll period
    pub fn with_supervisor_tick(mut self, tick: Duration) -> Self {
        self.timing.supervisor_tick = tick;
        self
    }

    /// Set metering period
    pub fn with_meter_interval(mut self, interval: Duration) -> Self {
        self.timing.meter_interval = interval;
        self
    }
}
