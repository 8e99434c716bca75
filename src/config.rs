//! Device and tool configuration
//!
//! Plain serde structures, typically loaded from a TOML file:
//!
//! ```toml
//! name = "aurora"
//! vendor = "aurora"
//! frequency_hz = 20.0
//!
//! [communication]
//! type = "serial"
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [[tools]]
//! id = "Needle"
//! binding = { port = 1 }
//! ```
//!
//! Parser errors never leave this module as anything other than
//! [`DeviceError::InvalidConfig`].

use crate::error::{DeviceError, Result};
use crate::frame::FrameGeometry;
use crate::transform::{Quaternion, Transform};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial baud rates accepted by the supported trackers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BaudRate {
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
}

impl BaudRate {
    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, String> {
        match value {
            9600 => Ok(BaudRate::B9600),
            19200 => Ok(BaudRate::B19200),
            38400 => Ok(BaudRate::B38400),
            57600 => Ok(BaudRate::B57600),
            115200 => Ok(BaudRate::B115200),
            other => Err(format!("unsupported baud rate {}", other)),
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate.as_u32()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("unsupported data bits {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, String> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(format!("unsupported stop bits {}", other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> u8 {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Hardware handshake (RTS/CTS)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handshake {
    On,
    Off,
}

/// Serial line parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: BaudRate,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub handshake: Handshake,
    /// Per-read timeout; bounds every vendor call on the polling thread
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: String::new(),
            baud_rate: BaudRate::B9600,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            handshake: Handshake::Off,
            timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        SerialConfig {
            port: port.into(),
            ..SerialConfig::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: BaudRate) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// TCP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_socket_timeout")]
    pub timeout_ms: u64,
}

fn default_socket_timeout() -> u64 {
    1000
}

impl SocketConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SocketConfig {
            host: host.into(),
            port,
            timeout_ms: default_socket_timeout(),
        }
    }
}

/// Communication object of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommunicationConfig {
    Serial(SerialConfig),
    Socket(SocketConfig),
}

/// How a tool is identified in vendor data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolBinding {
    /// Physical port or channel, counted from 0
    Port(u32),
    /// Marker, tool or stream name reported by the device
    Marker(String),
}

impl fmt::Display for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolBinding::Port(port) => write!(f, "port {}", port),
            ToolBinding::Marker(name) => write!(f, "marker '{}'", name),
        }
    }
}

/// Fixed tool-tip calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub translation: [f64; 3],
    /// Rotation as `[x, y, z, w]`
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl CalibrationConfig {
    pub fn from_translation(translation: [f64; 3]) -> Self {
        CalibrationConfig {
            translation,
            rotation: identity_rotation(),
        }
    }

    pub fn to_transform(&self, validity: Duration) -> Transform {
        let [x, y, z, w] = self.rotation;
        Transform::new(Quaternion::new(x, y, z, w), self.translation, 0.0, validity)
    }
}

/// One tool record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub id: String,
    pub binding: ToolBinding,
    #[serde(default)]
    pub calibration: Option<CalibrationConfig>,
    /// NDI tool definition file for passive or wireless tools
    #[serde(default)]
    pub srom_file: Option<PathBuf>,
    #[serde(default)]
    pub is_reference: bool,
    /// Expected geometry for imager tools
    #[serde(default)]
    pub frame: Option<FrameGeometry>,
}

impl ToolConfig {
    pub fn new(id: impl Into<String>, binding: ToolBinding) -> Self {
        ToolConfig {
            id: id.into(),
            binding,
            calibration: None,
            srom_file: None,
            is_reference: false,
            frame: None,
        }
    }

    pub fn port(id: impl Into<String>, port: u32) -> Self {
        Self::new(id, ToolBinding::Port(port))
    }

    pub fn marker(id: impl Into<String>, marker: impl Into<String>) -> Self {
        Self::new(id, ToolBinding::Marker(marker.into()))
    }

    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_srom(mut self, path: impl Into<PathBuf>) -> Self {
        self.srom_file = Some(path.into());
        self
    }

    pub fn with_frame(mut self, geometry: FrameGeometry) -> Self {
        self.frame = Some(geometry);
        self
    }

    pub fn as_reference(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn port_number(&self) -> Option<u32> {
        match self.binding {
            ToolBinding::Port(port) => Some(port),
            ToolBinding::Marker(_) => None,
        }
    }

    pub fn marker_name(&self) -> Option<&str> {
        match &self.binding {
            ToolBinding::Marker(name) => Some(name),
            ToolBinding::Port(_) => None,
        }
    }
}

/// What a tool absent from a poll, or an expired sample, turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StalePolicy {
    #[default]
    MarkUnavailable,
    ReuseStale,
}

/// Reaction of the status reporter once communication is declared lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnLost {
    #[default]
    ForceClose,
    ReportOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// Consecutive failed polling cycles before communication is lost
    pub max_consecutive_failures: u32,
    pub on_lost: OnLost,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy {
            max_consecutive_failures: 5,
            on_lost: OnLost::ForceClose,
        }
    }
}

/// Device family selected by the `igt-track` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VendorKind {
    #[default]
    Simulated,
    Aurora,
    Polaris,
    Openigtlink,
    OpenigtlinkImager,
}

/// Complete description of one tracker or imager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub vendor: VendorKind,
    pub frequency_hz: f64,
    /// Sample validity; two polling periods when unset
    #[serde(default)]
    pub validity_ms: Option<u64>,
    #[serde(default)]
    pub communication: Option<CommunicationConfig>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub stale_policy: StalePolicy,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, frequency_hz: f64) -> Self {
        DeviceConfig {
            name: name.into(),
            vendor: VendorKind::default(),
            frequency_hz,
            validity_ms: None,
            communication: None,
            tools: Vec::new(),
            stale_policy: StalePolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_tool(mut self, tool: ToolConfig) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_communication(mut self, communication: CommunicationConfig) -> Self {
        self.communication = Some(communication);
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity_ms = Some(validity.as_millis() as u64);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DeviceError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeviceError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Polling period derived from the frequency
    pub fn period(&self) -> Duration {
        if self.frequency_hz > 0.0 && self.frequency_hz.is_finite() {
            Duration::from_secs_f64(1.0 / self.frequency_hz)
        } else {
            Duration::ZERO
        }
    }

    pub fn validity(&self) -> Duration {
        match self.validity_ms {
            Some(ms) => Duration::from_millis(ms),
            None => self.period() * 2,
        }
    }

    /// Check frequency against the device maximum and the tool list for
    /// duplicate identifiers and more than one reference tool.
    pub fn validate(&self, max_frequency: f64) -> Result<()> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(DeviceError::InvalidConfig(format!(
                "frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        if self.frequency_hz > max_frequency {
            return Err(DeviceError::InvalidConfig(format!(
                "frequency {} Hz exceeds device maximum {} Hz",
                self.frequency_hz, max_frequency
            )));
        }
        if self.failure_policy.max_consecutive_failures == 0 {
            return Err(DeviceError::InvalidConfig(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut reference: Option<&str> = None;
        for tool in &self.tools {
            if tool.id.is_empty() {
                return Err(DeviceError::InvalidConfig("tool id is empty".to_string()));
            }
            if !ids.insert(tool.id.as_str()) {
                return Err(DeviceError::DuplicateTool(tool.id.clone()));
            }
            if tool.is_reference {
                if let Some(existing) = reference {
                    return Err(DeviceError::MultipleReferenceTools {
                        tool: tool.id.clone(),
                        existing: existing.to_string(),
                    });
                }
                reference = Some(&tool.id);
            }
        }
        Ok(())
    }
}
