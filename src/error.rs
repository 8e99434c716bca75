//! Error types for device operations
//!
//! This module defines all error types that can occur while driving a
//! tracker or imager: lifecycle sequencing, tool configuration, vendor
//! communication, wire-format decoding and data integrity.

use crate::state::{DeviceState, Request};
use thiserror::Error;

/// Device error types
///
/// All fallible operations in this library return `Result<T, DeviceError>`.
/// Errors raised on the polling thread never cross into the caller's
/// thread as values of this type; they are recorded as cycle results in
/// the [`SampleStore`](crate::store::SampleStore) and surfaced by
/// [`Device::update_status`](crate::device::Device::update_status).
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Request issued from a state where it is not a legal transition
    ///
    /// Sequencing errors never change the device state and never touch
    /// the communication handle.
    ///
    /// # Example
    /// ```no_run
    /// # use igt_devices::error::DeviceError;
    /// # use igt_devices::state::{DeviceState, Request};
    /// let err = DeviceError::InvalidRequest {
    ///     state: DeviceState::Idle,
    ///     request: Request::StartTracking,
    /// };
    /// ```
    #[error("Invalid request {request:?} in state {state:?}")]
    InvalidRequest {
        /// State the device was in when the request arrived
        state: DeviceState,
        /// The rejected request
        request: Request,
    },

    /// Device configuration is invalid
    ///
    /// This error occurs when:
    /// - Polling frequency is zero, negative or above the device maximum
    /// - A configuration file cannot be parsed
    /// - Serial or socket parameters are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Open was requested but no communication object is configured
    #[error("No communication configured for device")]
    NoCommunication,

    /// Vendor-specific open failed
    #[error("Open failed: {0}")]
    OpenFailure(String),

    /// Tool failed device-specific verification
    ///
    /// Port out of range, missing SROM file, wrong binding kind for the
    /// device type and similar compatibility problems.
    #[error("Tool '{tool}' rejected: {reason}")]
    ToolRejected {
        /// Identifier of the rejected tool
        tool: String,
        /// Human readable reason
        reason: String,
    },

    /// A tool with the same identifier is already registered
    #[error("Duplicate tool identifier: {0}")]
    DuplicateTool(String),

    /// A second tool was flagged as the reference tool
    #[error("Tool '{tool}' cannot be reference: '{existing}' already is")]
    MultipleReferenceTools {
        /// Tool that was being added
        tool: String,
        /// Tool that already holds the reference flag
        existing: String,
    },

    /// No tool with this identifier is registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Start tracking failed
    #[error("Start tracking failed: {0}")]
    StartTrackingFailure(String),

    /// I/O error on the communication link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Vendor call did not complete in time
    #[error("Communication timeout")]
    Timeout,

    /// Device answered with an error code
    ///
    /// For NDI systems `code` is the two-digit hex code of an `ERRORxx`
    /// reply.
    #[error("Vendor error {code}: {message}")]
    VendorError {
        /// Vendor error code
        code: String,
        /// Description of the code, when known
        message: String,
    },

    /// Reply from the device could not be parsed
    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    /// Too many consecutive polling failures
    #[error("Communication lost after {0} consecutive failed polls")]
    CommunicationLost(u32),

    /// Invalid OpenIGTLink header format or content
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Checksum mismatch
    ///
    /// Used for the CRC-64 of OpenIGTLink bodies and the CRC-16 of NDI
    /// replies. The message must be discarded.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// CRC carried by the message
        expected: u64,
        /// CRC computed over the received bytes
        actual: u64,
    },

    /// Payload size does not match its declared or required size
    #[error("Invalid message size: expected {expected}, got {actual}")]
    InvalidSize {
        /// Expected size in bytes
        expected: usize,
        /// Actual size in bytes
        actual: usize,
    },

    /// Unsupported OpenIGTLink message type
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Frame buffer does not match its declared or expected geometry
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Polling thread could not be spawned or terminated abnormally
    #[error("Polling thread error: {0}")]
    PollingThread(String),
}

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// True for errors caused by the link or the device rather than by the
    /// caller's configuration or request order.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            DeviceError::Io(_)
                | DeviceError::Serial(_)
                | DeviceError::Timeout
                | DeviceError::VendorError { .. }
                | DeviceError::InvalidReply(_)
                | DeviceError::CrcMismatch { .. }
                | DeviceError::InvalidHeader(_)
                | DeviceError::InvalidSize { .. }
                | DeviceError::CommunicationLost(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_display() {
        let err = DeviceError::InvalidRequest {
            state: DeviceState::Idle,
            request: Request::StartTracking,
        };
        assert_eq!(err.to_string(), "Invalid request StartTracking in state Idle");
    }

    #[test]
    fn test_communication_classification() {
        assert!(DeviceError::Timeout.is_communication());
        assert!(DeviceError::VendorError {
            code: "0C".into(),
            message: "".into()
        }
        .is_communication());
        assert!(!DeviceError::DuplicateTool("T1".into()).is_communication());
        assert!(!DeviceError::NoCommunication.is_communication());
    }
}
