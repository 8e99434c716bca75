//! Message bodies a tracker or imager client consumes

pub mod image;
pub mod qtdata;
pub mod status;
pub mod tdata;
pub mod transform;

pub use image::{ImageMessage, PixelType};
pub use qtdata::{QtDataMessage, TrackingElement};
pub use status::StatusMessage;
pub use tdata::{TDataMessage, TrackingDataElement};
pub use transform::TransformMessage;

use crate::error::{DeviceError, Result};

/// Instrument type shared by TDATA and QTDATA elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InstrumentType {
    Tracker = 1,
    Instrument6D = 2,
    Instrument3D = 3,
    Instrument5D = 4,
}

impl TryFrom<u8> for InstrumentType {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(InstrumentType::Tracker),
            2 => Ok(InstrumentType::Instrument6D),
            3 => Ok(InstrumentType::Instrument3D),
            4 => Ok(InstrumentType::Instrument5D),
            _ => Err(DeviceError::InvalidHeader(format!(
                "invalid instrument type: {}",
                value
            ))),
        }
    }
}

/// Element name as `char[20]`, always null terminated
pub(crate) fn put_name(buf: &mut Vec<u8>, name: &str) {
    let mut bytes = [0u8; 20];
    let len = name.len().min(19);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf.extend_from_slice(&bytes);
}

pub(crate) fn get_name(bytes: &[u8]) -> Result<String> {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8(bytes[..len].to_vec())?)
}

/// Widen the upper 3x4 part of a float matrix
pub(crate) fn widen(matrix: &[[f32; 4]; 3]) -> [[f64; 4]; 3] {
    matrix.map(|row| row.map(f64::from))
}
