//! OpenIGTLink message header
//!
//! The header is a fixed 58-byte structure that precedes every message.

use crate::error::{DeviceError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Null-padded fixed-width ASCII name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedName<const N: usize>([u8; N]);

/// Message type name (12 bytes)
pub type TypeName = FixedName<12>;

/// Device name (20 bytes)
pub type DeviceName = FixedName<20>;

impl<const N: usize> FixedName<N> {
    pub fn new(name: &str) -> Result<Self> {
        if name.len() > N {
            return Err(DeviceError::InvalidHeader(format!(
                "name '{}' is {} bytes (max: {})",
                name,
                name.len(),
                N
            )));
        }
        let mut bytes = [0u8; N];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(FixedName(bytes))
    }

    /// Name up to the first null byte
    pub fn as_str(&self) -> Result<&str> {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        std::str::from_utf8(&self.0[..len])
            .map_err(|_| DeviceError::InvalidHeader("name is not valid UTF-8".to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for FixedName<N> {
    fn from(bytes: [u8; N]) -> Self {
        FixedName(bytes)
    }
}

/// Header timestamp: upper 32 bits seconds since the Unix epoch, lower
/// 32 bits the fraction of a second scaled to 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, fraction: u32) -> Self {
        Timestamp { seconds, fraction }
    }

    pub fn now() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let fraction = ((now.subsec_nanos() as u64) << 32) / 1_000_000_000;
        Timestamp {
            seconds: now.as_secs() as u32,
            fraction: fraction as u32,
        }
    }

    pub fn to_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    pub fn from_u64(value: u64) -> Self {
        Timestamp {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    pub fn to_nanos(self) -> u64 {
        self.seconds as u64 * 1_000_000_000 + ((self.fraction as u64 * 1_000_000_000) >> 32)
    }
}

/// OpenIGTLink message header (58 bytes, big-endian)
///
/// | Field | Size |
/// |---|---|
/// | version | u16 |
/// | type | `char[12]` |
/// | device name | `char[20]` |
/// | timestamp | u64 |
/// | body size | u64 |
/// | CRC-64 of body | u64 |
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: u16,
    pub type_name: TypeName,
    pub device_name: DeviceName,
    pub timestamp: Timestamp,
    pub body_size: u64,
    pub crc: u64,
}

impl Header {
    pub const SIZE: usize = 58;

    /// Largest body accepted from the wire
    pub const MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(DeviceError::InvalidSize {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        let mut cursor = std::io::Cursor::new(buf);

        let version = cursor.get_u16();
        let mut type_bytes = [0u8; 12];
        cursor.copy_to_slice(&mut type_bytes);
        let mut device_bytes = [0u8; 20];
        cursor.copy_to_slice(&mut device_bytes);
        let timestamp = Timestamp::from_u64(cursor.get_u64());
        let body_size = cursor.get_u64();
        let crc = cursor.get_u64();

        if body_size > Self::MAX_BODY_SIZE {
            return Err(DeviceError::InvalidHeader(format!(
                "body size {} exceeds limit",
                body_size
            )));
        }

        Ok(Header {
            version,
            type_name: TypeName::from(type_bytes),
            device_name: DeviceName::from(device_bytes),
            timestamp,
            body_size,
            crc,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16(self.version);
        buf.put_slice(self.type_name.as_bytes());
        buf.put_slice(self.device_name.as_bytes());
        buf.put_u64(self.timestamp.to_u64());
        buf.put_u64(self.body_size);
        buf.put_u64(self.crc);
        buf.to_vec()
    }
}
