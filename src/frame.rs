//! Video frames
//!
//! The imager counterpart of [`Transform`](crate::transform::Transform): one
//! captured image buffer with the same validity semantics.

use crate::error::{DeviceError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Width, height and pixel depth of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        FrameGeometry {
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Buffer size in bytes
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }
}

/// Frame as received from an imager, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub geometry: FrameGeometry,
    pub data: Bytes,
}

impl RawFrame {
    pub fn new(geometry: FrameGeometry, data: impl Into<Bytes>) -> Self {
        RawFrame {
            geometry,
            data: data.into(),
        }
    }
}

/// Validated image buffer
///
/// Cloning shares the pixel data; the buffer itself is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    geometry: FrameGeometry,
    data: Bytes,
    start: Instant,
    expiration: Instant,
}

impl Frame {
    /// Build a frame, checking the buffer against its declared geometry and,
    /// when given, the geometry the owning tool expects.
    pub fn from_raw(
        raw: RawFrame,
        expected: Option<&FrameGeometry>,
        validity: Duration,
    ) -> Result<Self> {
        if let Some(expected) = expected {
            if *expected != raw.geometry {
                return Err(DeviceError::InvalidFrame(format!(
                    "geometry {}x{}x{} does not match expected {}x{}x{}",
                    raw.geometry.width,
                    raw.geometry.height,
                    raw.geometry.bytes_per_pixel,
                    expected.width,
                    expected.height,
                    expected.bytes_per_pixel
                )));
            }
        }
        if raw.data.len() != raw.geometry.byte_len() {
            return Err(DeviceError::InvalidSize {
                expected: raw.geometry.byte_len(),
                actual: raw.data.len(),
            });
        }
        let start = Instant::now();
        Ok(Frame {
            geometry: raw.geometry,
            data: raw.data,
            start,
            expiration: start + validity,
        })
    }

    /// Zero-sized frame that is already expired
    pub fn empty() -> Self {
        let now = Instant::now();
        Frame {
            geometry: FrameGeometry::default(),
            data: Bytes::new(),
            start: now,
            expiration: now,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn start_time(&self) -> Instant {
        self.start
    }

    pub fn expiration_time(&self) -> Instant {
        self.expiration
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expiration
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::empty()
    }
}
