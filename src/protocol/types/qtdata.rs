//! QTDATA: named positions with quaternion orientation
//!
//! Each element is NAME `char[20]`, TYPE u8, a reserved byte, POSITION
//! `float32[3]` and QUATERNION `float32[4]` as (x, y, z, w), 50 bytes.

use super::{get_name, put_name, InstrumentType};
use crate::error::{DeviceError, Result};
use crate::protocol::message::Message;
use crate::transform::{Quaternion, RawPose};
use bytes::{Buf, BufMut};

const ELEMENT_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingElement {
    pub name: String,
    pub instrument_type: InstrumentType,
    pub position: [f32; 3],
    pub quaternion: [f32; 4],
}

impl TrackingElement {
    pub fn new(name: impl Into<String>, position: [f32; 3], quaternion: [f32; 4]) -> Self {
        TrackingElement {
            name: name.into(),
            instrument_type: InstrumentType::Instrument6D,
            position,
            quaternion,
        }
    }

    /// Orientation is passed through unnormalized
    pub fn to_raw_pose(&self) -> RawPose {
        let [x, y, z, w] = self.quaternion.map(f64::from);
        RawPose::new(
            Quaternion::new(x, y, z, w),
            self.position.map(f64::from),
            0.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QtDataMessage {
    pub elements: Vec<TrackingElement>,
}

impl QtDataMessage {
    pub fn new(elements: Vec<TrackingElement>) -> Self {
        QtDataMessage { elements }
    }

    pub fn find(&self, name: &str) -> Option<&TrackingElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

impl Message for QtDataMessage {
    fn message_type() -> &'static str {
        "QTDATA"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.elements.len() * ELEMENT_SIZE);
        for element in &self.elements {
            put_name(&mut buf, &element.name);
            buf.put_u8(element.instrument_type as u8);
            buf.put_u8(0);
            for &v in element.position.iter().chain(element.quaternion.iter()) {
                buf.put_f32(v);
            }
        }
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() % ELEMENT_SIZE != 0 {
            return Err(DeviceError::InvalidSize {
                expected: (data.len() / ELEMENT_SIZE + 1) * ELEMENT_SIZE,
                actual: data.len(),
            });
        }

        let mut elements = Vec::with_capacity(data.len() / ELEMENT_SIZE);
        while data.has_remaining() {
            let name = get_name(&data[..20])?;
            data.advance(20);
            let instrument_type = InstrumentType::try_from(data.get_u8())?;
            data.advance(1);
            let position = [data.get_f32(), data.get_f32(), data.get_f32()];
            let quaternion = [data.get_f32(), data.get_f32(), data.get_f32(), data.get_f32()];
            elements.push(TrackingElement {
                name,
                instrument_type,
                position,
                quaternion,
            });
        }
        Ok(QtDataMessage { elements })
    }
}
