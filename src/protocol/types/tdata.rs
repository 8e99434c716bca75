//! TDATA: named tracking matrices, several tools per message
//!
//! Each element is NAME `char[20]`, TYPE u8, a reserved byte and the upper
//! 3x4 matrix as 12 row-major big-endian floats (70 bytes).

use super::{get_name, put_name, widen, InstrumentType};
use crate::error::{DeviceError, Result};
use crate::protocol::message::Message;
use crate::transform::RawPose;
use bytes::{Buf, BufMut};

const ELEMENT_SIZE: usize = 70;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingDataElement {
    pub name: String,
    pub instrument_type: InstrumentType,
    pub matrix: [[f32; 4]; 3],
}

impl TrackingDataElement {
    pub fn new(name: impl Into<String>, instrument_type: InstrumentType, matrix: [[f32; 4]; 3]) -> Self {
        TrackingDataElement {
            name: name.into(),
            instrument_type,
            matrix,
        }
    }

    pub fn with_translation(name: impl Into<String>, x: f32, y: f32, z: f32) -> Self {
        TrackingDataElement::new(
            name,
            InstrumentType::Instrument6D,
            [
                [1.0, 0.0, 0.0, x],
                [0.0, 1.0, 0.0, y],
                [0.0, 0.0, 1.0, z],
            ],
        )
    }

    pub fn to_raw_pose(&self) -> RawPose {
        RawPose::from_matrix(&widen(&self.matrix))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TDataMessage {
    pub elements: Vec<TrackingDataElement>,
}

impl TDataMessage {
    pub fn new(elements: Vec<TrackingDataElement>) -> Self {
        TDataMessage { elements }
    }

    pub fn find(&self, name: &str) -> Option<&TrackingDataElement> {
        self.elements.iter().find(|e| e.name == name)
    }
}

impl Message for TDataMessage {
    fn message_type() -> &'static str {
        "TDATA"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.elements.len() * ELEMENT_SIZE);
        for element in &self.elements {
            put_name(&mut buf, &element.name);
            buf.put_u8(element.instrument_type as u8);
            buf.put_u8(0);
            for row in &element.matrix {
                for &value in row {
                    buf.put_f32(value);
                }
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
            let mut matrix = [[0.0f32; 4]; 3];
            for row in matrix.iter_mut() {
                for value in row.iter_mut() {
                    *value = data.get_f32();
                }
            }
            elements.push(TrackingDataElement {
                name,
                instrument_type,
                matrix,
            });
        }
        Ok(TDataMessage { elements })
    }
}
