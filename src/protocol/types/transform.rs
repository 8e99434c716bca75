//! TRANSFORM: one homogeneous 4x4 matrix
//!
//! Only the upper 3x4 part is sent, as 12 big-endian floats in column
//! order: R11 R21 R31 R12 R22 R32 R13 R23 R33 TX TY TZ.

use super::widen;
use crate::error::{DeviceError, Result};
use crate::protocol::message::Message;
use crate::transform::RawPose;
use bytes::{Buf, BufMut};

const BODY_SIZE: usize = 48;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformMessage {
    /// Row-major matrix; the last row is always `[0, 0, 0, 1]`
    pub matrix: [[f32; 4]; 4],
}

impl TransformMessage {
    pub fn identity() -> Self {
        TransformMessage::translation(0.0, 0.0, 0.0)
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        TransformMessage {
            matrix: [
                [1.0, 0.0, 0.0, x],
                [0.0, 1.0, 0.0, y],
                [0.0, 0.0, 1.0, z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn to_raw_pose(&self) -> RawPose {
        let upper = [self.matrix[0], self.matrix[1], self.matrix[2]];
        RawPose::from_matrix(&widen(&upper))
    }
}

impl Message for TransformMessage {
    fn message_type() -> &'static str {
        "TRANSFORM"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(BODY_SIZE);
        for col in 0..4 {
            for row in 0..3 {
                buf.put_f32(self.matrix[row][col]);
            }
        }
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() != BODY_SIZE {
            return Err(DeviceError::InvalidSize {
                expected: BODY_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = std::io::Cursor::new(data);
        let mut matrix = [[0.0f32; 4]; 4];
        for col in 0..4 {
            for row in matrix.iter_mut().take(3) {
                row[col] = cursor.get_f32();
            }
        }
        matrix[3] = [0.0, 0.0, 0.0, 1.0];

        Ok(TransformMessage { matrix })
    }
}
