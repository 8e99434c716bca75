//! IMAGE: 2D frames or 3D volumes
//!
//! The body starts with a 72-byte image header:
//!
//! | Field | Size |
//! |---|---|
//! | version | u16 |
//! | components | u8 |
//! | scalar type | u8 |
//! | endian (1 big, 2 little) | u8 |
//! | coordinate system (1 RAS, 2 LPS) | u8 |
//! | size | `u16[3]` |
//! | matrix (t, s, n, origin) | `f32[12]` |
//! | subvolume offset | `u16[3]` |
//! | subvolume size | `u16[3]` |
//!
//! followed by the pixels of the subvolume.

use crate::error::{DeviceError, Result};
use crate::frame::{FrameGeometry, RawFrame};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut, Bytes};

const IMAGE_HEADER_SIZE: usize = 72;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Int8 = 2,
    Uint8 = 3,
    Int16 = 4,
    Uint16 = 5,
    Int32 = 6,
    Uint32 = 7,
    Float32 = 10,
    Float64 = 11,
}

impl PixelType {
    pub fn size(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }
}

impl TryFrom<u8> for PixelType {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            2 => PixelType::Int8,
            3 => PixelType::Uint8,
            4 => PixelType::Int16,
            5 => PixelType::Uint16,
            6 => PixelType::Int32,
            7 => PixelType::Uint32,
            10 => PixelType::Float32,
            11 => PixelType::Float64,
            other => {
                return Err(DeviceError::InvalidHeader(format!(
                    "invalid scalar type: {}",
                    other
                )))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub components: u8,
    pub pixel_type: PixelType,
    pub big_endian: bool,
    /// Coordinate system code, 1 RAS or 2 LPS
    pub coordinate: u8,
    pub size: [u16; 3],
    pub matrix: [f32; 12],
    pub subvolume_offset: [u16; 3],
    pub subvolume_size: [u16; 3],
    pub data: Bytes,
}

impl ImageMessage {
    /// Single-slice image covering the whole volume
    pub fn frame(
        pixel_type: PixelType,
        components: u8,
        width: u16,
        height: u16,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let image = ImageMessage {
            components,
            pixel_type,
            big_endian: true,
            coordinate: 1,
            size: [width, height, 1],
            matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            subvolume_offset: [0; 3],
            subvolume_size: [width, height, 1],
            data: data.into(),
        };
        image.check_data_len()?;
        Ok(image)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.components as usize * self.pixel_type.size()
    }

    fn expected_data_len(&self) -> usize {
        self.subvolume_size.iter().map(|&n| n as usize).product::<usize>() * self.bytes_per_pixel()
    }

    fn check_data_len(&self) -> Result<()> {
        let expected = self.expected_data_len();
        if self.data.len() != expected {
            return Err(DeviceError::InvalidSize {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// The transmitted subvolume as a 2D frame buffer
    pub fn to_raw_frame(&self) -> Result<RawFrame> {
        let [width, height, depth] = self.subvolume_size;
        if depth != 1 {
            return Err(DeviceError::InvalidFrame(format!(
                "image has {} slices, frames are single-slice",
                depth
            )));
        }
        Ok(RawFrame::new(
            FrameGeometry::new(width as u32, height as u32, self.bytes_per_pixel() as u32),
            self.data.clone(),
        ))
    }
}

impl Message for ImageMessage {
    fn message_type() -> &'static str {
        "IMAGE"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        self.check_data_len()?;
        let mut buf = Vec::with_capacity(IMAGE_HEADER_SIZE + self.data.len());
        buf.put_u16(1);
        buf.put_u8(self.components);
        buf.put_u8(self.pixel_type as u8);
        buf.put_u8(if self.big_endian { 1 } else { 2 });
        buf.put_u8(self.coordinate);
        for &n in &self.size {
            buf.put_u16(n);
        }
        for &v in &self.matrix {
            buf.put_f32(v);
        }
        for &n in self.subvolume_offset.iter().chain(&self.subvolume_size) {
            buf.put_u16(n);
        }
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() < IMAGE_HEADER_SIZE {
            return Err(DeviceError::InvalidSize {
                expected: IMAGE_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = data;
        let _version = cursor.get_u16();
        let components = cursor.get_u8();
        let pixel_type = PixelType::try_from(cursor.get_u8())?;
        let big_endian = match cursor.get_u8() {
            1 => true,
            2 => false,
            other => {
                return Err(DeviceError::InvalidHeader(format!(
                    "invalid endian code: {}",
                    other
                )))
            }
        };
        let coordinate = cursor.get_u8();
        let size = [cursor.get_u16(), cursor.get_u16(), cursor.get_u16()];
        let mut matrix = [0.0f32; 12];
        for v in matrix.iter_mut() {
            *v = cursor.get_f32();
        }
        let subvolume_offset = [cursor.get_u16(), cursor.get_u16(), cursor.get_u16()];
        let subvolume_size = [cursor.get_u16(), cursor.get_u16(), cursor.get_u16()];

        let image = ImageMessage {
            components,
            pixel_type,
            big_endian,
            coordinate,
            size,
            matrix,
            subvolume_offset,
            subvolume_size,
            data: Bytes::copy_from_slice(cursor),
        };
        image.check_data_len()?;
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let image = ImageMessage::frame(PixelType::Uint8, 1, 4, 2, vec![7u8; 8]).unwrap();
        let encoded = image.encode_content().unwrap();
        assert_eq!(encoded.len(), IMAGE_HEADER_SIZE + 8);
        assert_eq!(&encoded[0..6], &[0, 1, 1, 3, 1, 1]);
        assert_eq!(&encoded[6..12], &[0, 4, 0, 2, 0, 1]);
        assert_eq!(&encoded[66..72], &[0, 4, 0, 2, 0, 1]);
        assert_eq!(ImageMessage::decode_content(&encoded).unwrap(), image);
    }

    #[test]
    fn test_to_raw_frame() {
        let image = ImageMessage::frame(PixelType::Uint16, 3, 2, 2, vec![0u8; 24]).unwrap();
        let frame = image.to_raw_frame().unwrap();
        assert_eq!(frame.geometry, FrameGeometry::new(2, 2, 6));
        assert_eq!(frame.data.len(), 24);
    }

    #[test]
    fn test_pixel_count_mismatch() {
        assert!(matches!(
            ImageMessage::frame(PixelType::Uint8, 1, 4, 4, vec![0u8; 15]),
            Err(DeviceError::InvalidSize { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_volume_is_not_a_frame() {
        let mut image = ImageMessage::frame(PixelType::Uint8, 1, 2, 2, vec![0u8; 4]).unwrap();
        image.size[2] = 2;
        image.subvolume_size[2] = 2;
        image.data = Bytes::from(vec![0u8; 8]);
        assert!(matches!(image.to_raw_frame(), Err(DeviceError::InvalidFrame(_))));
    }

    #[test]
    fn test_bad_scalar_type() {
        let mut encoded = ImageMessage::frame(PixelType::Uint8, 1, 1, 1, vec![0u8])
            .unwrap()
            .encode_content()
            .unwrap();
        encoded[3] = 42;
        assert!(ImageMessage::decode_content(&encoded).is_err());
    }
}
