//! STATUS: device condition reports
//!
//! Body: CODE u16, SUBCODE i64, ERROR NAME `char[20]`, then a
//! null-terminated status string.

use crate::error::{DeviceError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const MIN_SIZE: usize = 31;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    /// 0 invalid, 1 OK, other values are device errors
    pub code: u16,
    pub subcode: i64,
    pub error_name: String,
    pub status_string: String,
}

impl StatusMessage {
    pub const OK: u16 = 1;

    pub fn ok(status_string: &str) -> Self {
        StatusMessage {
            code: Self::OK,
            subcode: 0,
            error_name: String::new(),
            status_string: status_string.to_string(),
        }
    }

    pub fn error(code: u16, error_name: &str, status_string: &str) -> Self {
        StatusMessage {
            code,
            subcode: 0,
            error_name: error_name.to_string(),
            status_string: status_string.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }
}

impl Message for StatusMessage {
    fn message_type() -> &'static str {
        "STATUS"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MIN_SIZE + self.status_string.len());
        buf.put_u16(self.code);
        buf.put_i64(self.subcode);
        super::put_name(&mut buf, &self.error_name);
        buf.extend_from_slice(self.status_string.as_bytes());
        buf.put_u8(0);
        Ok(buf)
    }

    fn decode_content(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_SIZE {
            return Err(DeviceError::InvalidSize {
                expected: MIN_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = data;
        let code = cursor.get_u16();
        let subcode = cursor.get_i64();
        let error_name = super::get_name(&cursor[..20])?;
        cursor.advance(20);
        let end = cursor.iter().position(|&b| b == 0).unwrap_or(cursor.len());
        let status_string = String::from_utf8(cursor[..end].to_vec())?;

        Ok(StatusMessage {
            code,
            subcode,
            error_name,
            status_string,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_status() {
        let encoded = StatusMessage::ok("Ready").encode_content().unwrap();
        assert_eq!(encoded.len(), 30 + 6);
        assert_eq!(&encoded[0..2], &[0, 1]);
        let decoded = StatusMessage::decode_content(&encoded).unwrap();
        assert!(decoded.is_ok());
        assert_eq!(decoded.status_string, "Ready");
    }

    #[test]
    fn test_error_status() {
        let msg = StatusMessage::error(13, "DISCONNECT", "probe unplugged");
        let decoded = StatusMessage::decode_content(&msg.encode_content().unwrap()).unwrap();
        assert!(!decoded.is_ok());
        assert_eq!(decoded.error_name, "DISCONNECT");
        assert_eq!(decoded.status_string, "probe unplugged");
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            StatusMessage::decode_content(&[0u8; 12]),
            Err(DeviceError::InvalidSize { expected: 31, actual: 12 })
        ));
    }
}
