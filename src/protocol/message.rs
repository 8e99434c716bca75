//! OpenIGTLink message trait and framing
//!
//! [`IgtlMessage`] pairs a header with a typed body. [`RawMessage`] is what
//! comes off the wire before the body type is known: clients read raw
//! messages, dispatch on the type name and decode only what they consume.
//! [`MessageReader`] cuts raw messages out of a byte stream.

use crate::error::{DeviceError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{DeviceName, Header, Timestamp, TypeName};
use crate::transport::Transport;
use bytes::{Bytes, BytesMut};

/// Bytes requested from the link per read
const READ_CHUNK: usize = 16 * 1024;

/// Common interface for message bodies
pub trait Message: Sized {
    /// Type name carried in the header, e.g. "TRANSFORM"
    fn message_type() -> &'static str;

    fn encode_content(&self) -> Result<Vec<u8>>;

    fn decode_content(data: &[u8]) -> Result<Self>;
}

/// Header plus typed body
#[derive(Debug, Clone)]
pub struct IgtlMessage<T: Message> {
    pub header: Header,
    pub content: T,
}

impl<T: Message> IgtlMessage<T> {
    pub fn new(content: T, device_name: &str) -> Result<Self> {
        let header = Header {
            version: 1,
            type_name: TypeName::new(T::message_type())?,
            device_name: DeviceName::new(device_name)?,
            timestamp: Timestamp::now(),
            body_size: 0,
            crc: 0,
        };
        Ok(IgtlMessage { header, content })
    }

    /// Encode header and body, filling in body size and CRC
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = self.content.encode_content()?;
        let mut header = self.header.clone();
        header.body_size = body.len() as u64;
        header.crc = calculate_crc(&body);

        let mut buf = Vec::with_capacity(Header::SIZE + body.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let raw = RawMessage::decode(data)?;
        let content = raw.decode_body::<T>()?;
        Ok(IgtlMessage {
            header: raw.header,
            content,
        })
    }
}

/// A message with its body still undecoded
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub header: Header,
    pub body: Bytes,
}

impl RawMessage {
    /// Frame an already encoded body, computing size and CRC
    pub fn new(type_name: &str, device_name: &str, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        let header = Header {
            version: 1,
            type_name: TypeName::new(type_name)?,
            device_name: DeviceName::new(device_name)?,
            timestamp: Timestamp::now(),
            body_size: body.len() as u64,
            crc: calculate_crc(&body),
        };
        Ok(RawMessage { header, body })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Header::SIZE + self.body.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.body);
        buf
    }

    /// Decode one complete message from a buffer and check its CRC
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = Header::decode(data)?;
        let end = Header::SIZE + header.body_size as usize;
        if data.len() < end {
            return Err(DeviceError::InvalidSize {
                expected: end,
                actual: data.len(),
            });
        }
        Self::checked(header, Bytes::copy_from_slice(&data[Header::SIZE..end]))
    }

    fn checked(header: Header, body: Bytes) -> Result<Self> {
        let actual = calculate_crc(&body);
        if actual != header.crc {
            return Err(DeviceError::CrcMismatch {
                expected: header.crc,
                actual,
            });
        }
        Ok(RawMessage { header, body })
    }

    pub fn type_name(&self) -> Result<&str> {
        self.header.type_name.as_str()
    }

    pub fn device_name(&self) -> Result<&str> {
        self.header.device_name.as_str()
    }

    pub fn is<T: Message>(&self) -> bool {
        self.type_name().map_or(false, |name| name == T::message_type())
    }

    /// Decode the body as `T`, checking the type name first
    pub fn decode_body<T: Message>(&self) -> Result<T> {
        let name = self.type_name()?;
        if name != T::message_type() {
            return Err(DeviceError::UnknownMessageType(format!(
                "expected {}, got {}",
                T::message_type(),
                name
            )));
        }
        T::decode_content(&self.body)
    }
}

/// Receive buffer for one link.
///
/// Bytes are kept across reads, so a message that arrives in pieces is
/// returned once its last byte is in.
#[derive(Debug, Default)]
pub struct MessageReader {
    buf: BytesMut,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet returned as a message
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Read once from `transport`, waiting up to the link's read timeout.
    /// Returns the number of bytes added.
    pub fn fill(&mut self, transport: &mut dyn Transport) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = transport.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Take whatever the link has already received, without waiting.
    pub fn fill_available(&mut self, transport: &mut dyn Transport) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = transport.read_available(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// The next complete message, or `None` until more bytes arrive.
    ///
    /// A message failing its CRC is consumed and reported. An undecodable
    /// header leaves no way to find the next message boundary, so the
    /// buffer is dropped.
    pub fn next_message(&mut self) -> Result<Option<RawMessage>> {
        if self.buf.len() < Header::SIZE {
            return Ok(None);
        }
        let header = match Header::decode(&self.buf[..Header::SIZE]) {
            Ok(header) => header,
            Err(e) => {
                self.buf.clear();
                return Err(e);
            }
        };
        let end = Header::SIZE + header.body_size as usize;
        if self.buf.len() < end {
            return Ok(None);
        }
        let mut frame = self.buf.split_to(end);
        let body = frame.split_off(Header::SIZE).freeze();
        RawMessage::checked(header, body).map(Some)
    }
}
