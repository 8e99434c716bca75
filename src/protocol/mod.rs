//! OpenIGTLink wire format
//!
//! Only the subset a tracker or imager client consumes is implemented:
//! the 58-byte header, the CRC-64 body checksum and the TRANSFORM, TDATA,
//! QTDATA, IMAGE and STATUS bodies.

pub mod crc;
pub mod header;
pub mod message;
pub mod types;

pub use crc::{calculate_crc, verify_crc};
pub use header::{DeviceName, Header, Timestamp, TypeName};
pub use message::{IgtlMessage, Message, MessageReader, RawMessage};
pub use types::{ImageMessage, QtDataMessage, StatusMessage, TDataMessage, TransformMessage};
