//! Byte links between a vendor adapter and its hardware
//!
//! A [`Connector`] is the communication object a device is configured with;
//! each successful open produces a fresh [`Transport`] (the communication
//! handle) which the adapter drops again on close.

pub mod mock;
pub mod serial;
pub mod tcp;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use crate::config::SerialConfig;
use crate::error::{DeviceError, Result};
use std::time::{Duration, Instant};

/// Blocking byte link with a bounded read timeout
pub trait Transport: Send {
    /// Read available bytes.
    ///
    /// Returns `Ok(0)` when the link's read timeout elapsed without data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read only bytes the link already holds, returning `Ok(0)` at once
    /// when there are none.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Discard buffered input
    fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Apply new serial line parameters. No-op for non-serial links.
    fn reconfigure(&mut self, _serial: &SerialConfig) -> Result<()> {
        Ok(())
    }

    /// Hold the line in the break condition for `duration`.
    /// No-op for non-serial links.
    fn send_break(&mut self, _duration: Duration) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input()
    }

    fn reconfigure(&mut self, serial: &SerialConfig) -> Result<()> {
        (**self).reconfigure(serial)
    }

    fn send_break(&mut self, duration: Duration) -> Result<()> {
        (**self).send_break(duration)
    }
}

/// Factory for transports
pub trait Connector: Send {
    fn connect(&mut self) -> Result<Box<dyn Transport>>;

    /// Human readable endpoint, for logs
    fn describe(&self) -> String;
}

/// Fill `buf` completely or give up at `timeout`.
///
/// Returns `Ok(false)` if nothing at all arrived, and
/// [`DeviceError::Timeout`] if the read stopped part way.
pub fn read_exact_timeout(
    transport: &mut dyn Transport,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0;
    while filled < buf.len() {
        let n = transport.read(&mut buf[filled..])?;
        if n == 0 {
            if Instant::now() >= deadline {
                return if filled == 0 {
                    Ok(false)
                } else {
                    Err(DeviceError::Timeout)
                };
            }
            std::thread::yield_now();
            continue;
        }
        filled += n;
    }
    Ok(true)
}

/// Read byte-by-byte up to and including `terminator`.
pub fn read_until(
    transport: &mut dyn Transport,
    terminator: u8,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut line = Vec::with_capacity(64);
    let mut byte = [0u8; 1];
    loop {
        if transport.read(&mut byte)? == 0 {
            if Instant::now() >= deadline {
                return Err(DeviceError::Timeout);
            }
            std::thread::yield_now();
            continue;
        }
        line.push(byte[0]);
        if byte[0] == terminator {
            return Ok(line);
        }
    }
}
