//! In-memory transport for tests and benches
//!
//! Clones share state, so a test keeps one handle while the adapter owns
//! the transports produced by [`Connector::connect`].

use super::{Connector, Transport};
use crate::config::SerialConfig;
use crate::error::{DeviceError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct Inner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
    responder: Option<Responder>,
    connects: usize,
    fail_connect: bool,
    fail_writes: bool,
    breaks: usize,
    break_reply: Option<Vec<u8>>,
    reconfigured: Vec<SerialConfig>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes to be returned by subsequent reads
    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    /// Answer every write with the bytes returned by `responder`
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Everything written so far, cleared on return
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().written)
    }

    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    pub fn pending_read(&self) -> usize {
        self.lock().read_buffer.len()
    }

    /// Bytes queued for reading whenever a break is sent
    pub fn set_break_reply(&self, reply: &[u8]) {
        self.lock().break_reply = Some(reply.to_vec());
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn break_count(&self) -> usize {
        self.lock().breaks
    }

    pub fn reconfigurations(&self) -> Vec<SerialConfig> {
        self.lock().reconfigured.clone()
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        let n = buf.len().min(inner.read_buffer.len());
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        inner.written.extend_from_slice(data);
        let reply = inner.responder.as_mut().and_then(|respond| respond(data));
        if let Some(reply) = reply {
            inner.read_buffer.extend(reply);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.lock().read_buffer.clear();
        Ok(())
    }

    fn reconfigure(&mut self, serial: &SerialConfig) -> Result<()> {
        self.lock().reconfigured.push(serial.clone());
        Ok(())
    }

    fn send_break(&mut self, _duration: Duration) -> Result<()> {
        let mut inner = self.lock();
        inner.breaks += 1;
        if let Some(reply) = inner.break_reply.clone() {
            inner.read_buffer.extend(reply);
        }
        Ok(())
    }
}

impl Connector for MockTransport {
    fn connect(&mut self) -> Result<Box<dyn Transport>> {
        let mut inner = self.lock();
        if inner.fail_connect {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock connect failure",
            )));
        }
        inner.connects += 1;
        drop(inner);
        Ok(Box::new(self.clone()))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_read() {
        let mut mock = MockTransport::new();
        mock.inject_read(&[1, 2, 3]);
        let mut buf = [0u8; 2];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(mock.pending_read(), 1);
    }

    #[test]
    fn test_responder_replies_to_writes() {
        let mut mock = MockTransport::new();
        mock.set_responder(|data| (data == b"PING").then(|| b"PONG".to_vec()));
        mock.write_all(b"PING").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"PONG");
        assert_eq!(mock.take_written(), b"PING");
        assert!(mock.written().is_empty());
    }

    #[test]
    fn test_connect_shares_state() {
        let mut mock = MockTransport::new();
        let mut link = mock.connect().unwrap();
        link.write_all(b"abc").unwrap();
        assert_eq!(mock.written(), b"abc");
        assert_eq!(mock.connect_count(), 1);
    }

    #[test]
    fn test_connect_failure() {
        let mut mock = MockTransport::new();
        mock.set_fail_connect(true);
        assert!(mock.connect().is_err());
        assert_eq!(mock.connect_count(), 0);
    }
}
