//! Blocking TCP transport

use super::{Connector, Transport};
use crate::config::SocketConfig;
use crate::error::{DeviceError, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect with `timeout` applied to connect, read and write.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        info!("Connecting to {}:{}", host, port);
        let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            DeviceError::InvalidConfig(format!("cannot resolve {}:{}", host, port))
        })?;
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", addr);
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(DeviceError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed by peer",
            ))),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.set_nonblocking(true)?;
        let result = self.read(buf);
        self.stream.set_nonblocking(false)?;
        result
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

impl Connector for SocketConfig {
    fn connect(&mut self) -> Result<Box<dyn Transport>> {
        let transport = TcpTransport::connect(
            &self.host,
            self.port,
            Duration::from_millis(self.timeout_ms),
        )?;
        Ok(Box::new(transport))
    }

    fn describe(&self) -> String {
        format!("tcp:{}:{}", self.host, self.port)
    }
}
