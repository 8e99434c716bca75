//! Serial port transport built on `serialport`

use super::{Connector, Transport};
use crate::config::{DataBits, Handshake, Parity, SerialConfig, StopBits};
use crate::error::Result;
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> Result<Self> {
        info!(port = %config.port, baud = config.baud_rate.as_u32(), "Opening serial port");
        let port = serialport::new(&config.port, config.baud_rate.as_u32())
            .data_bits(data_bits(config.data_bits))
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits))
            .flow_control(flow_control(config.handshake))
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()?;
        Ok(SerialTransport {
            port,
            path: config.port.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let waiting = self.port.bytes_to_read()? as usize;
        if waiting == 0 {
            return Ok(0);
        }
        let len = waiting.min(buf.len());
        self.read(&mut buf[..len])
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn reconfigure(&mut self, config: &SerialConfig) -> Result<()> {
        debug!(port = %self.path, baud = config.baud_rate.as_u32(), "Reconfiguring serial port");
        self.port.set_baud_rate(config.baud_rate.as_u32())?;
        self.port.set_data_bits(data_bits(config.data_bits))?;
        self.port.set_parity(parity(config.parity))?;
        self.port.set_stop_bits(stop_bits(config.stop_bits))?;
        self.port.set_flow_control(flow_control(config.handshake))?;
        Ok(())
    }

    fn send_break(&mut self, duration: Duration) -> Result<()> {
        self.port.set_break()?;
        std::thread::sleep(duration);
        self.port.clear_break()?;
        Ok(())
    }
}

impl Connector for SerialConfig {
    fn connect(&mut self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(self)?))
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.port, self.baud_rate.as_u32())
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn flow_control(handshake: Handshake) -> serialport::FlowControl {
    match handshake {
        Handshake::Off => serialport::FlowControl::None,
        Handshake::On => serialport::FlowControl::Hardware,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaudRate;

    #[test]
    fn test_describe() {
        let config = SerialConfig {
            port: "/dev/ttyUSB0".into(),
            baud_rate: BaudRate::B115200,
            ..SerialConfig::default()
        };
        assert_eq!(config.describe(), "serial:/dev/ttyUSB0@115200");
    }

    #[test]
    fn test_parameter_mapping() {
        assert_eq!(data_bits(DataBits::Seven), serialport::DataBits::Seven);
        assert_eq!(parity(Parity::Even), serialport::Parity::Even);
        assert_eq!(stop_bits(StopBits::Two), serialport::StopBits::Two);
        assert_eq!(flow_control(Handshake::On), serialport::FlowControl::Hardware);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialConfig {
            port: "/dev/igt-devices-no-such-port".into(),
            ..SerialConfig::default()
        };
        assert!(SerialTransport::open(&config).is_err());
    }
}
