#[cfg(target_os = "linux")]
mod linux;
pub mod mock;

#[cfg(target_os = "linux")]
use linux::is_port_open;

pub use serialport::SerialPort;

use core::time::Duration;
use log::debug;
use serialport::{self, ClearBuffer, SerialPortType};
use std::io::{self, Read, Write};
use std::time::Instant;
use thiserror::Error;

use crate::protocol::{Error, Result};

/// Line oriented byte stream the sensor is attached to.
pub trait Transport {
    /// Writes `data`. Input that arrived earlier and was never read, such
    /// as a reply that came in after a timeout, is discarded first.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Blocks until a full `\n` terminated line is available or `timeout`
    /// elapses. The returned line includes its terminator.
    fn receive_line(&mut self, timeout: Duration) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        (**self).receive_line(timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data)
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        (**self).receive_line(timeout)
    }
}

#[cfg(not(target_os = "linux"))]
fn is_port_open(_port_name: &str) -> bool {
    false
}

#[derive(Error, Debug)]
pub enum OpenPortError {
    #[error("no cozir compatible ports found")]
    NoCompatiblePort,
    #[error("{port_name:?} busy")]
    PortBusy { port_name: String },
}

#[derive(PartialEq)]
struct UsbId(u16, u16);

static COMPATIBLE_IDS: &[UsbId] = &[
    UsbId(0x0403, 0x6001), // FTDI FT232R USB UART
    UsbId(0x0403, 0x6015), // FTDI FT231X USB UART
    UsbId(0x10c4, 0xea60), // Silicon Labs CP210x UART Bridge
    UsbId(0x1a86, 0x7523), // QinHeng Electronics HL-340 USB-Serial adapter
    UsbId(0x067b, 0x2303), // Prolific PL2303 Serial Port
];

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::new(),
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.pending.is_empty() {
            debug!("dropping {} stale bytes", self.pending.len());
            self.pending.clear();
        }
        self.port.clear(ClearBuffer::Input)?;

        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 64];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("recv timeout, {} bytes pending", self.pending.len());
                return Err(Error::Timeout);
            }

            self.port.set_timeout(remaining)?;
            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Transport(e)),
            }
        }
    }
}

pub fn open_port(
    port_name: &str,
    baudrate: u32,
    force: bool,
    timeout: Duration,
) -> anyhow::Result<SerialTransport> {
    let true_name: String = if port_name == "auto" {
        guess_port()?
    } else {
        port_name.to_string()
    };

    if !force && is_port_open(&true_name) {
        return Err(OpenPortError::PortBusy {
            port_name: true_name,
        }
        .into());
    }

    let port = serialport::new(&true_name, baudrate)
        .timeout(timeout)
        .open()?;

    debug!("open_port OK: {} @ {} baud", &true_name, baudrate);
    Ok(SerialTransport::new(port))
}

fn guess_port() -> anyhow::Result<String> {
    serialport::available_ports()?
        .into_iter()
        .filter(|info| match &info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                COMPATIBLE_IDS.contains(&UsbId(usb_info.vid, usb_info.pid))
                    && !is_port_open(&info.port_name)
            }
            _ => false,
        })
        .map(|info| info.port_name)
        .next()
        .ok_or_else(|| OpenPortError::NoCompatiblePort.into())
}
