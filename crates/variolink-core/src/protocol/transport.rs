//! Serial transport
//!
//! Low-level access to the instrument's serial line. The session drives the
//! [`Transport`] trait so tests can substitute a scripted mock for the real
//! port.

use serialport::{SerialPort, SerialPortType};
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{self, Read, Write};

use super::error::{Error, Result};
use super::{BAUD_RATE, POLL_TIMEOUT};

/// Byte-level I/O as the session consumes it.
///
/// The engine performs one poll-bounded read at a time and writes whole
/// buffers; there is no OS flow control anywhere on the line, the XON/XOFF
/// discipline lives in the session.
pub trait Transport: Send {
    /// Read once into `buf`, blocking for at most the poll interval.
    ///
    /// Returns the number of bytes read (never zero).
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer to the device.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Device path for diagnostics.
    fn path(&self) -> &str;

    /// Flush pending output before the device handle is released.
    fn shutdown(&mut self) -> Result<()>;
}

/// A real serial connection to a flight instrument.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialLink {
    /// Open `path` at the instrument's fixed line parameters: 57600 baud,
    /// 8N1, no flow control, reads bounded by the poll interval. Stale
    /// buffered traffic is discarded so the first exchange starts clean.
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(POLL_TIMEOUT)
            .open()
            .map_err(|e| Error::Serial(format!("{}: {}", path, e)))?;
        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| Error::Serial(format!("{}: {}", path, e)))?;

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }
}

impl Transport for SerialLink {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.port.read(buf) {
                // The line signalled readiness but delivered nothing: the
                // device side of the stream is gone.
                Ok(0) => return Err(Error::UnexpectedEof),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(Error::Timeout),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Serial(format!("{}: {}", self.path, e))),
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|e| Error::Serial(format!("{}: {}", self.path, e)))?;
        self.port
            .flush()
            .map_err(|e| Error::Serial(format!("{}: {}", self.path, e)))
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn shutdown(&mut self) -> Result<()> {
        self.port
            .flush()
            .map_err(|e| Error::Serial(format!("{}: {}", self.path, e)))
    }
}

/// An attached serial device a caller can pick from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub name: String,
    /// USB product description when the adapter reports one.
    pub product: Option<String>,
}

/// List candidate serial ports with deterministic ordering: ttyACM devices
/// first, then ttyUSB, each sorted numerically, then everything else by
/// name. Flight instruments almost always hang off a USB serial cable.
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let product = match info.port_type {
                SerialPortType::UsbPort(usb) => usb.product,
                _ => None,
            };
            PortInfo {
                name: info.port_name,
                product,
            }
        })
        .collect();

    // Some platforms miss devices in the enumeration API; pick up the usual
    // device nodes directly.
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("ttyACM") || name.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", name);
                    if !ports.iter().any(|p| p.name == full) {
                        ports.push(PortInfo {
                            name: full,
                            product: None,
                        });
                    }
                }
            }
        }
    }

    ports.sort_by_key(|p| sort_rank(&p.name));
    ports.dedup_by(|a, b| a.name == b.name);
    ports
}

fn sort_rank(name: &str) -> (u8, usize, String) {
    let base = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyACM"), (1u8, "ttyUSB")] {
        if let Some(suffix) = base.strip_prefix(prefix) {
            return (rank, suffix.parse().unwrap_or(usize::MAX), base.to_string());
        }
    }
    (2, 0, base.to_string())
}
