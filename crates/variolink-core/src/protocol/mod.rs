//! Serial Protocol Engine
//!
//! Implements the Flytec/Brauniger flight instrument serial protocol.
//!
//! NMEA-style sentences carrying an XOR checksum, XON/XOFF software flow
//! control bracketing every command, IGC track streaming, and waypoint and
//! route transfer in both directions.

use std::time::Duration;

pub mod commands;
mod error;
pub mod parser;
mod scan;
pub mod sentence;
mod session;
pub mod transform;
pub mod transport;
mod writer;

pub use commands::Command;
pub use error::{Error, Result};
pub use parser::{DeviceIdentity, TrackSummary};
pub use session::{download, upload, DeviceConfig, DeviceSession};
pub use transform::FilenameFormat;
pub use transport::{list_ports, PortInfo, SerialLink, Transport};

/// Baud rate every supported instrument talks at.
pub const BAUD_RATE: u32 = 57_600;

/// Upper bound on one blocking read; reads poll at this interval.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Software flow control byte: device ready for the next command.
pub const XON: u8 = 0x11;

/// Software flow control byte: device busy producing a reply.
pub const XOFF: u8 = 0x13;

/// Longest reply line the engine accepts, terminator included.
pub const MAX_LINE_LEN: usize = 1024;
