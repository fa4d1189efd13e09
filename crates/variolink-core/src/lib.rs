//! # VarioLink Core Library
//!
//! Core functionality for talking to Flytec and Brauniger flight instruments.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The instrument serial protocol (NMEA-style sentences, XON/XOFF flow control)
//! - Track downloads as IGC fixes, with standard IGC filenames
//! - Waypoint and route transfer in both directions
//! - A flight store tying waypoints, routes and tracks together
//!
//! ## Supported instruments
//!
//! - Flytec 5020 / 5030 / 5520 / 6020 / 6030
//! - Brauniger Compeo, Competino and Galileo families
//!
//! ## Example
//!
//! ```rust,ignore
//! use variolink_core::protocol::{DeviceConfig, DeviceSession};
//!
//! let mut session = DeviceSession::open("/dev/ttyUSB0", DeviceConfig::default())?;
//! let identity = session.identity()?;
//! println!("{} s/n {}", identity.model, identity.serial);
//!
//! for track in session.track_list()? {
//!     println!("{}", track.filename);
//! }
//! ```

pub mod protocol;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        download, upload, DeviceConfig, DeviceIdentity, DeviceSession, Error, FilenameFormat,
        Result, TrackSummary,
    };
    pub use crate::store::{FixQuality, FlightDb, Route, Track, TrackPoint, Waypoint};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
