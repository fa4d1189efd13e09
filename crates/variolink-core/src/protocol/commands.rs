//! Protocol commands
//!
//! Defines the request sentences understood by Flytec and Brauniger
//! instruments. Every request payload goes through the same flow-control
//! bracket; the variants differ only in their payload and in whether the
//! reply lines arrive framed or as free IGC text.

use super::error::{Error, Result};

/// Request commands for instrument communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query model, pilot, serial and firmware (`PBRSNP`).
    DeviceInfo,

    /// List the recorded tracks (`PBRTL`).
    TrackList,

    /// Stream one track's IGC detail by list index (`PBRTR`).
    TrackDetail {
        /// Zero-based index into the track list, two wire digits.
        index: u32,
    },

    /// Stream the full track log as IGC text (`PBRIGC`).
    TrackLog,

    /// List the stored waypoints (`PBRWPS`).
    WaypointList,

    /// List the stored routes (`PBRRTS`).
    RouteList,
}

impl Command {
    /// Render the request payload for the sentence framer.
    ///
    /// The track index field is fixed at two digits; a wider index cannot be
    /// encoded and fails rather than truncating.
    pub fn payload(&self) -> Result<String> {
        match self {
            Command::DeviceInfo => Ok("PBRSNP,".to_string()),
            Command::TrackList => Ok("PBRTL,".to_string()),
            Command::TrackDetail { index } => {
                if *index > 99 {
                    return Err(Error::FieldOverflow(format!(
                        "track index {} exceeds two digits",
                        index
                    )));
                }
                Ok(format!("PBRTR,{:02}", index))
            }
            Command::TrackLog => Ok("PBRIGC,".to_string()),
            Command::WaypointList => Ok("PBRWPS,".to_string()),
            Command::RouteList => Ok("PBRRTS,".to_string()),
        }
    }

    /// Whether the reply lines carry the sentence envelope.
    ///
    /// The IGC exchanges answer with free text lines; everything else
    /// answers with checksum-framed sentences.
    pub fn framed_reply(&self) -> bool {
        !matches!(self, Command::TrackDetail { .. } | Command::TrackLog)
    }
}
