//! Protocol errors

use thiserror::Error;

/// Convenience alias for fallible protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a flight instrument.
///
/// Every variant is fatal to the operation that raised it: the engine never
/// resynchronizes a broken exchange and never returns partial results.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Timed out waiting for instrument data")]
    Timeout,

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Unexpected character {0:#04x}")]
    UnexpectedCharacter(u8),

    #[error("Checksum mismatch: expected {expected:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("Malformed sentence: {0}")]
    MalformedSentence(String),

    #[error("Malformed {kind} record: {text:?}")]
    MalformedRecord {
        /// Which record grammar rejected the line.
        kind: &'static str,
        /// The offending payload, lossily decoded.
        text: String,
    },

    #[error("Reply line exceeds the line buffer")]
    LineOverflow,

    #[error("No reply to {0}")]
    MissingReply(&'static str),

    #[error("Inconsistent reply: {0}")]
    Inconsistent(String),

    #[error("Field overflow: {0}")]
    FieldOverflow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::MalformedRecord`] from a raw reply payload.
    pub(crate) fn malformed(kind: &'static str, payload: &[u8]) -> Self {
        Error::MalformedRecord {
            kind,
            text: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}
