//! Sentence framing
//!
//! Implements the NMEA-style sentence envelope used by Flytec and Brauniger
//! instruments:
//! - 1 byte: `$`
//! - N bytes: payload
//! - 1 byte: `*`
//! - 2 bytes: checksum, two uppercase hex digits
//! - 2 bytes: `\r\n`
//!
//! The checksum is the running 8-bit XOR of the payload bytes. A sentence
//! that fails any envelope check is rejected outright; there is no
//! resynchronization within a reply stream.

use super::error::{Error, Result};

/// Smallest possible frame: `$*HH\r\n` around an empty payload.
const MIN_FRAME_LEN: usize = 6;

/// Running XOR of the payload bytes.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, byte| sum ^ byte)
}

/// Wrap a payload in the full wire envelope.
pub fn encode(payload: &str) -> String {
    format!("${}*{:02X}\r\n", payload, checksum(payload.as_bytes()))
}

/// Validate a received line and return the payload between `$` and `*`.
///
/// The line must carry the complete envelope including the trailing CRLF.
pub fn decode(line: &[u8]) -> Result<&[u8]> {
    if line.len() < MIN_FRAME_LEN {
        return Err(malformed("sentence too short", line));
    }
    if line[0] != b'$' {
        return Err(malformed("missing leading '$'", line));
    }
    let star = line.len() - 5;
    if line[star] != b'*' {
        return Err(malformed("missing '*' before checksum", line));
    }
    if &line[line.len() - 2..] != b"\r\n" {
        return Err(malformed("missing CR LF terminator", line));
    }

    let expected = match (hex_value(line[star + 1]), hex_value(line[star + 2])) {
        (Some(hi), Some(lo)) => hi << 4 | lo,
        _ => return Err(malformed("non-hex checksum digits", line)),
    };

    let payload = &line[1..star];
    let computed = checksum(payload);
    if expected != computed {
        return Err(Error::ChecksumMismatch { expected, computed });
    }

    Ok(payload)
}

fn malformed(reason: &str, line: &[u8]) -> Error {
    Error::MalformedSentence(format!("{}: {:?}", reason, String::from_utf8_lossy(line)))
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}
