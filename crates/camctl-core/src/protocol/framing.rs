//! Transport framing for camera command payloads.
//!
//! Wire format of a strict frame:
//! ```text
//! [0x01][0x00][payload_len:2][seq:4][payload:N]
//! ```
//! The header is 8 bytes.  All multi-byte integers are big-endian.  Loose
//! frames are the bare payload with no header at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::sequence::SequenceCounter;

/// Size of the strict transport header in bytes.
pub const STRICT_HEADER_LEN: usize = 8;

/// Payload type bytes for a camera command.
const COMMAND_PAYLOAD_TYPE: [u8; 2] = [0x01, 0x00];

/// Which framing a camera expects on its UDP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViscaVariant {
    /// Each payload is wrapped in an 8-byte header with a sequence number.
    Strict,
    /// Payload bytes are sent as-is.
    #[default]
    Loose,
}

/// Errors raised when parsing an inbound strict header.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

/// A decoded strict header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrictHeader {
    pub payload_type: [u8; 2],
    pub payload_len: u16,
    pub sequence: u32,
}

/// Wraps payloads for one camera connection.
///
/// Owns the connection's [`SequenceCounter`].  Only call [`FrameEncoder::wrap`]
/// for frames that are actually about to be transmitted; every call consumes
/// one sequence number on strict connections.
#[derive(Debug)]
pub struct FrameEncoder {
    variant: ViscaVariant,
    sequence: SequenceCounter,
}

impl FrameEncoder {
    pub fn new(variant: ViscaVariant) -> Self {
        Self {
            variant,
            sequence: SequenceCounter::new(),
        }
    }

    pub fn variant(&self) -> ViscaVariant {
        self.variant
    }

    /// Sequence number the next strict frame will carry.
    pub fn next_sequence(&self) -> u32 {
        self.sequence.peek()
    }

    /// Produces the datagram for `payload`.
    pub fn wrap(&self, payload: &[u8]) -> Vec<u8> {
        match self.variant {
            ViscaVariant::Loose => payload.to_vec(),
            ViscaVariant::Strict => encode_strict_frame(payload, self.sequence.next()),
        }
    }
}

/// Prepends the strict header for sequence number `sequence` to `payload`.
///
/// # Examples
///
/// ```rust
/// use camctl_core::protocol::framing::encode_strict_frame;
///
/// let frame = encode_strict_frame(&[0x81, 0x01, 0x04, 0x00, 0x02, 0xFF], 1);
/// assert_eq!(&frame[..8], &[0x01, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01]);
/// ```
pub fn encode_strict_frame(payload: &[u8], sequence: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(STRICT_HEADER_LEN + payload.len());
    buf.extend_from_slice(&COMMAND_PAYLOAD_TYPE);
    // Command payloads are at most 16 bytes; the length field is 16 bits wide.
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Parses the header of a strict datagram such as a camera acknowledgement.
///
/// # Errors
///
/// Returns [`FrameError`] if the buffer is shorter than the header or than
/// the payload length the header declares.
pub fn decode_strict_header(bytes: &[u8]) -> Result<StrictHeader, FrameError> {
    if bytes.len() < STRICT_HEADER_LEN {
        return Err(FrameError::InsufficientData {
            needed: STRICT_HEADER_LEN,
            available: bytes.len(),
        });
    }

    let payload_len = u16::from_be_bytes([bytes[2], bytes[3]]);
    let available = bytes.len() - STRICT_HEADER_LEN;
    if available < payload_len as usize {
        return Err(FrameError::PayloadLengthMismatch {
            declared: payload_len as usize,
            available,
        });
    }

    Ok(StrictHeader {
        payload_type: [bytes[0], bytes[1]],
        payload_len,
        sequence: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    })
}
