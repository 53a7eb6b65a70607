//! PTZ camera protocol: command encoding and transport framing.

pub mod framing;
pub mod sequence;
pub mod visca;

pub use framing::{decode_strict_header, FrameEncoder, FrameError, StrictHeader, ViscaVariant};
pub use sequence::SequenceCounter;
pub use visca::{encode_command, CodecError, MenuDirection, PtzCommand};
