use crate::PacketType;
use thiserror::Error;

/// Errors produced while decoding datagrams off the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes were supplied than the packet's fixed layout requires.
    #[error("truncated packet: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The header's length field disagrees with the bytes actually received.
    #[error("length mismatch: header declares {declared} bytes, received {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    /// The header carries a type code outside the packet catalog.
    #[error("unknown packet type {0}")]
    UnknownPacketType(i32),

    /// A typed decode was asked for one packet but the header names another.
    #[error("expected {expected:?} packet, header says {found:?}")]
    UnexpectedPacketType {
        expected: PacketType,
        found: PacketType,
    },
}

impl CodecError {
    /// True for the undersized and length-mismatch cases.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            CodecError::Truncated { .. } | CodecError::LengthMismatch { .. }
        )
    }
}
