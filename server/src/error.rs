//! Error types for the relay server.
//!
//! Per-packet errors are logged and the packet dropped; none of them stop the
//! server. Only configuration and socket binding failures escape to `main`.

use relay_shared::{CodecError, PacketType};
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Undersized, length-mismatched or unknown-type datagram.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A packet that needs a session came from an address without one.
    #[error("no session registered for {0}")]
    UnknownSession(SocketAddr),

    /// Connect refused because the registry holds `max` sessions already.
    #[error("session registry full ({max} sessions)")]
    SessionRegistryFull { max: usize },

    /// A session for this address exists already.
    #[error("address {0} already has a session")]
    AddressInUse(SocketAddr),

    /// All ship IDs are taken.
    #[error("ship id space exhausted")]
    IdSpaceExhausted,

    /// A valid packet type that only the server sends.
    #[error("{0:?} packets are not accepted from clients")]
    UnhandledPacketType(PacketType),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Drops that are part of normal operation and only worth a debug line.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self,
            RelayError::SessionRegistryFull { .. } | RelayError::IdSpaceExhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_convert() {
        let err: RelayError = CodecError::UnknownPacketType(99).into();
        assert!(matches!(
            err,
            RelayError::Codec(CodecError::UnknownPacketType(99))
        ));
        assert_eq!(err.to_string(), "unknown packet type 99");
    }

    #[test]
    fn test_quiet_errors() {
        assert!(RelayError::SessionRegistryFull { max: 4 }.is_quiet());
        assert!(RelayError::IdSpaceExhausted.is_quiet());
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert!(!RelayError::UnknownSession(addr).is_quiet());
    }
}
