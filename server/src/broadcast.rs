//! Fan-out of encoded packets to session addresses.
//!
//! A failed send to one destination is logged and skipped; the remaining
//! destinations are still attempted.

use crate::sessions::Session;
use crate::stats::RelayStats;
use log::{error, trace};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct Broadcaster {
    socket: Arc<UdpSocket>,
    stats: Arc<RelayStats>,
}

impl Broadcaster {
    pub fn new(socket: Arc<UdpSocket>, stats: Arc<RelayStats>) -> Self {
        Self { socket, stats }
    }

    /// Sends `bytes` to one address. Returns whether the send succeeded.
    pub async fn send_to_one(&self, bytes: &[u8], addr: SocketAddr) -> bool {
        match self.socket.send_to(bytes, addr).await {
            Ok(_) => {
                self.stats.record_sent();
                trace!(target: "relay::broadcast", "Sent {} bytes to {}", bytes.len(), addr);
                true
            }
            Err(e) => {
                self.stats.record_send_failure();
                error!(target: "relay::broadcast", "Failed to send to {}: {}", addr, e);
                false
            }
        }
    }

    /// Sends `bytes` to every session. Returns the number of successful sends.
    pub async fn send_to_all(&self, bytes: &[u8], sessions: &[Session]) -> usize {
        self.fan_out(bytes, sessions, None).await
    }

    /// Sends `bytes` to every session except the one at `excluded`.
    pub async fn send_to_all_except(
        &self,
        bytes: &[u8],
        sessions: &[Session],
        excluded: SocketAddr,
    ) -> usize {
        self.fan_out(bytes, sessions, Some(excluded)).await
    }

    async fn fan_out(
        &self,
        bytes: &[u8],
        sessions: &[Session],
        excluded: Option<SocketAddr>,
    ) -> usize {
        let mut delivered = 0;
        for session in sessions {
            if Some(session.addr) == excluded {
                continue;
            }
            if self.send_to_one(bytes, session.addr).await {
                delivered += 1;
            }
        }
        delivered
    }
}
