//! Loopback sockets and a relay wired to them, for unit tests.

use crate::config::Settings;
use crate::dispatch::Relay;
use relay_shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_millis(500);
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// A relay whose outgoing socket is bound to loopback.
pub(crate) async fn test_relay(max_players: usize) -> Relay {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let settings = Settings {
        max_players,
        ..Settings::default()
    };
    Relay::new(Arc::new(socket), &settings)
}

/// A fake game client on its own loopback port.
pub(crate) struct TestClient {
    socket: UdpSocket,
}

impl TestClient {
    pub(crate) async fn bind() -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub(crate) async fn recv_raw(&self) -> Vec<u8> {
        let mut buf = [0u8; 1024];
        let (len, _) = timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for a packet")
            .unwrap();
        buf[..len].to_vec()
    }

    pub(crate) async fn recv_packet(&self) -> Packet {
        Packet::decode(&self.recv_raw().await).unwrap()
    }

    /// Panics if anything arrives within a short window.
    pub(crate) async fn expect_silence(&self) {
        let mut buf = [0u8; 1024];
        if let Ok(Ok((len, _))) = timeout(SILENCE_WINDOW, self.socket.recv_from(&mut buf)).await {
            panic!("expected no packet, got {:?}", Packet::decode(&buf[..len]));
        }
    }
}
