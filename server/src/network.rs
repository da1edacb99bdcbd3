//! UDP socket ownership and the receive loop

use crate::config::Settings;
use crate::dispatch::Relay;
use crate::error::RelayError;
use crate::reaper::run_reaper;
use bytes::Bytes;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

/// Receive buffer size. Larger datagrams arrive truncated and fail the
/// length check.
const RECV_BUFFER_SIZE: usize = 4096;

/// Cloneable handle that stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        // No receivers means the server already stopped.
        let _ = self.tx.send(());
    }
}

/// Owns the socket and runs the receiver and reaper tasks
pub struct Server {
    socket: Arc<UdpSocket>,
    relay: Arc<Relay>,
    tick_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    // Subscribed at bind time so a trigger before `run` is not missed.
    receiver_shutdown: broadcast::Receiver<()>,
    reaper_shutdown: broadcast::Receiver<()>,
}

impl Server {
    /// Binds all interfaces on the configured port.
    pub async fn bind(settings: &Settings) -> Result<Self, RelayError> {
        Self::bind_to(settings.bind_addr(), settings).await
    }

    /// Binds a specific address; tests use port 0 on loopback.
    pub async fn bind_to(addr: SocketAddr, settings: &Settings) -> Result<Self, RelayError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let relay = Arc::new(Relay::new(Arc::clone(&socket), settings));
        let (shutdown_tx, receiver_shutdown) = broadcast::channel(1);
        let reaper_shutdown = shutdown_tx.subscribe();

        Ok(Self {
            socket,
            relay,
            tick_interval: settings.tick_interval(),
            shutdown_tx,
            receiver_shutdown,
            reaper_shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Receives until shut down. Each datagram is handled on its own task so
    /// a slow fan-out never holds up the socket.
    pub async fn run(self) -> Result<(), RelayError> {
        let Server {
            socket,
            relay,
            tick_interval,
            shutdown_tx: _shutdown_tx,
            mut receiver_shutdown,
            reaper_shutdown,
        } = self;

        let reaper = tokio::spawn(run_reaper(
            Arc::clone(&relay),
            tick_interval,
            reaper_shutdown,
        ));

        info!("Server started successfully");
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buffer) => {
                    match received {
                        Ok((len, addr)) => {
                            let datagram = Bytes::copy_from_slice(&buffer[..len]);
                            let relay = Arc::clone(&relay);
                            tokio::spawn(async move {
                                relay.handle_datagram(&datagram, addr).await;
                            });
                        }
                        Err(e) => {
                            // Errors such as ICMP port unreachable surface here; keep going.
                            error!("Error receiving packet: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }
                _ = receiver_shutdown.recv() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        if let Err(e) = reaper.await {
            error!("Reaper task failed: {}", e);
        }
        relay.stats().log_summary();
        Ok(())
    }
}
