//! Packet routing and the per-type handlers.
//!
//! [`Relay`] owns the world store, the session registry and the broadcaster.
//! Every received datagram goes through [`Relay::handle_datagram`], which
//! validates the header, routes on the packet type and logs whatever error
//! the handler returns. Nothing a client sends can stop the server.

use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::error::RelayError;
use crate::sessions::{Session, SessionRegistry};
use crate::stats::RelayStats;
use crate::world::{UpdateOutcome, WorldState};
use log::{debug, info, trace, warn};
use relay_shared::{
    ChatMessage, Color, Connect, ConnectAcknowledge, DeleteShip, PacketHeader, PacketType,
    PlayerChatEnter, ShipUpdate, WirePacket, HEADER_SIZE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Shared server state plus the packet handlers.
#[derive(Debug)]
pub struct Relay {
    world: WorldState,
    sessions: SessionRegistry,
    broadcaster: Broadcaster,
    stats: Arc<RelayStats>,
    session_timeout: Duration,
}

impl Relay {
    /// Builds an empty relay that sends through `socket`.
    pub fn new(socket: Arc<UdpSocket>, settings: &Settings) -> Self {
        let stats = Arc::new(RelayStats::new());
        Self {
            world: WorldState::new(),
            sessions: SessionRegistry::new(settings.max_players),
            broadcaster: Broadcaster::new(socket, Arc::clone(&stats)),
            stats,
            session_timeout: settings.session_timeout(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Entry point for one received datagram. Errors are logged, never returned.
    pub async fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) {
        self.stats.record_received();
        if let Err(e) = self.dispatch(datagram, from).await {
            self.stats.record_dropped();
            match &e {
                RelayError::Codec(codec) if codec.is_malformed() => {
                    warn!(target: "relay::dispatch", "Malformed packet from {}: {}", from, e);
                }
                _ if e.is_quiet() => {
                    debug!(target: "relay::dispatch", "Dropped packet from {}: {}", from, e);
                }
                _ => {
                    warn!(target: "relay::dispatch", "Dropped packet from {}: {}", from, e);
                }
            }
        }
    }

    /// Validates and routes one datagram.
    pub async fn dispatch(&self, datagram: &[u8], from: SocketAddr) -> Result<(), RelayError> {
        let header = PacketHeader::decode(datagram)?;
        let packet_type = header.validate(datagram.len())?;
        let body = &datagram[HEADER_SIZE..];
        trace!(
            target: "relay::dispatch",
            "{:?} ({} bytes) from {}",
            packet_type,
            datagram.len(),
            from
        );

        match packet_type {
            PacketType::Connect => self.handle_connect(Connect::decode_body(body)?, from).await,
            PacketType::ShipUpdate => {
                self.handle_ship_update(ShipUpdate::decode_body(body)?, datagram, from)
                    .await
            }
            PacketType::ChatMessage | PacketType::PlayerChatEnter => {
                self.handle_chat(packet_type, body, datagram, from).await
            }
            PacketType::DeleteShip => {
                self.handle_delete_ship(DeleteShip::decode_body(body)?, from)
                    .await
            }
            PacketType::Disconnect => self.handle_disconnect(from).await,
            PacketType::ConnectAcknowledge | PacketType::CreateShip | PacketType::CreateStar => {
                Err(RelayError::UnhandledPacketType(packet_type))
            }
        }
    }

    async fn handle_connect(&self, connect: Connect, from: SocketAddr) -> Result<(), RelayError> {
        if let Some(previous) = self.sessions.remove(from).await {
            info!(
                "Player {} (client {}) reconnecting from {}, dropping old ship {}",
                previous.name, previous.client_id, from, previous.ship_id
            );
            self.retire_ship(previous.ship_id).await;
        }

        // A slot is held before any ship exists for it.
        let reservation = self.sessions.reserve(from).await?;

        let client_id = self.sessions.allocate_client_id();
        let model = i32::from(connect.model);
        let ship_id = match self.world.create_ship(model, client_id).await {
            Ok(ship_id) => ship_id,
            Err(e) => {
                self.sessions.release(reservation).await;
                return Err(e);
            }
        };
        let session = self
            .sessions
            .complete(reservation, client_id, ship_id, connect.name)
            .await;

        info!(
            "Player {} connected from {} as client {} with ship {} (model {})",
            session.name, from, client_id, ship_id, model
        );

        let ack = ConnectAcknowledge { client_id, ship_id }.encode();
        self.broadcaster.send_to_one(&ack, from).await;

        if let Some(entity) = self.world.get_entity(ship_id).await {
            let created = entity.to_create_packet().encode();
            let others = self.sessions.snapshot().await;
            self.broadcaster
                .send_to_all_except(&created, &others, from)
                .await;
        }

        self.send_world_to(&session).await;
        Ok(())
    }

    /// Tells a newcomer about every other ship and every station.
    async fn send_world_to(&self, session: &Session) {
        for entity in self.world.snapshot().await {
            if entity.ship_id == session.ship_id {
                continue;
            }
            let packet = entity.to_create_packet().encode();
            self.broadcaster.send_to_one(&packet, session.addr).await;
        }
        for station in self.world.list_stations().await {
            let packet = station.to_create_packet().encode();
            self.broadcaster.send_to_one(&packet, session.addr).await;
        }
    }

    /// Stores the pose if the sender owns the ship, then relays the raw
    /// datagram to everyone else either way.
    async fn handle_ship_update(
        &self,
        update: ShipUpdate,
        datagram: &[u8],
        from: SocketAddr,
    ) -> Result<(), RelayError> {
        let session = self.require_session(from).await?;

        match self
            .world
            .update_entity(update.ship_id, session.client_id, update.pose)
            .await
        {
            UpdateOutcome::Applied => {}
            UpdateOutcome::NotOwner => {
                debug!(
                    target: "relay::dispatch",
                    "Client {} sent an update for ship {} it does not own",
                    session.client_id, update.ship_id
                );
            }
            UpdateOutcome::UnknownShip => {
                debug!(
                    target: "relay::dispatch",
                    "Client {} sent an update for unknown ship {}",
                    session.client_id, update.ship_id
                );
            }
        }

        let sessions = self.sessions.snapshot().await;
        self.broadcaster
            .send_to_all_except(datagram, &sessions, from)
            .await;
        Ok(())
    }

    /// Relays chat verbatim to every session, the sender included.
    async fn handle_chat(
        &self,
        packet_type: PacketType,
        body: &[u8],
        datagram: &[u8],
        from: SocketAddr,
    ) -> Result<(), RelayError> {
        let session = self.require_session(from).await?;

        let text = if packet_type == PacketType::ChatMessage {
            ChatMessage::decode_body(body)?.message
        } else {
            PlayerChatEnter::decode_body(body)?.message
        };
        info!(target: "relay::chat", "{}: {}", session.name, text);

        let sessions = self.sessions.snapshot().await;
        self.broadcaster.send_to_all(datagram, &sessions).await;
        Ok(())
    }

    /// Removes the named ship and tells every session. Any sender may do this.
    async fn handle_delete_ship(
        &self,
        delete: DeleteShip,
        from: SocketAddr,
    ) -> Result<(), RelayError> {
        self.sessions.touch(from).await;
        if self.world.delete_ship(delete.ship_id).await.is_none() {
            debug!(
                target: "relay::dispatch",
                "DeleteShip for absent ship {} from {}",
                delete.ship_id,
                from
            );
        }
        let sessions = self.sessions.snapshot().await;
        self.broadcaster
            .send_to_all(&delete.encode(), &sessions)
            .await;
        Ok(())
    }

    async fn handle_disconnect(&self, from: SocketAddr) -> Result<(), RelayError> {
        let session = self
            .sessions
            .remove(from)
            .await
            .ok_or(RelayError::UnknownSession(from))?;
        info!(
            "Player {} (client {}) disconnected from {}",
            session.name, session.client_id, from
        );
        self.retire_ship(session.ship_id).await;
        Ok(())
    }

    /// Deletes a departed session's ship and tells the remaining sessions.
    pub(crate) async fn retire_ship(&self, ship_id: i32) {
        self.world.delete_ship(ship_id).await;
        let remaining = self.sessions.snapshot().await;
        self.broadcaster
            .send_to_all(&DeleteShip { ship_id }.encode(), &remaining)
            .await;
    }

    /// Looks up the sender's session and refreshes its activity time.
    async fn require_session(&self, from: SocketAddr) -> Result<Session, RelayError> {
        let session = self
            .sessions
            .lookup(from)
            .await
            .ok_or(RelayError::UnknownSession(from))?;
        self.sessions.touch(from).await;
        Ok(session)
    }

    /// Broadcasts a white "Server: ..." chat line. Returns the number of recipients.
    pub async fn announce(&self, text: &str) -> usize {
        let packet = ChatMessage {
            color: Color::WHITE,
            message: format!("Server: {}", text),
        }
        .encode();
        let sessions = self.sessions.snapshot().await;
        info!(target: "relay::chat", "Server: {}", text);
        self.broadcaster.send_to_all(&packet, &sessions).await
    }
}
