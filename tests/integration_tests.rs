//! Integration tests for the relay server
//!
//! Each test starts a real server on a loopback port and drives it with plain
//! UDP sockets speaking the wire format, the way the game client does.

use relay_server::{Server, Settings, ShutdownHandle};
use relay_shared::{
    ChatMessage, Color, Connect, ConnectAcknowledge, CreateShip, DeleteShip, Disconnect, Packet,
    PlayerChatEnter, Pose, ShipUpdate, WirePacket, NO_OWNER,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    handle: JoinHandle<Result<(), relay_server::RelayError>>,
}

impl TestServer {
    async fn start(settings: Settings, seed: bool) -> Self {
        let server = assert_ok!(Server::bind_to("127.0.0.1:0".parse().unwrap(), &settings).await);
        if seed {
            assert_ok!(server.relay().world().seed_defaults().await);
        }
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(server.run());
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        let result = timeout(RECV_TIMEOUT, self.handle)
            .await
            .expect("server did not shut down")
            .unwrap();
        assert_ok!(result);
    }
}

struct GameClient {
    socket: UdpSocket,
    server: SocketAddr,
}

impl GameClient {
    async fn new(server: SocketAddr) -> Self {
        Self {
            socket: UdpSocket::bind("127.0.0.1:0").await.unwrap(),
            server,
        }
    }

    async fn send(&self, bytes: &[u8]) {
        self.socket.send_to(bytes, self.server).await.unwrap();
    }

    async fn recv_raw(&self) -> Vec<u8> {
        let mut buf = [0u8; 1024];
        let (len, _) = timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for a packet")
            .unwrap();
        buf[..len].to_vec()
    }

    async fn recv(&self) -> Packet {
        Packet::decode(&self.recv_raw().await).unwrap()
    }

    async fn expect_silence(&self) {
        let mut buf = [0u8; 1024];
        let result = timeout(SILENCE_WINDOW, self.socket.recv_from(&mut buf)).await;
        assert_err!(result, "unexpected packet from server");
    }

    /// Sends Connect and returns the ack plus every CreateShip/CreateStar that
    /// followed it.
    async fn join(&self, name: &str, model: i16) -> (ConnectAcknowledge, Vec<Packet>) {
        self.send(
            &Connect {
                model,
                name: name.to_string(),
            }
            .encode(),
        )
        .await;
        let ack = match self.recv().await {
            Packet::ConnectAcknowledge(ack) => ack,
            other => panic!("expected ConnectAcknowledge, got {:?}", other),
        };

        let mut world = Vec::new();
        let mut buf = [0u8; 1024];
        while let Ok(Ok((len, _))) = timeout(SILENCE_WINDOW, self.socket.recv_from(&mut buf)).await
        {
            world.push(Packet::decode(&buf[..len]).unwrap());
        }
        (ack, world)
    }
}

fn small_server(max_players: usize) -> Settings {
    Settings {
        max_players,
        ..Settings::default()
    }
}

/// JOIN FLOW TESTS
mod join_tests {
    use super::*;

    #[tokio::test]
    async fn first_player_gets_client_zero_and_the_seeded_world() {
        let server = TestServer::start(Settings::default(), true).await;
        let a = GameClient::new(server.addr).await;

        let (ack, world) = a.join("Alice", 5).await;
        assert_eq!(ack.client_id, 0);
        assert_eq!(ack.ship_id, 1);

        let ships: Vec<&CreateShip> = world
            .iter()
            .filter_map(|p| match p {
                Packet::CreateShip(ship) => Some(ship),
                _ => None,
            })
            .collect();
        assert_eq!(ships.len(), 1);
        assert_eq!(ships[0].ship_id, 0);
        assert_eq!(ships[0].model, 22);
        assert_eq!(ships[0].owner, NO_OWNER);

        let stations: Vec<i32> = world
            .iter()
            .filter_map(|p| match p {
                Packet::CreateStar(star) => Some(star.star_id),
                _ => None,
            })
            .collect();
        assert_eq!(stations, vec![2000, 2001, 2002, 2003]);

        server.stop().await;
    }

    #[tokio::test]
    async fn existing_players_learn_about_newcomer() {
        let server = TestServer::start(Settings::default(), false).await;
        let a = GameClient::new(server.addr).await;
        let b = GameClient::new(server.addr).await;

        let (ack_a, world_a) = a.join("A", 3).await;
        assert!(world_a.is_empty());

        let (ack_b, world_b) = b.join("B", 7).await;
        assert_eq!(ack_b.client_id, ack_a.client_id + 1);
        assert_eq!(
            world_b,
            vec![Packet::CreateShip(CreateShip {
                ship_id: ack_a.ship_id,
                model: 3,
                owner: ack_a.client_id,
                pose: Pose::default(),
            })]
        );

        assert_eq!(
            a.recv().await,
            Packet::CreateShip(CreateShip {
                ship_id: ack_b.ship_id,
                model: 7,
                owner: ack_b.client_id,
                pose: Pose::default(),
            })
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn connect_beyond_capacity_gets_no_reply() {
        let server = TestServer::start(small_server(2), false).await;
        let a = GameClient::new(server.addr).await;
        let b = GameClient::new(server.addr).await;
        let c = GameClient::new(server.addr).await;

        a.join("A", 1).await;
        b.join("B", 1).await;
        a.recv().await; // B's CreateShip

        c.send(
            &Connect {
                model: 1,
                name: "C".to_string(),
            }
            .encode(),
        )
        .await;
        c.expect_silence().await;
        a.expect_silence().await;
        b.expect_silence().await;

        server.stop().await;
    }

    #[tokio::test]
    async fn slot_frees_up_after_disconnect() {
        let server = TestServer::start(small_server(1), false).await;
        let a = GameClient::new(server.addr).await;
        let b = GameClient::new(server.addr).await;

        let (ack_a, _) = a.join("A", 1).await;
        a.send(&Disconnect.encode()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (ack_b, _) = b.join("B", 1).await;
        // Client IDs are never reused; the freed ship ID is.
        assert_eq!(ack_b.client_id, ack_a.client_id + 1);
        assert_eq!(ack_b.ship_id, ack_a.ship_id);

        server.stop().await;
    }
}

/// RELAY TESTS
mod relay_tests {
    use super::*;

    async fn two_players(
        server: &TestServer,
    ) -> (GameClient, ConnectAcknowledge, GameClient, ConnectAcknowledge) {
        let a = GameClient::new(server.addr).await;
        let b = GameClient::new(server.addr).await;
        let (ack_a, _) = a.join("A", 1).await;
        let (ack_b, _) = b.join("B", 2).await;
        a.recv().await; // B's CreateShip
        (a, ack_a, b, ack_b)
    }

    #[tokio::test]
    async fn ship_update_reaches_others_verbatim() {
        let server = TestServer::start(Settings::default(), false).await;
        let (a, ack_a, b, _) = two_players(&server).await;

        let update = ShipUpdate {
            ship_id: ack_a.ship_id,
            pose: Pose {
                pos_x: 1000,
                rot_w: 65536,
                look_at_z: -5,
                ..Pose::default()
            },
        }
        .encode();
        a.send(&update).await;

        assert_eq!(b.recv_raw().await, update.to_vec());
        a.expect_silence().await;

        server.stop().await;
    }

    #[tokio::test]
    async fn stored_pose_only_changes_for_owner() {
        let server = TestServer::start(Settings::default(), false).await;
        let (a, ack_a, b, ack_b) = two_players(&server).await;

        // A reports a pose for B's ship: relayed, but not stored.
        let spoofed = ShipUpdate {
            ship_id: ack_b.ship_id,
            pose: Pose::at(9, 9, 9),
        }
        .encode();
        a.send(&spoofed).await;
        assert_eq!(b.recv_raw().await, spoofed.to_vec());

        // A moves its own ship: stored.
        let own = ShipUpdate {
            ship_id: ack_a.ship_id,
            pose: Pose::at(1, 2, 3),
        }
        .encode();
        a.send(&own).await;
        assert_eq!(b.recv_raw().await, own.to_vec());

        // A late joiner sees what was stored.
        let c = GameClient::new(server.addr).await;
        let (_, world) = c.join("C", 1).await;
        let pose_of = |ship_id: i32| {
            world.iter().find_map(|p| match p {
                Packet::CreateShip(ship) if ship.ship_id == ship_id => Some(ship.pose),
                _ => None,
            })
        };
        assert_eq!(pose_of(ack_a.ship_id), Some(Pose::at(1, 2, 3)));
        assert_eq!(pose_of(ack_b.ship_id), Some(Pose::default()));

        server.stop().await;
    }

    #[tokio::test]
    async fn chat_goes_to_everyone_including_sender() {
        let server = TestServer::start(Settings::default(), false).await;
        let (a, _, b, _) = two_players(&server).await;

        let chat = ChatMessage {
            color: Color {
                a: 255,
                r: 0,
                g: 200,
                b: 0,
            },
            message: "gg".to_string(),
        }
        .encode();
        b.send(&chat).await;
        assert_eq!(a.recv_raw().await, chat.to_vec());
        assert_eq!(b.recv_raw().await, chat.to_vec());

        let typed = PlayerChatEnter {
            message: "hello all".to_string(),
        }
        .encode();
        a.send(&typed).await;
        assert_eq!(a.recv_raw().await, typed.to_vec());
        assert_eq!(b.recv_raw().await, typed.to_vec());

        server.stop().await;
    }

    #[tokio::test]
    async fn disconnect_deletes_ship_for_remaining_players() {
        let server = TestServer::start(Settings::default(), false).await;
        let (a, ack_a, b, _) = two_players(&server).await;

        a.send(&Disconnect.encode()).await;
        assert_eq!(
            b.recv().await,
            Packet::DeleteShip(DeleteShip {
                ship_id: ack_a.ship_id
            })
        );

        // A no longer has a session, so its updates go nowhere.
        a.send(
            &ShipUpdate {
                ship_id: ack_a.ship_id,
                pose: Pose::at(1, 1, 1),
            }
            .encode(),
        )
        .await;
        b.expect_silence().await;

        server.stop().await;
    }

    #[tokio::test]
    async fn malformed_datagrams_are_ignored() {
        let server = TestServer::start(Settings::default(), false).await;
        let (a, ack_a, b, _) = two_players(&server).await;

        // Too short for a header.
        a.send(&[4, 0, 0]).await;
        // Length field disagrees with the datagram.
        let mut update = ShipUpdate {
            ship_id: ack_a.ship_id,
            pose: Pose::at(1, 1, 1),
        }
        .encode()
        .to_vec();
        update.truncate(30);
        a.send(&update).await;
        // Unknown type code.
        a.send(&[99, 0, 0, 0, 8, 0, 0, 0]).await;

        b.expect_silence().await;
        a.expect_silence().await;

        // The server is still serving.
        let chat = PlayerChatEnter {
            message: "still here".to_string(),
        }
        .encode();
        a.send(&chat).await;
        assert_eq!(b.recv_raw().await, chat.to_vec());

        server.stop().await;
    }
}

/// TIMEOUT TESTS
mod timeout_tests {
    use super::*;

    #[tokio::test]
    async fn silent_player_is_reaped() {
        let settings = Settings {
            session_timeout_secs: 1,
            tick_rate: 20,
            ..Settings::default()
        };
        let server = TestServer::start(settings, false).await;
        let a = GameClient::new(server.addr).await;
        let b = GameClient::new(server.addr).await;
        let (ack_a, _) = a.join("A", 1).await;
        b.join("B", 1).await;
        a.recv().await;

        // B keeps talking; A goes quiet.
        let keepalive = PlayerChatEnter {
            message: "ping".to_string(),
        }
        .encode();
        let mut deleted = None;
        for _ in 0..10 {
            b.send(&keepalive).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            let mut buf = [0u8; 1024];
            while let Ok(Ok((len, _))) =
                timeout(Duration::from_millis(10), b.socket.recv_from(&mut buf)).await
            {
                if let Ok(Packet::DeleteShip(delete)) = Packet::decode(&buf[..len]) {
                    deleted = Some(delete.ship_id);
                }
            }
            if deleted.is_some() {
                break;
            }
        }
        assert_eq!(deleted, Some(ack_a.ship_id));

        server.stop().await;
    }
}
