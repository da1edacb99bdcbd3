//! Periodic removal of silent sessions.

use crate::dispatch::Relay;
use crate::sessions::Session;
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

impl Relay {
    /// Removes every session silent for the configured timeout as of `now`,
    /// deleting each one's ship and telling the remaining sessions.
    pub async fn reap_stale_sessions(&self, now: Instant) -> Vec<Session> {
        let timeout = self.session_timeout();
        let stale = self.sessions().list_stale(now, timeout).await;
        let mut reaped = Vec::with_capacity(stale.len());

        for candidate in stale {
            let Some(session) = self
                .sessions()
                .remove_if_stale(candidate.addr, now, timeout)
                .await
            else {
                continue;
            };
            info!(
                target: "relay::reaper",
                "Player {} (client {}) at {} timed out",
                session.name, session.client_id, session.addr
            );
            self.retire_ship(session.ship_id).await;
            reaped.push(session);
        }

        reaped
    }
}

/// Runs the reaper every `period` until a shutdown signal arrives.
pub async fn run_reaper(
    relay: Arc<Relay>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                relay.reap_stale_sessions(Instant::now()).await;
            }
            _ = shutdown.recv() => {
                debug!(target: "relay::reaper", "Reaper stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_relay, TestClient};
    use relay_shared::{Connect, DeleteShip, Packet, WirePacket};

    async fn connect(relay: &Relay, client: &TestClient, name: &str) {
        let packet = Connect {
            model: 1,
            name: name.to_string(),
        }
        .encode();
        relay.dispatch(&packet, client.addr()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fresh_sessions_survive() {
        let relay = test_relay(4).await;
        let a = TestClient::bind().await;
        connect(&relay, &a, "A").await;

        let reaped = relay.reap_stale_sessions(Instant::now()).await;
        assert!(reaped.is_empty());
        assert_eq!(relay.sessions().len().await, 1);
    }

    #[tokio::test]
    async fn test_silent_session_is_reaped() {
        let relay = test_relay(4).await;
        let a = TestClient::bind().await;
        let b = TestClient::bind().await;
        connect(&relay, &a, "A").await;
        connect(&relay, &b, "B").await;
        let a_ship = relay.sessions().lookup(a.addr()).await.unwrap().ship_id;

        // Drain A's ack and B's CreateShip, then B's ack and A's CreateShip.
        a.recv_raw().await;
        a.recv_raw().await;
        b.recv_raw().await;
        b.recv_raw().await;

        // A stays silent past the cutoff; B is heard from after it.
        let later = Instant::now() + relay.session_timeout();
        tokio::time::sleep(Duration::from_millis(5)).await;
        relay.sessions().touch(b.addr()).await;

        let reaped = relay.reap_stale_sessions(later).await;
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].name, "A");
        assert!(relay.sessions().lookup(a.addr()).await.is_none());
        assert!(relay.sessions().lookup(b.addr()).await.is_some());
        assert!(relay.world().get_entity(a_ship).await.is_none());

        assert_eq!(
            b.recv_packet().await,
            Packet::DeleteShip(DeleteShip { ship_id: a_ship })
        );
        a.expect_silence().await;
    }

    #[tokio::test]
    async fn test_reaper_stops_on_shutdown() {
        let relay = Arc::new(test_relay(4).await);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_reaper(relay, Duration::from_millis(10), rx));

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
