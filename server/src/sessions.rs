//! Session tracking for connected clients
//!
//! A session binds one network address to the client ID and ship the server
//! handed out on Connect. Sessions are keyed by address because the native
//! client never repeats its ID in later packets; the sender address is the
//! only identity a datagram carries.

use crate::error::RelayError;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// First client ID handed out after startup.
pub const CLIENT_ID_BASE: i32 = 0;

/// A connected client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub addr: SocketAddr,
    pub client_id: i32,
    /// The ship created for this client on Connect
    pub ship_id: i32,
    /// Player name from the Connect packet
    pub name: String,
    /// Last time any packet arrived from this address
    pub last_seen: Instant,
}

impl Session {
    /// A session heard from just now.
    pub fn new(addr: SocketAddr, client_id: i32, ship_id: i32, name: String) -> Self {
        Self {
            addr,
            client_id,
            ship_id,
            name,
            last_seen: Instant::now(),
        }
    }

    /// True once `timeout` or more has passed since the last packet.
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= timeout
    }
}

/// Hands out client IDs. IDs are never reused while the process lives.
#[derive(Debug)]
pub struct ClientIdAllocator {
    next: AtomicI32,
}

impl ClientIdAllocator {
    pub fn new(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    /// Returns the current ID and advances the counter.
    pub fn next_id(&self) -> i32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for ClientIdAllocator {
    fn default() -> Self {
        Self::new(CLIENT_ID_BASE)
    }
}

/// A player slot held for `addr` while its Connect is being processed.
///
/// Counts against the player limit until it is either completed into a
/// session or released. Returned by [`SessionRegistry::reserve`].
#[derive(Debug)]
#[must_use = "a reservation holds a player slot until completed or released"]
pub struct SlotReservation {
    addr: SocketAddr,
}

impl SlotReservation {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: HashMap<SocketAddr, Session>,
    /// Addresses holding a slot whose session is not registered yet
    pending: HashSet<SocketAddr>,
}

impl RegistryInner {
    fn occupied(&self) -> usize {
        self.sessions.len() + self.pending.len()
    }
}

/// All live sessions, bounded by the configured player limit.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    max_sessions: usize,
    client_ids: ClientIdAllocator,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            max_sessions,
            client_ids: ClientIdAllocator::default(),
        }
    }

    /// The player limit this registry was built with.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Hands out the next client ID. IDs are never reused.
    pub fn allocate_client_id(&self) -> i32 {
        self.client_ids.next_id()
    }

    /// Claims a player slot for `addr` ahead of creating its ship.
    ///
    /// The capacity check and the claim happen under one lock, so two
    /// Connects racing for the last slot cannot both get past this point.
    /// Fails when the registry is full or the address already has a session
    /// or a pending slot.
    pub async fn reserve(&self, addr: SocketAddr) -> Result<SlotReservation, RelayError> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&addr) || inner.pending.contains(&addr) {
            return Err(RelayError::AddressInUse(addr));
        }
        if inner.occupied() >= self.max_sessions {
            return Err(RelayError::SessionRegistryFull {
                max: self.max_sessions,
            });
        }
        inner.pending.insert(addr);
        Ok(SlotReservation { addr })
    }

    /// Turns a reservation into a live session.
    pub async fn complete(
        &self,
        reservation: SlotReservation,
        client_id: i32,
        ship_id: i32,
        name: String,
    ) -> Session {
        let addr = reservation.addr;
        let mut inner = self.inner.write().await;
        inner.pending.remove(&addr);
        let session = Session::new(addr, client_id, ship_id, name);
        inner.sessions.insert(addr, session.clone());
        debug!(
            target: "relay::sessions",
            "Registered client {} at {} ({} live)",
            client_id,
            addr,
            inner.sessions.len()
        );
        session
    }

    /// Gives a reserved slot back without registering a session.
    pub async fn release(&self, reservation: SlotReservation) {
        self.inner.write().await.pending.remove(&reservation.addr);
    }

    /// Adds a session for `addr` in one step.
    ///
    /// Fails when the registry is full or the address already has a session.
    pub async fn register(
        &self,
        addr: SocketAddr,
        client_id: i32,
        ship_id: i32,
        name: String,
    ) -> Result<Session, RelayError> {
        let reservation = self.reserve(addr).await?;
        Ok(self.complete(reservation, client_id, ship_id, name).await)
    }

    /// Returns a copy of the session for `addr`, if one is registered.
    ///
    /// Does not count as activity; use [`touch`](Self::touch) for that.
    pub async fn lookup(&self, addr: SocketAddr) -> Option<Session> {
        self.inner.read().await.sessions.get(&addr).cloned()
    }

    /// Marks `addr` as heard from just now. Returns false for unknown addresses.
    pub async fn touch(&self, addr: SocketAddr) -> bool {
        match self.inner.write().await.sessions.get_mut(&addr) {
            Some(session) => {
                session.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes and returns the session for `addr`.
    ///
    /// The caller is responsible for the session's ship; the registry only
    /// forgets the address.
    pub async fn remove(&self, addr: SocketAddr) -> Option<Session> {
        self.inner.write().await.sessions.remove(&addr)
    }

    /// Removes the session only if it is still timed out at `now`.
    ///
    /// Closes the gap between listing stale sessions and removing them, in
    /// which a packet may have refreshed one.
    pub async fn remove_if_stale(
        &self,
        addr: SocketAddr,
        now: Instant,
        timeout: Duration,
    ) -> Option<Session> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get(&addr) {
            Some(session) if session.is_timed_out(now, timeout) => inner.sessions.remove(&addr),
            _ => None,
        }
    }

    /// Sessions silent for `timeout` or longer, ordered by client ID.
    pub async fn list_stale(&self, now: Instant, timeout: Duration) -> Vec<Session> {
        let mut stale: Vec<Session> = self
            .inner
            .read()
            .await
            .sessions
            .values()
            .filter(|session| session.is_timed_out(now, timeout))
            .cloned()
            .collect();
        stale.sort_by_key(|session| session.client_id);
        stale
    }

    /// All sessions, ordered by client ID.
    ///
    /// Broadcasts go to this list; slots that are only reserved are left out.
    pub async fn snapshot(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.inner.read().await.sessions.values().cloned().collect();
        all.sort_by_key(|session| session.client_id);
        all
    }

    /// Number of registered sessions, not counting reserved slots.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// True when no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// True when no slot is left, counting reservations still in progress.
    pub async fn is_full(&self) -> bool {
        self.inner.read().await.occupied() >= self.max_sessions
    }
}
