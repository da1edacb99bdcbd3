//! Authoritative store of ships and stations.
//!
//! The server does no simulation. It keeps the last pose each owner reported
//! so that late joiners can be told about every ship already in space.

use crate::error::RelayError;
use log::{debug, info};
use relay_shared::{CreateShip, CreateStar, Pose, NO_OWNER, SHIP_ID_LIMIT};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Stations are numbered from here so they never collide with ship IDs.
pub const STATION_ID_BASE: i32 = 2000;

/// Model of the unowned ship placed in space at startup.
pub const SEED_SHIP_MODEL: i32 = 22;

/// A ship in the shared world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity {
    pub ship_id: i32,
    pub model: i32,
    /// Client that may move this ship, or [`NO_OWNER`].
    pub owner_client_id: i32,
    pub pose: Pose,
}

impl Entity {
    /// True when `client_id` may move this ship. Unowned ships answer false
    /// for every caller, including one claiming the [`NO_OWNER`] ID.
    pub fn is_owned_by(&self, client_id: i32) -> bool {
        self.owner_client_id != NO_OWNER && self.owner_client_id == client_id
    }

    /// The CreateShip a client needs to spawn this ship at its last pose.
    pub fn to_create_packet(&self) -> CreateShip {
        CreateShip {
            ship_id: self.ship_id,
            model: self.model,
            owner: self.owner_client_id,
            pose: self.pose,
        }
    }
}

/// A static object created at startup and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub station_id: i32,
    pub model: i32,
    pub pos_x: i32,
    pub pos_y: i32,
    pub pos_z: i32,
    /// Only used in logs; the client never sees it.
    pub name: Option<String>,
}

impl Station {
    pub fn to_create_packet(&self) -> CreateStar {
        CreateStar {
            star_id: self.station_id,
            model: self.model,
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            pos_z: self.pos_z,
        }
    }
}

/// Result of applying a client's pose report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The ship exists but belongs to someone else; the store is unchanged.
    NotOwner,
    UnknownShip,
}

#[derive(Debug, Default)]
struct WorldInner {
    ships: BTreeMap<i32, Entity>,
    stations: BTreeMap<i32, Station>,
}

#[derive(Debug, Default)]
pub struct WorldState {
    inner: RwLock<WorldInner>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a new ship under the lowest unused ID with a zeroed pose.
    pub async fn create_ship(&self, model: i32, owner_client_id: i32) -> Result<i32, RelayError> {
        let mut inner = self.inner.write().await;
        let ship_id = lowest_free_id(&inner.ships).ok_or(RelayError::IdSpaceExhausted)?;
        inner.ships.insert(
            ship_id,
            Entity {
                ship_id,
                model,
                owner_client_id,
                pose: Pose::default(),
            },
        );
        debug!(
            target: "relay::world",
            "Created ship {} (model {}, owner {})",
            ship_id,
            model,
            owner_client_id
        );
        Ok(ship_id)
    }

    /// Removes a ship. Deleting an absent ship is a no-op.
    pub async fn delete_ship(&self, ship_id: i32) -> Option<Entity> {
        let removed = self.inner.write().await.ships.remove(&ship_id);
        if removed.is_some() {
            debug!(target: "relay::world", "Deleted ship {}", ship_id);
        }
        removed
    }

    /// Returns a copy of the ship, if it exists.
    ///
    /// The copy is detached from the store; later updates do not show up in it.
    pub async fn get_entity(&self, ship_id: i32) -> Option<Entity> {
        self.inner.read().await.ships.get(&ship_id).copied()
    }

    /// Stores `pose` only when `caller_client_id` owns the ship.
    pub async fn update_entity(
        &self,
        ship_id: i32,
        caller_client_id: i32,
        pose: Pose,
    ) -> UpdateOutcome {
        let mut inner = self.inner.write().await;
        match inner.ships.get_mut(&ship_id) {
            Some(entity) if entity.is_owned_by(caller_client_id) => {
                entity.pose = pose;
                UpdateOutcome::Applied
            }
            Some(_) => UpdateOutcome::NotOwner,
            None => UpdateOutcome::UnknownShip,
        }
    }

    /// Every ship, ordered by ID.
    pub async fn snapshot(&self) -> Vec<Entity> {
        self.inner.read().await.ships.values().copied().collect()
    }

    /// Number of ships, owned and unowned alike.
    pub async fn ship_count(&self) -> usize {
        self.inner.read().await.ships.len()
    }

    /// Adds a station under the next station ID.
    pub async fn create_station(
        &self,
        model: i32,
        position: (i32, i32, i32),
        name: Option<String>,
    ) -> i32 {
        let mut inner = self.inner.write().await;
        let station_id = inner
            .stations
            .keys()
            .next_back()
            .map_or(STATION_ID_BASE, |last| last + 1);
        let (pos_x, pos_y, pos_z) = position;
        inner.stations.insert(
            station_id,
            Station {
                station_id,
                model,
                pos_x,
                pos_y,
                pos_z,
                name,
            },
        );
        station_id
    }

    /// Every station, ordered by ID.
    pub async fn list_stations(&self) -> Vec<Station> {
        self.inner.read().await.stations.values().cloned().collect()
    }

    /// Fills every free ship ID with an unowned ship.
    #[cfg(test)]
    pub(crate) async fn occupy_every_ship_id(&self) {
        let mut inner = self.inner.write().await;
        for ship_id in 0..SHIP_ID_LIMIT {
            inner.ships.entry(ship_id).or_insert(Entity {
                ship_id,
                model: SEED_SHIP_MODEL,
                owner_client_id: NO_OWNER,
                pose: Pose::default(),
            });
        }
    }

    /// Populates an empty world: one unowned ship and four stations.
    pub async fn seed_defaults(&self) -> Result<(), RelayError> {
        let ship_id = self.create_ship(SEED_SHIP_MODEL, NO_OWNER).await?;
        info!("Seeded unowned ship {} (model {})", ship_id, SEED_SHIP_MODEL);

        let stations = [
            ("Central Station", 1, (0, 0, 0)),
            ("Trade Hub Alpha", 2, (100_000, 0, 0)),
            ("Mining Outpost", 3, (-100_000, 50_000, 0)),
            ("Research Station", 4, (0, -75_000, 25_000)),
        ];
        for (name, model, position) in stations {
            let station_id = self
                .create_station(model, position, Some(name.to_string()))
                .await;
            info!("Seeded station {} '{}' at {:?}", station_id, name, position);
        }
        Ok(())
    }
}

/// First gap in the ID sequence starting at zero, if any ID below the limit is free.
fn lowest_free_id(ships: &BTreeMap<i32, Entity>) -> Option<i32> {
    let mut candidate = 0;
    for &id in ships.keys() {
        if id != candidate {
            break;
        }
        candidate += 1;
    }
    (candidate < SHIP_ID_LIMIT).then_some(candidate)
}
