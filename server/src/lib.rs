//! # Space Relay Server
//!
//! UDP relay that lets several copies of the space-sim client share one
//! universe. The server runs no simulation: it hands out identities, keeps
//! the last reported pose of every ship and forwards what clients send.
//!
//! ## Responsibilities
//!
//! ### Joining
//! A Connect packet gets a fresh client ID and a newly created ship. The
//! newcomer receives an acknowledgement plus one CreateShip per existing ship
//! and one CreateStar per station. Everyone else is told about the new ship.
//!
//! ### Relaying
//! Ship updates go to every session except the sender and are stored only
//! when the sender owns the ship. Chat goes to every session, the sender
//! included. Both are forwarded byte for byte.
//!
//! ### Leaving
//! An explicit Disconnect, a repeated Connect from the same address or 30
//! seconds of silence ends a session. Its ship is deleted and the remaining
//! sessions receive a DeleteShip.
//!
//! ## Module Organization
//!
//! - `config`: JSON settings file, created with defaults when missing
//! - `world`: ships and stations
//! - `sessions`: address-keyed session registry and client ID allocation
//! - `dispatch`: header validation, routing and the packet handlers
//! - `broadcast`: fan-out to session addresses
//! - `reaper`: periodic timeout sweep
//! - `network`: socket ownership, receive loop and shutdown
//! - `console`: operator commands from stdin
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use relay_server::{Server, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let server = Server::bind(&settings).await?;
//!     server.relay().world().seed_defaults().await?;
//!
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.trigger();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod network;
pub mod reaper;
pub mod sessions;
pub mod stats;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Settings;
pub use dispatch::Relay;
pub use error::RelayError;
pub use network::{Server, ShutdownHandle};
