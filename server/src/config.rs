//! Server settings loaded from a JSON file at startup.
//!
//! A missing file is created with the defaults below; a present file is
//! parsed as-is, with absent keys falling back to their defaults.

use crate::error::RelayError;
use log::info;
use relay_shared::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "server_config.json";

/// Highest accepted reaper tick rate: one tick per millisecond.
pub const MAX_TICK_RATE: u32 = 1000;

const VALID_LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// UDP port to listen on
    pub server_port: u16,
    /// Connects beyond this many live sessions are dropped
    pub max_players: usize,
    /// Informational, shown in the startup log
    pub server_name: String,
    /// Log filter handed to the logger (trace, debug, info, warn, error)
    pub log_level: String,
    /// Reaper ticks per second
    pub tick_rate: u32,
    /// Seconds of silence before a session is reaped
    pub session_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            max_players: 32,
            server_name: "Space Relay Server".to_string(),
            log_level: "info".to_string(),
            tick_rate: 60,
            session_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, writing the defaults there first if the
    /// file does not exist. The flag is true when the file was created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), RelayError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let settings: Settings = serde_json::from_str(&content)?;
            Ok((settings, false))
        } else {
            let settings = Settings::default();
            settings.save(path)?;
            Ok((settings, true))
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RelayError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(RelayError::InvalidConfig(format!(
                "tick_rate must be between 1 and {}",
                MAX_TICK_RATE
            )));
        }
        if self.max_players == 0 {
            return Err(RelayError::InvalidConfig(
                "max_players must be at least 1".to_string(),
            ));
        }
        if self.session_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "session_timeout_secs must be at least 1".to_string(),
            ));
        }
        let level = self.log_level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(RelayError::InvalidConfig(format!(
                "invalid log level {:?}, expected one of {:?}",
                self.log_level, VALID_LOG_LEVELS
            )));
        }
        Ok(())
    }

    /// Period of the reaper loop, never shorter than one millisecond.
    pub fn tick_interval(&self) -> Duration {
        let rate = self.tick_rate.clamp(1, MAX_TICK_RATE);
        Duration::from_secs_f64(1.0 / rate as f64).max(Duration::from_millis(1))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// All interfaces on the configured port.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.server_port))
    }

    pub fn log_summary(&self) {
        info!(
            "Server: {} | Port: {} | Max Players: {} | Tick Rate: {} | Session Timeout: {}s",
            self.server_name,
            self.server_port,
            self.max_players,
            self.tick_rate,
            self.session_timeout_secs
        );
    }
}
