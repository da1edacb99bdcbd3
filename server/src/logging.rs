//! Logger setup.
//!
//! The configured level is the default filter; `RUST_LOG` overrides it when
//! set. Components log under `relay::<component>` targets, so e.g.
//! `RUST_LOG=info,relay::dispatch=trace` traces routing alone.

use log::SetLoggerError;

pub fn init_logging(level: &str) -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init()
}
