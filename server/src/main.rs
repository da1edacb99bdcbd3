use clap::Parser;
use log::{error, info};
use relay_server::config::DEFAULT_CONFIG_PATH;
use relay_server::console::{run_console, spawn_stdin_reader};
use relay_server::logging::init_logging;
use relay_server::{Server, Settings};
use std::path::PathBuf;

/// UDP relay server for the multiplayer space-sim mod
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON settings file; created with defaults if missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to listen on, overriding the settings file
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum concurrent players, overriding the settings file
    #[arg(short, long)]
    max_players: Option<usize>,

    /// Log level, overriding the settings file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Do not read operator commands from stdin
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (mut settings, created) = Settings::load_or_create(&args.config)?;
    if let Some(port) = args.port {
        settings.server_port = port;
    }
    if let Some(max_players) = args.max_players {
        settings.max_players = max_players;
    }
    if let Some(level) = args.log_level {
        settings.log_level = level;
    }
    settings.validate()?;

    init_logging(&settings.log_level)?;
    if created {
        info!("Created default settings at {}", args.config.display());
    }
    settings.log_summary();

    let server = Server::bind(&settings).await?;
    let relay = server.relay();
    relay.world().seed_defaults().await?;

    let shutdown = server.shutdown_handle();
    if !args.no_console {
        let lines = spawn_stdin_reader();
        tokio::spawn(run_console(relay, lines, shutdown.clone()));
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    Ok(())
}
