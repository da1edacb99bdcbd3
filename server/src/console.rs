//! Operator commands typed on the server's standard input.
//!
//! - `say <text>` broadcasts a white "Server: <text>" chat line
//! - `players` logs the connected sessions
//! - `exit` or `quit` stops the server

use crate::dispatch::Relay;
use crate::network::ShutdownHandle;
use log::{info, warn};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Say(String),
    Players,
    Exit,
    Help,
    Unknown(String),
}

impl ConsoleCommand {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word.to_ascii_lowercase().as_str() {
            "say" if !rest.is_empty() => ConsoleCommand::Say(rest.to_string()),
            "players" => ConsoleCommand::Players,
            "exit" | "quit" => ConsoleCommand::Exit,
            "help" => ConsoleCommand::Help,
            _ => ConsoleCommand::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// Reads stdin on a dedicated thread and forwards each line.
///
/// Blocking reads keep the thread parked in `read_line`, so it is detached
/// rather than joined; process exit takes it down.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Executes console lines until `exit` or the input ends.
pub async fn run_console(
    relay: Arc<Relay>,
    mut lines: mpsc::Receiver<String>,
    shutdown: ShutdownHandle,
) {
    while let Some(line) = lines.recv().await {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        match command {
            ConsoleCommand::Say(text) => {
                let recipients = relay.announce(&text).await;
                info!(target: "relay::console", "Announcement sent to {} players", recipients);
            }
            ConsoleCommand::Players => {
                let sessions = relay.sessions().snapshot().await;
                info!(
                    target: "relay::console",
                    "{}/{} players connected",
                    sessions.len(),
                    relay.sessions().max_sessions()
                );
                for session in sessions {
                    info!(
                        target: "relay::console",
                        "  client {} '{}' at {} flying ship {}",
                        session.client_id, session.name, session.addr, session.ship_id
                    );
                }
            }
            ConsoleCommand::Exit => {
                info!(target: "relay::console", "Shutdown requested from console");
                shutdown.trigger();
                return;
            }
            ConsoleCommand::Help => {
                info!(target: "relay::console", "Commands: say <text>, players, exit");
            }
            ConsoleCommand::Unknown(input) => {
                warn!(target: "relay::console", "Unknown command: {}", input);
            }
        }
    }
}
