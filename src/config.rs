//! Runtime configuration resolved from flags and environment
//!
//! Explicit values win over `SCRIBE_*` environment variables, which win over
//! defaults.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::net::protocol;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_USERNAME: &str = "builder";
pub const DEFAULT_COMMAND_DELAY_MS: u64 = 250;

const ENV_HOST: &str = "SCRIBE_HOST";
const ENV_PORT: &str = "SCRIBE_PORT";
const ENV_VERSION: &str = "SCRIBE_VERSION";
const ENV_USERNAME: &str = "SCRIBE_USERNAME";
const ENV_DELAY: &str = "SCRIBE_DELAY";
const ENV_STRUCTURE_NAME: &str = "SCRIBE_STRUCTURE_NAME";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub version: String,
    pub username: String,
    pub command_delay: Duration,
    pub structure_name: String,
}

impl Config {
    pub fn resolve(
        server: Option<&str>,
        username: Option<String>,
        version: Option<String>,
        command_delay_ms: Option<u64>,
        structure_name: Option<String>,
    ) -> Config {
        let mut host = env_var(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let mut port = env_var(ENV_PORT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        if let Some(server) = server {
            let (h, p) = split_server(server);
            host = h;
            if let Some(p) = p {
                port = p;
            }
        }

        Config {
            host,
            port,
            version: version
                .or_else(|| env_var(ENV_VERSION))
                .unwrap_or_else(|| protocol::GAME_VERSION.to_string()),
            username: username
                .or_else(|| env_var(ENV_USERNAME))
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            command_delay: Duration::from_millis(
                command_delay_ms
                    .or_else(|| env_var(ENV_DELAY).and_then(|v| v.parse().ok()))
                    .unwrap_or(DEFAULT_COMMAND_DELAY_MS),
            ),
            structure_name: structure_name
                .or_else(|| env_var(ENV_STRUCTURE_NAME))
                .unwrap_or_else(default_structure_name),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Split a `host:port` address, tolerating a bare host
pub fn split_server(server: &str) -> (String, Option<u16>) {
    match server.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (server.to_string(), None),
        },
        None => (server.to_string(), None),
    }
}

/// Default template name, unique per run, derived from the wall clock
pub fn default_structure_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("structure_{secs}")
}
