//! Host configuration: fixed defaults with environment overrides.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

/// Chrome's default remote-debugging port.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;
/// Port the host listens on for tool-calling clients.
pub const DEFAULT_LISTEN_PORT: u16 = 19222;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub chrome_host: String,
    pub debug_port: u16,
    pub listen_addr: SocketAddr,
    pub command_timeout_ms: u64,
    pub auto_enable_domains: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chrome_host: "127.0.0.1".to_string(),
            debug_port: DEFAULT_DEBUG_PORT,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_LISTEN_PORT)),
            command_timeout_ms: 30_000,
            auto_enable_domains: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Overrides pulled through `lookup` so the logic is testable without
    /// mutating the process environment. Invalid values fall back to the
    /// default with a warning, never a panic.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CHROMELINK_CHROME_HOST") {
            let trimmed = host.trim();
            if !trimmed.is_empty() {
                self.chrome_host = trimmed.to_string();
            }
        }
        if let Some(port) = parsed(&lookup, "CHROMELINK_DEBUG_PORT") {
            self.debug_port = port;
        }
        if let Some(addr) = parsed(&lookup, "CHROMELINK_LISTEN") {
            self.listen_addr = addr;
        }
        if let Some(timeout) = parsed(&lookup, "CHROMELINK_COMMAND_TIMEOUT_MS") {
            self.command_timeout_ms = timeout;
        }
        if let Some(raw) = lookup("CHROMELINK_AUTO_ENABLE") {
            self.auto_enable_domains =
                !matches!(raw.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(target: "config", key, value = %raw, "ignoring unparseable override");
            None
        }
    }
}
