//! Host settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::connection::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TOKEN, Endpoint, RECONNECT_DELAY};
use crate::device::DeviceIdentity;

pub const DEFAULT_DEVICE_FILE: &str = ".panel/device_id";
pub const DEFAULT_SURFACE_QUEUE_CAP: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub device_file: PathBuf,
    pub reconnect_delay: Duration,
    pub surface_queue_cap: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            token: DEFAULT_TOKEN.to_string(),
            device_file: PathBuf::from(DEFAULT_DEVICE_FILE),
            reconnect_delay: RECONNECT_DELAY,
            surface_queue_cap: DEFAULT_SURFACE_QUEUE_CAP,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`. Missing, empty, unparseable or zero
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            host: text("PANEL_HOST").unwrap_or(defaults.host),
            port: parse_positive(text("PANEL_PORT")).unwrap_or(defaults.port),
            token: text("PANEL_TOKEN").unwrap_or(defaults.token),
            device_file: text("PANEL_DEVICE_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.device_file),
            reconnect_delay: parse_positive::<u64>(text("PANEL_RECONNECT_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_delay),
            surface_queue_cap: parse_positive(text("PANEL_SURFACE_QUEUE_CAP"))
                .unwrap_or(defaults.surface_queue_cap),
        }
    }

    pub fn endpoint(&self, device: &DeviceIdentity) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.port,
            token: self.token.clone(),
            device_id: device.as_str().to_string(),
        }
    }
}

fn parse_positive<T>(raw: Option<String>) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(HostConfig::from_lookup(lookup(&[])), HostConfig::default());
    }

    #[test]
    fn values_override_defaults() {
        let config = HostConfig::from_lookup(lookup(&[
            ("PANEL_HOST", "10.0.0.4"),
            ("PANEL_PORT", "9000"),
            ("PANEL_TOKEN", "secret"),
            ("PANEL_DEVICE_FILE", "/var/lib/panel/id"),
            ("PANEL_RECONNECT_MS", "500"),
            ("PANEL_SURFACE_QUEUE_CAP", "16"),
        ]));

        assert_eq!(config.host, "10.0.0.4");
        assert_eq!(config.port, 9000);
        assert_eq!(config.token, "secret");
        assert_eq!(config.device_file, PathBuf::from("/var/lib/panel/id"));
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.surface_queue_cap, 16);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = HostConfig::from_lookup(lookup(&[
            ("PANEL_PORT", "70000"),
            ("PANEL_RECONNECT_MS", "0"),
            ("PANEL_SURFACE_QUEUE_CAP", "lots"),
            ("PANEL_HOST", "   "),
        ]));

        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn endpoint_uses_device_identity() {
        let config = HostConfig::default();
        let endpoint = config.endpoint(&DeviceIdentity::new("device_x"));
        assert_eq!(endpoint.url(), "ws://localhost:8765/?token=1234&device=device_x");
    }
}
