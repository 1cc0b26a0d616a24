//! Configuration.
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, `REIN_*`
//! environment variables. The binary applies its flags on top.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub driver: DriverConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// How long startup waits for the first peer. 0 = accept in the background.
    pub connect_timeout_secs: u64,
    pub query_timeout_ms: u64,
    pub event_capacity: usize,
    pub response_capacity: usize,
    /// 1 行（1 レコード）の上限バイト数。超えた行は読み捨てます。
    pub max_line_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7777,
            connect_timeout_secs: 120,
            query_timeout_ms: 5000,
            event_capacity: 200,
            response_capacity: 64,
            max_line_bytes: 1 << 20,
        }
    }
}

impl BridgeConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// `None` when startup should not wait for a peer.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub interval_ms: u64,
    pub ledger_capacity: usize,
    /// Ledger entries rendered into the provider input.
    pub summary_entries: usize,
    pub initial_strategy: String,
    pub initial_mode: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval_ms: 4000,
            ledger_capacity: 10,
            summary_entries: 5,
            initial_strategy: "balanced".to_string(),
            initial_mode: "roam".to_string(),
        }
    }
}

impl DriverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,
    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key. No key, no generative provider.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.novita.ai/openai/v1/chat/completions".to_string(),
            model: "meta-llama/llama-4-maverick-17b-128e-instruct-fp8".to_string(),
            api_key_env: "REIN_API_KEY".to_string(),
            timeout_secs: 60,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl Config {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides_from(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("REIN_HOST") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.bridge.host = trimmed.to_string();
            }
        }
        if let Some(port) = parse_env(&mut lookup, "REIN_PORT") {
            self.bridge.port = port;
        }
        if let Some(ms) = parse_env(&mut lookup, "REIN_INTERVAL_MS") {
            self.driver.interval_ms = ms;
        }
        if let Some(secs) = parse_env(&mut lookup, "REIN_CONNECT_TIMEOUT_SECS") {
            self.bridge.connect_timeout_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.interval_ms == 0 {
            return Err(ConfigError::Invalid("driver.interval_ms must be > 0".into()));
        }
        if self.driver.ledger_capacity == 0 {
            return Err(ConfigError::Invalid("driver.ledger_capacity must be > 0".into()));
        }
        if self.bridge.event_capacity == 0 || self.bridge.response_capacity == 0 {
            return Err(ConfigError::Invalid("bridge queue capacities must be > 0".into()));
        }
        if self.bridge.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("bridge.query_timeout_ms must be > 0".into()));
        }
        if self.bridge.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("bridge.max_line_bytes must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &mut F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("invalid {key}, ignoring: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.bridge.bind_addr(), "127.0.0.1:7777");
        assert_eq!(cfg.bridge.connect_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(cfg.bridge.query_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.bridge.event_capacity, 200);
        assert_eq!(cfg.bridge.max_line_bytes, 1 << 20);
        assert_eq!(cfg.driver.interval(), Duration::from_secs(4));
        assert_eq!(cfg.driver.ledger_capacity, 10);
        assert!(cfg.provider.enabled);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            [bridge]
            port = 9000
            connect_timeout_secs = 0

            [driver]
            interval_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bridge.port, 9000);
        assert_eq!(cfg.bridge.host, "127.0.0.1");
        assert_eq!(cfg.bridge.connect_timeout(), None);
        assert_eq!(cfg.driver.interval_ms, 1500);
        assert_eq!(cfg.driver.summary_entries, 5);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let cfg = Config::load_with(
            None,
            env(&[
                ("REIN_HOST", " 0.0.0.0 "),
                ("REIN_PORT", "not-a-port"),
                ("REIN_INTERVAL_MS", "250"),
                ("REIN_CONNECT_TIMEOUT_SECS", "0"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.bridge.host, "0.0.0.0");
        assert_eq!(cfg.bridge.port, 7777);
        assert_eq!(cfg.driver.interval_ms, 250);
        assert_eq!(cfg.bridge.connect_timeout_secs, 0);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Config::load_with(None, env(&[("REIN_INTERVAL_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load_with(Some(Path::new("/nonexistent/rein.toml")), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("rein-bad-{}.toml", std::process::id()));
        fs::write(&path, "[bridge\nport = ").unwrap();
        let err = Config::load_with(Some(&path), env(&[])).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
