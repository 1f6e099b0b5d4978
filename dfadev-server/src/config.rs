//! Host configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DFADEV_CONFIG)
//! 3. Environment variables

use dfadev_core::engine::DEFAULT_CHUNK_SIZE;
use dfadev_core::{EngineConfig, ACCEPT_SENTINEL, REJECT_SENTINEL};
use dfadev_exchange::InitKind;
use dfadev_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "DFADEV_CONFIG";

/// Host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub engine: EngineSettings,
    pub handoff: HandoffConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Loads configuration with every variable, including `DFADEV_CONFIG`,
    /// read through `lookup`.
    ///
    /// An invalid override is an error, never a silent return to defaults.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.network.apply_overrides(&lookup);
        self.engine.apply_overrides(&lookup);
        self.handoff.apply_overrides(&lookup);
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "engine.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.engine.accept_sentinel == self.engine.reject_sentinel {
            return Err(ConfigError::ValidationError(format!(
                "accept and reject sentinels are both {:?}",
                self.engine.accept_sentinel as char
            )));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 64,
        }
    }
}

impl NetworkConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(parsed) = lookup("DFADEV_BIND").and_then(|v| v.parse().ok()) {
            self.bind_addr = parsed;
        }
        if let Some(secs) = lookup("DFADEV_IDLE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.idle_timeout_secs = secs;
        }
        if let Some(n) = lookup("DFADEV_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.max_connections = n;
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Automaton engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Bytes moved per caller copy.
    pub chunk_size: usize,
    #[serde(with = "sentinel_serde")]
    pub accept_sentinel: u8,
    #[serde(with = "sentinel_serde")]
    pub reject_sentinel: u8,
    /// Whether adding a transition also resets the current state.
    pub reset_on_add_transition: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            accept_sentinel: ACCEPT_SENTINEL,
            reject_sentinel: REJECT_SENTINEL,
            reset_on_add_transition: true,
        }
    }
}

impl EngineSettings {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(size) = lookup("DFADEV_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.chunk_size = size;
        }
        if let Some(reset) = lookup("DFADEV_RESET_ON_ADD") {
            self.reset_on_add_transition = parse_bool(&reset);
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new()
            .with_chunk_size(self.chunk_size)
            .with_sentinels(self.accept_sentinel, self.reject_sentinel)
            .with_reset_on_add_transition(self.reset_on_add_transition)
    }
}

/// Live-update handoff configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Directory backing the exchange.
    pub exchange_dir: PathBuf,
    /// How this process was started.
    pub init: InitKind,
    /// Publish the automaton when stopped by a signal.
    pub publish_on_shutdown: bool,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            exchange_dir: PathBuf::from("./data/exchange"),
            init: InitKind::Fresh,
            publish_on_shutdown: false,
        }
    }
}

impl HandoffConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("DFADEV_EXCHANGE_DIR") {
            self.exchange_dir = PathBuf::from(dir);
        }
        if let Some(init) = lookup("DFADEV_INIT") {
            match init.parse() {
                Ok(kind) => self.init = kind,
                Err(e) => tracing::warn!("Ignoring DFADEV_INIT: {}", e),
            }
        }
        if let Some(publish) = lookup("DFADEV_PUBLISH_ON_SHUTDOWN") {
            self.publish_on_shutdown = parse_bool(&publish);
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// SocketAddr as a string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Sentinel bytes as one-character ASCII strings ("Y") or plain numbers (89).
mod sentinel_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Byte(u8),
        Text(String),
    }

    pub fn serialize<S>(byte: &u8, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if byte.is_ascii_graphic() {
            serializer.serialize_str(&(*byte as char).to_string())
        } else {
            serializer.serialize_u8(*byte)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Byte(b) => Ok(b),
            Raw::Text(s) => match s.as_bytes() {
                [b] if b.is_ascii() => Ok(*b),
                _ => Err(de::Error::custom(format!(
                    "sentinel must be a single ASCII character, got {:?}",
                    s
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 7411);
        assert_eq!(config.network.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.engine.chunk_size, 4096);
        assert_eq!(config.engine.accept_sentinel, b'Y');
        assert_eq!(config.engine.reject_sentinel, b'N');
        assert!(config.engine.reset_on_add_transition);
        assert_eq!(config.handoff.init, InitKind::Fresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.engine.accept_sentinel, b'Y');
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            r#"
engine:
  chunk_size: 3
  accept_sentinel: "1"
  reject_sentinel: 48
handoff:
  init: live_update
"#,
        )
        .unwrap();

        assert_eq!(config.engine.chunk_size, 3);
        assert_eq!(config.engine.accept_sentinel, b'1');
        assert_eq!(config.engine.reject_sentinel, b'0');
        assert_eq!(config.handoff.init, InitKind::LiveUpdate);
        assert_eq!(config.network.max_connections, 64);
    }

    #[test]
    fn test_bad_sentinel_rejected() {
        let result = Config::from_yaml("engine:\n  accept_sentinel: YES\n");
        assert!(matches!(result, Err(ConfigError::ParseError(..))));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("DFADEV_BIND", "0.0.0.0:9000"),
            ("DFADEV_CHUNK_SIZE", "16"),
            ("DFADEV_RESET_ON_ADD", "false"),
            ("DFADEV_INIT", "restart"),
            ("DFADEV_EXCHANGE_DIR", "/tmp/x"),
            ("DFADEV_PUBLISH_ON_SHUTDOWN", "1"),
            ("DFADEV_MAX_CONNECTIONS", "not a number"),
        ]));

        assert_eq!(config.network.bind_addr.port(), 9000);
        assert_eq!(config.network.max_connections, 64);
        assert_eq!(config.engine.chunk_size, 16);
        assert!(!config.engine.reset_on_add_transition);
        assert_eq!(config.handoff.init, InitKind::Restart);
        assert_eq!(config.handoff.exchange_dir, PathBuf::from("/tmp/x"));
        assert!(config.handoff.publish_on_shutdown);
    }

    #[test]
    fn test_load_keeps_overrides() {
        let config = Config::load_with(lookup_from(&[
            ("DFADEV_INIT", "live_update"),
            ("DFADEV_EXCHANGE_DIR", "/tmp/handoff"),
        ]))
        .unwrap();
        assert_eq!(config.handoff.init, InitKind::LiveUpdate);
        assert_eq!(config.handoff.exchange_dir, PathBuf::from("/tmp/handoff"));
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        let result = Config::load_with(lookup_from(&[
            ("DFADEV_INIT", "live_update"),
            ("DFADEV_CHUNK_SIZE", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_from_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dfadev.yaml");
        std::fs::write(&path, "engine:\n  chunk_size: 8\nhandoff:\n  init: restart\n").unwrap();
        let path = path.to_string_lossy().into_owned();

        let config = Config::load_with(lookup_from(&[
            (CONFIG_ENV, path.as_str()),
            ("DFADEV_INIT", "live_update"),
        ]))
        .unwrap();
        assert_eq!(config.engine.chunk_size, 8);
        assert_eq!(config.handoff.init, InitKind::LiveUpdate);

        let missing = Config::load_with(lookup_from(&[(CONFIG_ENV, "/nonexistent/dfadev.yaml")]));
        assert!(matches!(missing, Err(ConfigError::IoError(..))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.engine.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.engine.reject_sentinel = b'Y';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config() {
        let mut settings = EngineSettings::default();
        settings.chunk_size = 2;
        settings.reset_on_add_transition = false;

        let engine = settings.engine_config();
        assert_eq!(engine.chunk_size, 2);
        assert!(!engine.reset_on_add_transition);
        assert_eq!(engine.accept_sentinel, b'Y');
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dfadev.yaml");
        let mut config = Config::default();
        config.handoff.publish_on_shutdown = true;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.handoff.publish_on_shutdown);

        let missing = Config::from_file(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::IoError(..))));
    }
}
