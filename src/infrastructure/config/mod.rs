//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::application::errors::ConfigError;

/// Host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub host: HostConfig,
    pub bridge: BridgeConfig,
    pub plugins: PluginConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostConfig {
    pub name: String,
    /// Root of per-plugin data directories (`<data-dir>/data/<identifier>`)
    pub data_dir: PathBuf,
    /// Staging area for reloadable modules; defaults to the system temp dir
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// Primary bridge module. When unset, the host runs without one.
    pub library: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub call_timeout_ms: u64,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    /// Base directory; modules live in `<directory>/<os>/<arch>/`
    pub directory: PathBuf,
    /// Shared dependency libraries, loaded before anything else
    pub library_directory: PathBuf,
    pub auto_enable: bool,
    /// Identifiers that are loaded but not enabled automatically
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    pub directories: Vec<PathBuf>,
    pub expiration_seconds: u64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventConfig {
    /// Fan-out pool size; defaults to twice the available parallelism
    pub workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig {
                name: "native-host".to_string(),
                data_dir: PathBuf::from("./data"),
                temp_dir: None,
            },
            bridge: BridgeConfig {
                library: None,
                poll_interval_ms: 10,
                call_timeout_ms: 5000,
                queue_capacity: 1024,
            },
            plugins: PluginConfig {
                directory: PathBuf::from("./plugins"),
                library_directory: PathBuf::from("./libraries"),
                auto_enable: true,
                disabled: Vec::new(),
            },
            cache: CacheConfig {
                directories: vec![PathBuf::from("./image"), PathBuf::from("./record")],
                expiration_seconds: 3600,
                sweep_interval_seconds: 60,
            },
            events: EventConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("NATIVE_HOST_DATA_DIR") {
            config.host.data_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("NATIVE_HOST_PLUGIN_DIR") {
            config.plugins.directory = PathBuf::from(dir);
        }

        if let Ok(bridge) = std::env::var("NATIVE_HOST_BRIDGE") {
            config.bridge.library = Some(PathBuf::from(bridge));
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue("bridge.poll-interval-ms must be > 0".to_string()));
        }
        if self.bridge.call_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("bridge.call-timeout-ms must be > 0".to_string()));
        }
        if self.bridge.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("bridge.queue-capacity must be > 0".to_string()));
        }
        if self.cache.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue("cache.sweep-interval-seconds must be > 0".to_string()));
        }
        if self.events.workers == Some(0) {
            return Err(ConfigError::InvalidValue("events.workers must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.bridge.poll_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge.call_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_seconds)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.host
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("native-host"))
    }

    /// Event fan-out workers: configured value, else 2x CPU parallelism
    pub fn event_workers(&self) -> usize {
        self.events.workers.unwrap_or_else(|| {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            cpus * 2
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("poll-interval-ms: 10"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.bridge.queue_capacity, 1024);
        assert!(parsed.plugins.auto_enable);
    }

    #[test]
    fn test_load_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let yaml = Config::default()
            .to_yaml()
            .unwrap()
            .replace("poll-interval-ms: 10", "poll-interval-ms: 0");
        std::fs::write(&path, yaml).unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        assert!(matches!(
            Config::load("/nonexistent/config.yaml"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_event_workers() {
        let mut config = Config::default();
        assert!(config.event_workers() >= 2);
        config.events.workers = Some(3);
        assert_eq!(config.event_workers(), 3);
    }
}
