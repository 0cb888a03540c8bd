use crate::error::ConfigError;
use crate::hysteresis::DEFAULT_SUPPRESS_THRESHOLD;
use crate::probe::PingSettings;
use crate::watcher::WatchSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub ping_interval_ms: u64,
    pub timeout_ms: u64,
    pub suppress_threshold: u8,
    pub workers: usize,
    pub probe: ProbeConf,
    /// name -> address
    pub hosts: BTreeMap<String, String>,
    /// Camera JSON document to pull SIYI/AI/Servo addresses from.
    pub camera_config: Option<PathBuf>,
    pub mqtt: Option<MqttConf>,
    pub http: Option<HttpConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConf {
    pub program: String,
    pub count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for ProbeConf {
    fn default() -> Self {
        let ping = PingSettings::default();
        Self {
            program: ping.program,
            count: ping.count,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 3000,
            timeout_ms: 1000,
            suppress_threshold: DEFAULT_SUPPRESS_THRESHOLD,
            workers: 1,
            probe: ProbeConf::default(),
            hosts: BTreeMap::new(),
            camera_config: None,
            mqtt: None,
            http: Some(HttpConf {
                bind: "0.0.0.0:8080".into(),
            }),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.ping_interval_ms == 0 {
            return invalid("ping_interval_ms", "must be greater than zero");
        }
        if self.timeout_ms == 0 {
            return invalid("timeout_ms", "must be greater than zero");
        }
        if self.workers == 0 {
            return invalid("workers", "at least one probe worker is required");
        }
        if self.probe.count == 0 {
            return invalid("probe.count", "must send at least one packet");
        }
        if self.suppress_threshold > 100 {
            return invalid("suppress_threshold", "scores never exceed 100");
        }
        if self.probe.program.trim().is_empty() {
            return invalid("probe.program", "must not be empty");
        }
        Ok(())
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            workers: self.workers,
        }
    }

    pub fn ping_settings(&self) -> PingSettings {
        PingSettings {
            program: self.probe.program.clone(),
            count: self.probe.count,
        }
    }
}

/// Strict parse: YAML errors and invalid values are reported.
pub fn parse_config(text: &str) -> Result<WatchConfig, ConfigError> {
    if text.trim().is_empty() {
        return Ok(WatchConfig::default());
    }
    let config: WatchConfig = serde_yaml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Path from `LINKWATCH_CONFIG`, `linkwatch.yaml` otherwise.
pub async fn load_config() -> WatchConfig {
    let path = std::env::var("LINKWATCH_CONFIG").unwrap_or_else(|_| "linkwatch.yaml".into());
    load_config_from(Path::new(&path)).await
}

/// Strict read of a config file.
pub async fn read_config(path: &Path) -> Result<WatchConfig, ConfigError> {
    let text = fs::read_to_string(path).await?;
    parse_config(&text)
}

/// Lenient load: a missing or broken file falls back to defaults.
pub async fn load_config_from(path: &Path) -> WatchConfig {
    if !path.exists() {
        warn!("No config at {}, using defaults", path.display());
        return WatchConfig::default();
    }
    match read_config(path).await {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            error!("Invalid config {}: {}", path.display(), e);
            WatchConfig::default()
        }
    }
}

/// Extracts camera endpoints from the application's camera JSON document.
/// Missing sections and empty addresses are skipped.
pub fn camera_hosts_from_json(text: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    const SOURCES: &[(&str, &str, &str)] = &[
        ("siyiConfig", "ip", "SIYI"),
        ("aiConfig", "cameraIP", "AI"),
        ("servoConfig", "ip", "Servo"),
    ];

    let doc: serde_json::Value = serde_json::from_str(text)?;
    let hosts = SOURCES
        .iter()
        .filter_map(|(section, key, name)| {
            let address = doc.get(section)?.get(key)?.as_str()?.trim();
            (!address.is_empty()).then(|| (name.to_string(), address.to_string()))
        })
        .collect();
    Ok(hosts)
}

/// Hosts to register at startup: camera document first, YAML `hosts` on top.
pub async fn collect_hosts(config: &WatchConfig) -> BTreeMap<String, String> {
    let mut hosts = BTreeMap::new();

    if let Some(path) = &config.camera_config {
        match fs::read_to_string(path).await {
            Ok(text) => match camera_hosts_from_json(&text) {
                Ok(found) => {
                    info!("Found {} camera IPs in {}", found.len(), path.display());
                    hosts.extend(found);
                }
                Err(e) => warn!("Ignoring camera config {}: {}", path.display(), e),
            },
            Err(e) => warn!("Cannot read camera config {}: {}", path.display(), e),
        }
    }

    hosts.extend(config.hosts.clone());
    hosts
}
