//! Bridge configuration
//!
//! Layered with figment: built-in defaults, then the TOML file named by
//! `UBISYS_BRIDGE_CONFIG` (default `ubisys-bridge.toml`, optional), then
//! `UBISYS_BRIDGE_*` environment variables. Nested keys use `__`, e.g.
//! `UBISYS_BRIDGE_MQTT__HOST=broker.local`.

use crate::topics::TopicLayout;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ubisys_shared::{timing, ubisys};

pub const CONFIG_PATH_ENV: &str = "UBISYS_BRIDGE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ubisys-bridge.toml";
const ENV_PREFIX: &str = "UBISYS_BRIDGE_";

/// MQTT broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Initial delay after a failed connection attempt
    pub reconnect_delay_ms: u64,
    /// Upper bound for the exponential backoff
    pub max_reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "ubisys-bridge".into(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub mqtt: MqttConfig,
    /// Root of the coordinator's topic tree
    pub base_topic: String,
    /// Namespace segment for addressed requests
    pub vendor_namespace: String,
    /// How long to wait for a device to answer one request
    pub response_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            base_topic: "zigbee2mqtt".into(),
            vendor_namespace: ubisys::MANUFACTURER_NAME.into(),
            response_timeout_ms: timing::RESPONSE_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    /// Load from defaults, config file and environment
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());

        Self::from_figment(
            Self::defaults()
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__")),
        )
    }

    /// Figment seeded with the built-in defaults
    pub fn defaults() -> Figment {
        Figment::from(Serialized::defaults(BridgeConfig::default()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn topics(&self) -> TopicLayout {
        TopicLayout::new(&self.base_topic, &self.vendor_namespace)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_figment(BridgeConfig::defaults()).unwrap();

        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.response_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.topics().request_filter(),
            "zigbee2mqtt/ubisys/#"
        );
    }

    #[test]
    fn test_file_overrides_defaults() {
        let figment = BridgeConfig::defaults().merge(Toml::string(
            r#"
            base_topic = "z2m"
            response_timeout_ms = 2500

            [mqtt]
            host = "broker.local"
            username = "bridge"
            password = "secret"
            "#,
        ));

        let config = BridgeConfig::from_figment(figment).unwrap();

        assert_eq!(config.base_topic, "z2m");
        assert_eq!(config.vendor_namespace, "ubisys");
        assert_eq!(config.response_timeout(), Duration::from_millis(2500));
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
        assert_eq!(config.topics().devices_topic(), "z2m/bridge/devices");
    }

    #[test]
    fn test_invalid_value_rejected() {
        let figment = BridgeConfig::defaults().merge(Toml::string("[mqtt]\nport = \"high\"\n"));
        assert!(BridgeConfig::from_figment(figment).is_err());
    }
}
