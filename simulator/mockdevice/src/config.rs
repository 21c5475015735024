//! Session and fleet configuration.
//!
//! Sessions are normally built programmatically through
//! [`SessionConfig::builder`]; the harness binary can also load a whole
//! fleet from a JSON file:
//!
//! ```json
//! { "devices": [
//!     { "device_identity": "248781fd-...", "broker": "127.0.0.1:1883",
//!       "device_kind": "generic", "token": "eyJ..." }
//! ] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SimulatorError, SimulatorResult};
use crate::models::topics::Topics;
use crate::models::types::DeviceKind;

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_TICK_COUNT: u32 = 5;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// `host` or `host:port`; IPv6 literals go in brackets (`[::1]:1883`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn validate(&self) -> SimulatorResult<()> {
        if self.host.trim().is_empty() {
            return Err(SimulatorError::Config("broker host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(SimulatorError::Config("broker port must not be 0".into()));
        }
        Ok(())
    }
}

impl FromStr for BrokerAddress {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |why: &str| SimulatorError::Config(format!("invalid broker address '{s}': {why}"));

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            match tail {
                "" => (host, None),
                _ => (host, Some(tail.strip_prefix(':').ok_or_else(|| invalid("expected ':' after ']'"))?)),
            }
        } else {
            match s.rsplit_once(':') {
                Some((host, _)) if host.contains(':') => (s, None),
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid("port is not a number in 1..=65535"))?,
            None => DEFAULT_MQTT_PORT,
        };

        let addr = BrokerAddress::new(host, port);
        addr.validate()?;
        Ok(addr)
    }
}

impl TryFrom<String> for BrokerAddress {
    type Error = SimulatorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BrokerAddress> for String {
    fn from(a: BrokerAddress) -> Self {
        a.to_string()
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

fn default_tick_count() -> u32 {
    DEFAULT_TICK_COUNT
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Client id and topic namespace prefix.
    pub device_identity: String,
    pub broker: BrokerAddress,
    pub device_kind: DeviceKind,
    /// Opaque bearer token, never parsed.
    pub token: String,

    /// Feature literal; falls back to the device kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,

    /// Envelope `kind` tag; falls back to the device kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_tag: Option<String>,

    #[serde(default = "default_tick_count")]
    pub tick_count: u32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default)]
    pub retain: bool,
}

impl SessionConfig {
    pub fn builder(device_identity: impl Into<String>, broker: BrokerAddress) -> SessionConfigBuilder {
        SessionConfigBuilder::new(device_identity.into(), broker)
    }

    pub fn feature(&self) -> &str {
        self.feature.as_deref().unwrap_or_else(|| self.device_kind.default_feature())
    }

    pub fn kind_tag(&self) -> &str {
        self.kind_tag.as_deref().unwrap_or_else(|| self.device_kind.default_kind_tag())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> SimulatorResult<()> {
        let id = &self.device_identity;
        if id.trim().is_empty() {
            return Err(SimulatorError::Config("device_identity must not be empty".into()));
        }
        if id.contains(['/', '+', '#']) {
            return Err(SimulatorError::Config(format!(
                "device_identity '{id}' must not contain '/', '+' or '#'"
            )));
        }
        // Checked after suffix stripping: "-metrics" alone names no feature.
        if Topics::new(id, self.feature()).feature().trim().is_empty() {
            return Err(SimulatorError::Config(format!(
                "{id}: feature '{}' is empty without its -metrics/-commands suffix",
                self.feature()
            )));
        }
        self.broker.validate()?;
        if self.keep_alive_secs == 0 {
            return Err(SimulatorError::Config(format!("{id}: keep_alive_secs must be > 0")));
        }
        if self.channel_capacity == 0 {
            return Err(SimulatorError::Config(format!("{id}: channel_capacity must be > 0")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    cfg: SessionConfig,
}

impl SessionConfigBuilder {
    fn new(device_identity: String, broker: BrokerAddress) -> Self {
        Self {
            cfg: SessionConfig {
                device_identity,
                broker,
                device_kind: DeviceKind::Unconfigured,
                token: String::new(),
                feature: None,
                kind_tag: None,
                tick_count: DEFAULT_TICK_COUNT,
                tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
                keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
                qos: Qos::default(),
                retain: false,
            },
        }
    }

    pub fn device_kind(mut self, kind: DeviceKind) -> Self {
        self.cfg.device_kind = kind;
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.cfg.token = token.into();
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.cfg.feature = Some(feature.into());
        self
    }

    pub fn kind_tag(mut self, tag: impl Into<String>) -> Self {
        self.cfg.kind_tag = Some(tag.into());
        self
    }

    pub fn tick_count(mut self, n: u32) -> Self {
        self.cfg.tick_count = n;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.cfg.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.cfg.keep_alive_secs = secs;
        self
    }

    pub fn qos(mut self, qos: Qos) -> Self {
        self.cfg.qos = qos;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.cfg.retain = retain;
        self
    }

    pub fn build(self) -> SimulatorResult<SessionConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// A set of independent devices to simulate side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub devices: Vec<SessionConfig>,
}

impl FleetConfig {
    pub fn from_json(text: &str) -> SimulatorResult<Self> {
        let fleet: FleetConfig = serde_json::from_str(text)
            .map_err(|e| SimulatorError::Config(format!("fleet file: {e}")))?;
        fleet.validate()?;
        Ok(fleet)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SimulatorResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SimulatorError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> SimulatorResult<()> {
        let mut seen = HashSet::new();
        for dev in &self.devices {
            dev.validate()?;
            if !seen.insert(dev.device_identity.as_str()) {
                return Err(SimulatorError::Config(format!(
                    "duplicate device_identity '{}'",
                    dev.device_identity
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_address_parsing() {
        assert_eq!("14.225.192.183".parse::<BrokerAddress>().unwrap(), BrokerAddress::new("14.225.192.183", 1883));
        assert_eq!("broker.local:8883".parse::<BrokerAddress>().unwrap(), BrokerAddress::new("broker.local", 8883));
        assert_eq!("[::1]:1884".parse::<BrokerAddress>().unwrap(), BrokerAddress::new("::1", 1884));
        assert_eq!("::1".parse::<BrokerAddress>().unwrap(), BrokerAddress::new("::1", 1883));

        assert!("".parse::<BrokerAddress>().is_err());
        assert!("host:notaport".parse::<BrokerAddress>().is_err());
        assert!("host:0".parse::<BrokerAddress>().is_err());
        assert!("[::1".parse::<BrokerAddress>().is_err());
    }

    #[test]
    fn test_broker_address_display() {
        assert_eq!(BrokerAddress::new("127.0.0.1", 1883).to_string(), "127.0.0.1:1883");
        assert_eq!(BrokerAddress::new("::1", 1883).to_string(), "[::1]:1883");
    }

    #[test]
    fn test_builder_defaults() {
        let cfg = SessionConfig::builder("abc", BrokerAddress::new("127.0.0.1", 1883))
            .device_kind(DeviceKind::Generic)
            .token("tok")
            .build()
            .unwrap();

        assert_eq!(cfg.tick_count, 5);
        assert_eq!(cfg.tick_interval(), Duration::from_secs(1));
        assert_eq!(cfg.feature(), "device-status");
        assert_eq!(cfg.kind_tag(), "2");
        assert_eq!(cfg.qos, Qos::AtMostOnce);
        assert!(!cfg.retain);
    }

    #[test]
    fn test_identity_validation() {
        let broker = BrokerAddress::new("127.0.0.1", 1883);
        assert!(SessionConfig::builder("", broker.clone()).build().is_err());
        assert!(SessionConfig::builder("a/b", broker.clone()).build().is_err());
        assert!(SessionConfig::builder("dev+", broker.clone()).build().is_err());
        assert!(SessionConfig::builder("dev#", broker.clone()).build().is_err());
        assert!(SessionConfig::builder("dev", broker).keep_alive_secs(0).build().is_err());
    }

    #[test]
    fn test_feature_must_survive_suffix_stripping() {
        let broker = BrokerAddress::new("127.0.0.1", 1883);
        for bare in ["", "-metrics", "-commands", " -metrics"] {
            let res = SessionConfig::builder("abc", broker.clone()).feature(bare).build();
            assert!(matches!(res, Err(SimulatorError::Config(_))), "feature {bare:?} accepted");
        }
        assert!(SessionConfig::builder("abc", broker).feature("x-metrics").build().is_ok());
    }

    #[test]
    fn test_fleet_from_json_applies_defaults() {
        let fleet = FleetConfig::from_json(
            r#"{ "devices": [
                { "device_identity": "a", "broker": "127.0.0.1", "device_kind": "generic", "token": "t1" },
                { "device_identity": "b", "broker": "127.0.0.1:1884", "device_kind": "alarm", "token": "t2",
                  "feature": "fire-alert-metrics", "tick_count": 2, "tick_interval_ms": 250, "qos": "at_least_once" }
            ] }"#,
        )
        .unwrap();

        let a = &fleet.devices[0];
        assert_eq!(a.broker.port, 1883);
        assert_eq!(a.tick_count, DEFAULT_TICK_COUNT);
        assert_eq!(a.keep_alive_secs, DEFAULT_KEEP_ALIVE_SECS);

        let b = &fleet.devices[1];
        assert_eq!(b.feature(), "fire-alert-metrics");
        assert_eq!(b.kind_tag(), "0");
        assert_eq!(b.tick_interval(), Duration::from_millis(250));
        assert_eq!(b.qos, Qos::AtLeastOnce);
    }

    #[test]
    fn test_fleet_rejects_duplicates_and_bad_brokers() {
        let dup = r#"{ "devices": [
            { "device_identity": "a", "broker": "h", "device_kind": "generic", "token": "t" },
            { "device_identity": "a", "broker": "h", "device_kind": "alarm", "token": "t" }
        ] }"#;
        assert!(matches!(FleetConfig::from_json(dup), Err(SimulatorError::Config(_))));

        let bad = r#"{ "devices": [
            { "device_identity": "a", "broker": "h:99999", "device_kind": "generic", "token": "t" }
        ] }"#;
        assert!(FleetConfig::from_json(bad).is_err());
    }
}
