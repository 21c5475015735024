use serde::{Deserialize, Serialize};

/// ---- Device kinds ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Generic,
    Alarm,
    Unconfigured,
}

impl DeviceKind {
    /// Envelope `kind` tag the backend expects for this device kind.
    pub fn default_kind_tag(&self) -> &'static str {
        match self {
            DeviceKind::Generic => "2",
            DeviceKind::Alarm => "0",
            DeviceKind::Unconfigured => "0",
        }
    }

    /// Feature literal used in the topic namespace.
    pub fn default_feature(&self) -> &'static str {
        match self {
            DeviceKind::Generic => "device-status",
            DeviceKind::Alarm => "fire-alert",
            DeviceKind::Unconfigured => "unconfigured",
        }
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(DeviceKind::Generic),
            "alarm" => Ok(DeviceKind::Alarm),
            "unconfigured" => Ok(DeviceKind::Unconfigured),
            other => Err(format!("unknown device kind '{other}'")),
        }
    }
}

/// ---- Wire schema (telemetry on MQTT) ----

/// Outer message published on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Opaque bearer credential, copied verbatim.
    pub token: String,

    #[serde(flatten)]
    pub body: ReadingGroups,
}

/// Kind-specific part of the payload, flattened next to `token`.
/// Variant order matters for decoding: `Empty` accepts any object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingGroups {
    Generic { data: Vec<GenericReading> },
    Alarm(AlarmChannels),
    Empty {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericReading {
    pub id: u32,
    pub component: u32,
    pub kind: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmReading {
    pub id: u32,
    pub component: u32,
    pub value: u32,
    pub alert: AlertStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmChannels {
    pub fire: Vec<AlarmReading>,
    pub smoke: Vec<AlarmReading>,
    pub co: Vec<AlarmReading>,
    pub heat: Vec<AlarmReading>,
    #[serde(rename = "fire-button")]
    pub fire_button: Vec<AlarmReading>,
    pub lpg: Vec<AlarmReading>,
}

/// Encoded as `0` / `1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AlertStatus {
    Safe,
    Unsafe,
}

impl From<AlertStatus> for u8 {
    fn from(s: AlertStatus) -> Self {
        match s {
            AlertStatus::Safe => 0,
            AlertStatus::Unsafe => 1,
        }
    }
}

impl TryFrom<u8> for AlertStatus {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AlertStatus::Safe),
            1 => Ok(AlertStatus::Unsafe),
            other => Err(format!("alert must be 0 or 1, got {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(id: u32, component: u32, value: u32) -> AlarmReading {
        AlarmReading { id, component, value, alert: AlertStatus::Safe }
    }

    #[test]
    fn test_generic_envelope_wire_shape() {
        let env = Envelope {
            kind: "2".to_string(),
            payload: Payload {
                token: "abcd".to_string(),
                body: ReadingGroups::Generic {
                    data: vec![GenericReading { id: 1, component: 1, kind: 50 }],
                },
            },
        };

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "2",
                "payload": {
                    "token": "abcd",
                    "data": [{ "id": 1, "component": 1, "kind": 50 }]
                }
            })
        );
    }

    #[test]
    fn test_alarm_channels_use_wire_names() {
        let channels = AlarmChannels {
            fire: vec![reading(0, 8, 460)],
            smoke: vec![],
            co: vec![],
            heat: vec![],
            fire_button: vec![AlarmReading { alert: AlertStatus::Unsafe, ..reading(1, 10, 1) }],
            lpg: vec![],
        };
        let env = Envelope {
            kind: "0".to_string(),
            payload: Payload { token: "t".to_string(), body: ReadingGroups::Alarm(channels) },
        };

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["payload"]["fire-button"], json!([{ "id": 1, "component": 10, "value": 1, "alert": 1 }]));
        assert_eq!(value["payload"]["fire"][0]["alert"], json!(0));
        assert!(value["payload"].get("fire_button").is_none());
    }

    #[test]
    fn test_empty_body_has_only_token() {
        let env = Envelope {
            kind: "0".to_string(),
            payload: Payload { token: "t".to_string(), body: ReadingGroups::Empty {} },
        };
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({ "kind": "0", "payload": { "token": "t" } }));
    }

    #[test]
    fn test_decode_picks_matching_reading_group() {
        let raw = r#"{"kind":"0","payload":{"token":"t","fire":[],"smoke":[],"co":[],"heat":[],"fire-button":[],"lpg":[{"id":1,"component":6,"value":20,"alert":0}]}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();
        match env.payload.body {
            ReadingGroups::Alarm(ch) => assert_eq!(ch.lpg, vec![reading(1, 6, 20)]),
            other => panic!("expected alarm channels, got {other:?}"),
        }

        let env: Envelope = serde_json::from_str(r#"{"kind":"0","payload":{"token":"t"}}"#).unwrap();
        assert_eq!(env.payload.body, ReadingGroups::Empty {});
    }

    #[test]
    fn test_alert_status_rejects_other_values() {
        assert!(serde_json::from_value::<AlertStatus>(json!(2)).is_err());
        assert_eq!(serde_json::from_value::<AlertStatus>(json!(1)).unwrap(), AlertStatus::Unsafe);
    }

    #[test]
    fn test_device_kind_parsing() {
        assert_eq!("Alarm".parse::<DeviceKind>().unwrap(), DeviceKind::Alarm);
        assert_eq!(serde_json::from_value::<DeviceKind>(json!("generic")).unwrap(), DeviceKind::Generic);
        assert!("thermostat".parse::<DeviceKind>().is_err());
    }
}
