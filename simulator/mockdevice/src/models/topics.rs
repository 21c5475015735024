#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    identity: String,
    feature: String,
}

impl Topics {
    /// `feature` may already carry a `-metrics` / `-commands` suffix; it is
    /// stripped once so `device-status` and `device-status-metrics` name the
    /// same channel pair.
    pub fn new(identity: &str, feature: &str) -> Self {
        let feature = feature
            .strip_suffix("-metrics")
            .or_else(|| feature.strip_suffix("-commands"))
            .unwrap_or(feature);

        Self {
            identity: identity.to_string(),
            feature: feature.to_string(),
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Outbound telemetry.
    pub fn metrics(&self) -> String {
        format!("{}/{}-metrics", self.identity, self.feature)
    }

    /// Inbound command channel. Never subscribed by the simulator.
    pub fn commands(&self) -> String {
        format!("{}/{}-commands", self.identity, self.feature)
    }
}
