use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SimulatorError, SimulatorResult};
use crate::models::readings::{build_envelope, encode};
use crate::models::topics::Topics;
use crate::publisher::{MqttPublisher, Publisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Connecting,
    Connected,
    Publishing,
    Waiting,
    Done,
    Failed,
}

/// Outcome of one session run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub device_identity: String,
    pub topic: String,
    pub ticks: u32,
    pub published: u32,
    pub failed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One simulated device: a connection, a topic pair and a fixed-count
/// publish loop.
pub struct SimulatorSession {
    cfg: SessionConfig,
    topics: Topics,
    state: SessionState,
}

impl SimulatorSession {
    pub fn new(cfg: SessionConfig) -> SimulatorResult<Self> {
        cfg.validate()?;
        let topics = Topics::new(&cfg.device_identity, cfg.feature());
        Ok(Self {
            cfg,
            topics,
            state: SessionState::Created,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connect to the configured broker and run all ticks.
    pub async fn run(&mut self) -> SimulatorResult<SessionReport> {
        self.state = SessionState::Connecting;
        info!(device = %self.cfg.device_identity, broker = %self.cfg.broker, "connecting");

        let mut publisher = match MqttPublisher::connect(&self.cfg).await {
            Ok(p) => p,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };
        self.state = SessionState::Connected;

        self.run_with(&mut publisher).await
    }

    /// Run all ticks against an already connected publisher.
    pub async fn run_with<P>(&mut self, publisher: &mut P) -> SimulatorResult<SessionReport>
    where
        P: Publisher + ?Sized,
    {
        self.state = SessionState::Connected;

        let topic = self.topics.metrics();
        let interval = self.cfg.tick_interval();
        let started_at = Utc::now();
        let mut report = SessionReport {
            device_identity: self.cfg.device_identity.clone(),
            topic: topic.clone(),
            ticks: 0,
            published: 0,
            failed: 0,
            started_at,
            finished_at: started_at,
        };

        info!(
            device = %self.cfg.device_identity,
            %topic,
            kind = ?self.cfg.device_kind,
            ticks = self.cfg.tick_count,
            "publishing"
        );

        for tick in 0..self.cfg.tick_count {
            self.state = SessionState::Publishing;
            let envelope = build_envelope(self.cfg.kind_tag(), &self.cfg.token, self.cfg.device_kind, tick);
            let payload = match encode(&envelope) {
                Ok(p) => p,
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            };

            report.ticks += 1;
            match publisher.publish(&topic, payload).await {
                Ok(()) => {
                    report.published += 1;
                    debug!(device = %self.cfg.device_identity, tick, "published");
                }
                Err(e @ SimulatorError::Publish { .. }) => {
                    report.failed += 1;
                    warn!(device = %self.cfg.device_identity, tick, "{e}");
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }

            // Also after the last tick, so the final publish can flush.
            self.state = SessionState::Waiting;
            tokio::time::sleep(interval).await;
        }

        self.state = SessionState::Done;
        report.finished_at = Utc::now();
        info!(
            device = %self.cfg.device_identity,
            published = report.published,
            failed = report.failed,
            "session finished"
        );
        Ok(report)
    }
}
