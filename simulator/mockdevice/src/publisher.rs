use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Qos, SessionConfig};
use crate::error::{SimulatorError, SimulatorResult};

fn map_qos(q: Qos) -> QoS {
    match q {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Narrow seam between payload generation and the broker.
///
/// Implementations decide whether `publish` waits for an acknowledgement;
/// the session only cares whether the hand-off succeeded.
#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimulatorResult<()>;
}

/// Fire-and-forget MQTT publisher backed by rumqttc.
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    event_task: JoinHandle<()>,
}

impl MqttPublisher {
    /// Connects and waits for the broker's CONNACK, then moves the event loop
    /// to a background task. No retry: any handshake failure is returned.
    pub async fn connect(cfg: &SessionConfig) -> SimulatorResult<Self> {
        let mut opts = MqttOptions::new(&cfg.device_identity, &cfg.broker.host, cfg.broker.port);
        opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));

        let (client, mut event_loop) = AsyncClient::new(opts, cfg.channel_capacity);

        wait_for_connack(&mut event_loop, &cfg.broker.to_string()).await?;
        info!(client_id = %cfg.device_identity, broker = %cfg.broker, "connected to broker");

        let client_id = cfg.device_identity.clone();
        let event_task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(out)) => debug!(%client_id, "outgoing {out:?}"),
                    Ok(_) => {}
                    Err(e) if is_clean_shutdown(&e) => {
                        debug!(%client_id, "all client handles dropped, event loop stopped");
                        break;
                    }
                    Err(e) => {
                        warn!(%client_id, "MQTT poll error, event loop stopped: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            client,
            qos: map_qos(cfg.qos),
            retain: cfg.retain,
            event_task,
        })
    }

    /// Whether the background event loop is still running.
    pub fn is_alive(&self) -> bool {
        !self.event_task.is_finished()
    }
}

/// The client was dropped at the end of a session; not a failure.
fn is_clean_shutdown(e: &ConnectionError) -> bool {
    matches!(e, ConnectionError::RequestsDone)
}

async fn wait_for_connack(event_loop: &mut EventLoop, broker: &str) -> SimulatorResult<()> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(SimulatorError::Connection(format!("{broker} refused connection: {code:?}"))),
                };
            }
            Ok(_) => continue,
            Err(e) => return Err(SimulatorError::Connection(format!("{broker}: {e}"))),
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimulatorResult<()> {
        if !self.is_alive() {
            return Err(SimulatorError::Publish {
                topic: topic.to_string(),
                reason: "connection event loop has stopped".to_string(),
            });
        }

        self.client
            .publish(topic, self.qos, self.retain, payload)
            .await
            .map_err(|e| SimulatorError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-memory publisher. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    log: Arc<Mutex<Vec<PublishedMessage>>>,
    attempts: usize,
    fail_on: HashSet<usize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the publish attempts with these zero-based indices fail.
    pub fn failing_on(mut self, attempts: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on = attempts.into_iter().collect();
        self
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> SimulatorResult<()> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.fail_on.contains(&attempt) {
            return Err(SimulatorError::Publish {
                topic: topic.to_string(),
                reason: format!("injected failure on attempt {attempt}"),
            });
        }

        self.log.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
