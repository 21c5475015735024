//! Mock IoT edge devices for exercising a telemetry ingestion backend.
//!
//! Each [`SimulatorSession`] owns one broker connection, derives its topics
//! from the device identity and publishes a fixed number of kind-specific
//! envelopes at a fixed cadence. Sessions share nothing, so a fleet is just
//! many sessions run side by side.
//!
//! # Example
//!
//! ```rust,ignore
//! use mockdevice::{BrokerAddress, DeviceKind, SessionConfig, SimulatorSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = SessionConfig::builder("248781fd-5ebb-4395-b90e-f0721039ebfe", "127.0.0.1".parse()?)
//!         .device_kind(DeviceKind::Generic)
//!         .token("eyJhbGciOiJIUzI1NiJ9...")
//!         .build()?;
//!     SimulatorSession::new(cfg)?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod publisher;
pub mod session;

pub use config::{BrokerAddress, FleetConfig, Qos, SessionConfig};
pub use error::{SimulatorError, SimulatorResult};
pub use models::topics::Topics;
pub use models::types::{DeviceKind, Envelope};
pub use publisher::{MqttPublisher, Publisher, RecordingPublisher};
pub use session::{SessionReport, SessionState, SimulatorSession};
