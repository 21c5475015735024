use anyhow::{Context, Result};
use clap::Parser;
use mockdevice::{
    BrokerAddress, DeviceKind, FleetConfig, RecordingPublisher, SessionConfig, SessionReport,
    SimulatorSession,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "mockdevice", about = "Publish synthetic device telemetry to an MQTT broker")]
struct Args {
    /// JSON fleet file; when set, the single-device flags are ignored
    #[arg(long, env = "MOCK_FLEET")]
    fleet: Option<PathBuf>,

    /// Device identity; a random UUID when omitted
    #[arg(long, env = "DEVICE_ID")]
    id: Option<String>,
    #[arg(long, env = "MQTT_BROKER", default_value = "127.0.0.1:1883")]
    broker: String,
    #[arg(long, env = "DEVICE_KIND", default_value = "generic")]
    kind: DeviceKind,
    #[arg(long, env = "DEVICE_TOKEN", default_value = "")]
    token: String,
    #[arg(long, env = "DEVICE_FEATURE")]
    feature: Option<String>,
    #[arg(long, default_value_t = 5)]
    ticks: u32,
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Print payloads instead of connecting to a broker
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn fleet(&self) -> Result<FleetConfig> {
        if let Some(path) = &self.fleet {
            return FleetConfig::from_path(path).with_context(|| format!("loading fleet {}", path.display()));
        }

        let broker: BrokerAddress = self.broker.parse().context("parsing --broker")?;
        let id = self.id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut builder = SessionConfig::builder(id, broker)
            .device_kind(self.kind)
            .token(&self.token)
            .tick_count(self.ticks)
            .tick_interval(Duration::from_millis(self.interval_ms));
        if let Some(feature) = &self.feature {
            builder = builder.feature(feature);
        }

        Ok(FleetConfig {
            devices: vec![builder.build().context("building device config")?],
        })
    }
}

async fn run_device(cfg: SessionConfig, dry_run: bool) -> Result<SessionReport> {
    let id = cfg.device_identity.clone();
    let mut session = SimulatorSession::new(cfg)?;

    if !dry_run {
        return session.run().await.with_context(|| format!("device {id}"));
    }

    let recorder = RecordingPublisher::new();
    let mut handle = recorder.clone();
    let report = session.run_with(&mut handle).await?;
    for msg in recorder.messages().await {
        println!("{} {}", msg.topic, String::from_utf8_lossy(&msg.payload));
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let fleet = args.fleet()?;

    info!(devices = fleet.devices.len(), dry_run = args.dry_run, "starting simulation");

    let mut tasks = JoinSet::new();
    for cfg in fleet.devices {
        tasks.spawn(run_device(cfg, args.dry_run));
    }

    let mut failures = 0usize;
    let mut interrupted = false;
    loop {
        let joined = tokio::select! {
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                info!("Ctrl+C received, stopping devices...");
                interrupted = true;
                tasks.abort_all();
                continue;
            }
            joined = tasks.join_next() => joined,
        };

        let Some(joined) = joined else { break };
        match joined {
            Ok(Ok(report)) => println!("{}", serde_json::to_string(&report)?),
            Ok(Err(e)) => {
                failures += 1;
                error!("{e:#}");
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(e).context("device task panicked"),
        }
    }

    anyhow::ensure!(failures == 0, "{failures} device session(s) failed");
    info!("simulation finished");
    Ok(())
}
