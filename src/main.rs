use anyhow::{Context, Result};
use labwatch::config::{load_config, LabwatchConfig};
use labwatch::endpoint::target_from_url;
use labwatch::{ChannelManager, MessageKind, TargetId};
use std::path::PathBuf;
use tracing::{info, warn};

const USAGE: &str = "usage: labwatch <lab-id | channel-url> [config.toml]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labwatch=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let target_arg = args.next().context(USAGE)?;

    let config_path = args
        .next()
        .or_else(|| std::env::var("LABWATCH_CONFIG").ok())
        .map(PathBuf::from);

    let mut config: LabwatchConfig = load_config(config_path.as_deref())?;
    config.apply_env()?;

    // Accept a bare id or a full channel address copied from the dashboard
    let target = match target_arg.parse::<TargetId>() {
        Ok(target) => target,
        Err(e) => target_from_url(&target_arg, &config.endpoint.path_prefix).context(e)?,
    };

    info!(
        lab_id = %target,
        page_url = %config.endpoint.page_url,
        environment = ?config.endpoint.environment,
        "labwatch starting..."
    );

    let mut manager = ChannelManager::from_config(&config)?;

    manager.on_connect(|| info!("Live updates enabled"));
    manager.on_disconnect(|| warn!("Live updates interrupted"));

    let kinds = [
        MessageKind::Connection,
        MessageKind::EnvironmentData,
        MessageKind::Alarm,
        MessageKind::Statistics,
        MessageKind::AlarmConfirmed,
        MessageKind::AlarmResolved,
        MessageKind::AlarmIgnored,
    ];
    for kind in kinds {
        manager.on(kind, |data, frame| {
            info!(
                kind = %frame.kind,
                lab_id = ?frame.lab_id,
                message = frame.message.as_deref().unwrap_or(""),
                data = %data,
                "Frame"
            );
            Ok(())
        });
    }

    manager.connect(target);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    manager.shutdown().await;

    Ok(())
}
