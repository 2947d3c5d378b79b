use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};
use tokio::signal::unix::{signal, SignalKind};

use luxlog::{
    Database, HttpUploader, IioLightSensor, SensorConfig, SensorController, SqliteStore,
    SyncEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Reads RUST_LOG; verbose pipeline diagnostics additionally require
    // the `debug` config flag.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = SensorConfig::load(None)?;
    info!("luxlog starting, device {}", config.device_id);

    let database = Database::new(config.db_path.clone())?;
    let uploader = HttpUploader::new(config.sync.endpoint.clone());
    let sync = SyncEngine::new(database.clone(), uploader, config.sync.batch_size);
    let store = Arc::new(SqliteStore::new(database, sync));

    let sensor =
        IioLightSensor::new(config.sensor_path.clone()).context("light sensor unavailable")?;

    let controller = SensorController::new(config, Box::new(sensor), store)?;
    controller.start(None, None).await?;

    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sigterm.recv() => break,
            _ = sighup.recv() => {
                info!("sync requested");
                if let Err(err) = controller.sync().await {
                    error!("sync failed: {err:#}");
                }
            }
        }
    }

    controller.stop().await?;
    info!("luxlog terminated");
    Ok(())
}
