use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use ir_led_service::{
    LifecycleController, TickOutcome,
    api::HttpTransport,
    config::AppConfig,
    connectivity::SysfsConnectivity,
    device::IrTransmitter,
};
use log::{debug, error, info};
use std::{io::Write, sync::Arc};
use tokio::{
    signal::unix::{SignalKind, signal},
    time::{MissedTickBehavior, interval},
};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let mut controller = LifecycleController::new(
        Arc::new(SysfsConnectivity::new(
            config.link.clone(),
            config.provisioning.clone(),
        )),
        HttpTransport::new(config.service.port, config.service.queue_depth),
        IrTransmitter::new(config.device.clone()),
        config.service.connect_timeout,
    )
    .with_retry_delay(config.service.connect_retry_delay);

    let mut ticker = interval(config.service.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("ctrl-c received");
                break;
            },
            _ = sigterm.recv() => {
                debug!("SIGTERM received");
                break;
            },
            _ = ticker.tick() => {
                match controller.tick().await {
                    Ok(TickOutcome::Started) => info!("service running"),
                    Ok(_) => {}
                    Err(e) => error!("tick failed: {e:#}"),
                }
            }
        }
    }

    info!("shutting down");
    controller.shutdown().await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}
