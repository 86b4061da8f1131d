use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;
mod scheduler;
mod state;
mod tle_source;

use config::{Args, TrackerConfig};
use scheduler::Tracker;
use tle_source::CelestrakSource;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pass_tracker=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TrackerConfig::from_args(Args::parse())?;
    let station = config.ground_station()?;

    tracing::info!("🛰️  Pass tracker starting");
    tracing::info!("   Object: NORAD {}", config.object_id);
    tracing::info!(
        "   Ground station: {} ({:.4}, {:.4}, {:.0} m)",
        station.name(),
        station.location().latitude_deg,
        station.location().longitude_deg,
        station.location().height_m
    );
    tracing::info!(
        "   Window: -{} / +{} min at {} min steps",
        config.sampling.past_span_min,
        config.sampling.future_span_min,
        config.sampling.step_min
    );

    let source = Arc::new(CelestrakSource::new(config.tle_url.clone()));
    let tracker = Tracker::new(config, station);
    let cycles = tracker.start(source);

    let addr = format!("0.0.0.0:{}", tracker.config().port);
    tracing::info!("   Snapshot API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, routes::router(tracker))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cycles.shutdown().await;
    tracing::info!("Pass tracker stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
