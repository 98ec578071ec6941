//! Parking monitor - slot occupancy and billing from detector frames
//!
//! Replays per-frame parking-slot detections, tracks each slot's occupancy,
//! bills completed sessions and exports them when the run ends.
//!
//! Module structure:
//! - `domain/` - Core business types (Detection, SlotKey, SessionRecord)
//! - `io/` - External interfaces (frame sources, session export)
//! - `services/` - Business logic (resolver, tracker, billing, pipeline)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use parking_monitor::infra::{Config, Metrics};
use parking_monitor::io::{JsonlFrameSource, SessionExporter};
use parking_monitor::services::{run_and_export, FrameProcessingPipeline};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parking monitor - occupancy tracking and session billing
#[derive(Parser, Debug)]
#[command(name = "parking-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Frame file to replay (overrides [source] file)
    #[arg(short, long)]
    input: Option<String>,

    /// Session export file (overrides [export] file)
    #[arg(short, long)]
    export: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-frame visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "parking-monitor starting");

    let args = Args::parse();

    let mut config = Config::load_from_path(&Config::resolve_config_path(args.config.as_deref()));
    if let Some(input) = &args.input {
        config = config.with_source_file(input);
    }
    if let Some(export) = &args.export {
        config = config.with_export_file(export);
    }

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        grid_px = %config.grid_px(),
        unit_minutes = %config.unit_minutes(),
        unit_fee = %config.unit_fee(),
        timeseries_window = %config.timeseries_window(),
        source_file = %config.source_file(),
        frame_interval_ms = %config.frame_interval_ms(),
        export_file = %config.export_file(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());
    let mut pipeline = FrameProcessingPipeline::new(&config, metrics.clone());

    // Live report: metrics plus the latest occupancy sample and running revenue
    let report_metrics = metrics.clone();
    let report_series = pipeline.series_handle();
    let report_records = pipeline.records_handle();
    let report_interval = config.metrics_interval_secs().max(1);
    let mut report_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(report_interval));
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = report_shutdown.changed() => break,
            }
            report_metrics.report().log();
            if let Some(sample) = report_series.latest() {
                info!(
                    timestamp = %sample.timestamp,
                    vacant = %sample.vacant_count,
                    sessions = %report_records.len(),
                    revenue = %report_records.total_fees(),
                    "occupancy_report"
                );
            }
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    let mut source = JsonlFrameSource::open(config.source_file())?;
    let exporter = SessionExporter::new(config.export_file());
    let frame_interval = Duration::from_millis(config.frame_interval_ms());

    // Billed sessions are exported even when the source fails mid-run
    let stats =
        run_and_export(&mut pipeline, &mut source, frame_interval, shutdown_rx, &exporter).await?;

    metrics.report().log();
    info!(
        frames = %stats.frames_processed,
        failed_frames = %stats.frames_failed,
        sessions = %pipeline.records_handle().len(),
        open_sessions = %pipeline.tracker().open_sessions().len(),
        revenue = %pipeline.records_handle().total_fees(),
        "parking-monitor shutdown complete"
    );
    Ok(())
}
