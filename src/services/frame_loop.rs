//! Cooperative frame-delivery loop
//!
//! Pulls frames from a `FrameSource` and feeds them to the pipeline one at
//! a time. Shutdown is checked between frames only; a frame that has
//! started always runs to completion.
//!
//! Sources may block (file reads); on a multi-thread runtime the pull runs
//! under `block_in_place` so the other tasks keep their worker threads.

use crate::io::export::SessionExporter;
use crate::io::frame_source::{DetectionFrame, FrameSource};
use crate::services::pipeline::FrameProcessingPipeline;
use anyhow::Context;
use chrono::Utc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Outcome of a loop run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub sessions_billed: u64,
    /// True when the loop ended because shutdown was requested
    pub stopped: bool,
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Pull the next frame, keeping blocking reads off the async workers
fn pull_frame<S: FrameSource>(source: &mut S) -> anyhow::Result<Option<DetectionFrame>> {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| source.next_frame()),
        _ => source.next_frame(),
    }
}

/// Drive the pipeline until the source is exhausted or shutdown is requested.
///
/// Frame-level pipeline failures are logged and counted; the loop moves on
/// to the next frame. Source errors end the loop and are returned.
pub async fn run_frame_loop<S: FrameSource>(
    pipeline: &mut FrameProcessingPipeline,
    source: &mut S,
    frame_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<LoopStats> {
    let mut stats = LoopStats::default();
    let mut ticker = interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(frame_interval_ms = %frame_interval.as_millis(), "frame_loop_started");

    loop {
        if *shutdown.borrow() {
            stats.stopped = true;
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                stats.stopped = true;
                break;
            }
            _ = ticker.tick() => {}
        }

        let Some(frame) = pull_frame(source).context("frame source failed")? else {
            debug!("frame_source_exhausted");
            break;
        };

        let now = frame.time.unwrap_or_else(Utc::now);
        match pipeline.process_frame(&frame.detections, now) {
            Ok(summary) => {
                stats.frames_processed += 1;
                stats.sessions_billed += summary.new_session_records.len() as u64;
                debug!(
                    total = %summary.total(),
                    vacant = %summary.vacant_count,
                    occupied = %summary.occupied_count,
                    "frame_stats"
                );
            }
            Err(e) => {
                stats.frames_failed += 1;
                error!(error = %e, frame_time = %now, "frame_failed");
            }
        }
    }

    info!(
        frames = %stats.frames_processed,
        failed = %stats.frames_failed,
        billed = %stats.sessions_billed,
        stopped = %stats.stopped,
        "frame_loop_finished"
    );
    Ok(stats)
}

/// Run the frame loop, then export every billed session.
///
/// The export happens however the loop ended, so sessions billed before a
/// source failure are not lost. A loop error takes precedence over an
/// export error and is returned after the export.
pub async fn run_and_export<S: FrameSource>(
    pipeline: &mut FrameProcessingPipeline,
    source: &mut S,
    frame_interval: Duration,
    shutdown: watch::Receiver<bool>,
    exporter: &SessionExporter,
) -> anyhow::Result<LoopStats> {
    let result = run_frame_loop(pipeline, source, frame_interval, shutdown).await;

    let records = pipeline.list_session_records();
    let exported = exporter
        .write_records(&records)
        .with_context(|| format!("Failed to export sessions to {}", exporter.file_path()));

    if let (Err(loop_err), Err(export_err)) = (&result, &exported) {
        error!(
            error = %format!("{export_err:#}"),
            loop_error = %format!("{loop_err:#}"),
            "export_failed_after_loop_error"
        );
    }

    let stats = result?;
    exported?;
    Ok(stats)
}
